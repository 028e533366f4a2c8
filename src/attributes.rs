//! Properties derived purely from a file's path and the current registries.
//!
//! ```text
//! app/assets/javascripts/app.js.coffee.erb
//!   extensions        [.js, .coffee, .erb]
//!   format_extension  .js
//!   engine_extensions [.coffee, .erb]
//!   logical_path      javascripts/app.js
//!   processors        pre(js) + [erb, coffee] + post(js)
//! ```

use std::path::{Path, PathBuf};

use crate::environment::Registry;
use crate::processor::Registered;
use crate::search::{MANIFEST_FILE, extensions_of, normalize_extension};

pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone)]
pub struct AssetAttributes {
    pub pathname: PathBuf,
    pub extensions: Vec<String>,
    pub format_extension: Option<String>,
    pub engine_extensions: Vec<String>,
    pub logical_path: String,
    pub content_type: String,
    /// Full chain for a single file: preprocessors, engines (rightmost
    /// extension first), postprocessors.
    pub processors: Vec<Registered>,
    /// Lookup variants for `logical_path`.
    pub search_paths: Vec<String>,
}

impl AssetAttributes {
    pub(crate) fn new(registry: &Registry, pathname: &Path) -> Self {
        let basename = pathname
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extensions: Vec<String> = extensions_of(&basename)
            .into_iter()
            .map(String::from)
            .collect();

        let mimes = &registry.mime_types;
        let processors = &registry.processors;

        let format_index = extensions
            .iter()
            .rposition(|ext| mimes.mime_type(ext).is_some() && !processors.is_engine(ext));
        let format_extension = format_index.map(|i| extensions[i].clone());

        let engine_extensions: Vec<String> = extensions
            .iter()
            .skip(format_index.map_or(0, |i| i + 1))
            .filter(|ext| processors.is_engine(ext))
            .cloned()
            .collect();
        let engines: Vec<&Registered> = engine_extensions
            .iter()
            .filter_map(|ext| processors.engine(ext))
            .collect();

        let engine_mime_type = engines
            .iter()
            .rev()
            .find_map(|engine| engine.processor.default_mime_type())
            .map(str::to_ascii_lowercase);

        let content_type = format_extension
            .as_deref()
            .and_then(|ext| mimes.mime_type(ext).map(String::from))
            .or_else(|| engine_mime_type.clone())
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());

        let mut logical_path = logical_path_for(registry.search_path.paths(), pathname);
        for ext in &engine_extensions {
            logical_path = strip_extension(&logical_path, ext);
        }
        if format_extension.is_none()
            && let Some(ext) = engine_mime_type
                .as_deref()
                .and_then(|mime| mimes.extension_for(mime))
        {
            logical_path.push_str(ext);
        }

        let processors: Vec<Registered> = processors
            .preprocessors(&content_type)
            .iter()
            .cloned()
            .chain(engines.into_iter().rev().cloned())
            .chain(processors.postprocessors(&content_type).iter().cloned())
            .collect();

        let search_paths = Self::search_paths(&logical_path);

        Self {
            pathname: pathname.to_path_buf(),
            extensions,
            format_extension,
            engine_extensions,
            logical_path,
            content_type,
            processors,
            search_paths,
        }
    }

    /// Logical path variants tried in order when resolving `logical_path`.
    ///
    /// `foo.js` -> `[foo.js, foo/index.js, foo/component.json]`
    pub fn search_paths(logical_path: &str) -> Vec<String> {
        let mut paths = vec![logical_path.to_string()];

        let (dir, basename) = match logical_path.rsplit_once('/') {
            Some((dir, basename)) => (format!("{dir}/"), basename),
            None => (String::new(), logical_path),
        };
        let exts: String = extensions_of(basename).concat();
        let stem = basename.strip_suffix(exts.as_str()).unwrap_or(basename);

        if stem != "index" && !stem.is_empty() {
            paths.push(format!("{dir}{stem}/index{exts}"));
            paths.push(format!("{dir}{stem}/{MANIFEST_FILE}"));
        }
        paths
    }
}

/// Root-relative path with `/` separators.
///
/// Outside every root the bare file name is used.
fn logical_path_for(roots: &[PathBuf], pathname: &Path) -> String {
    let relative = roots
        .iter()
        .find_map(|root| pathname.strip_prefix(root).ok())
        .map(|rel| {
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/")
        });

    relative.unwrap_or_else(|| {
        pathname
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    })
}

/// Drop one occurrence of `ext` from the file name part of `path`.
fn strip_extension(path: &str, ext: &str) -> String {
    let (dir, basename) = match path.rsplit_once('/') {
        Some((dir, basename)) => (Some(dir), basename),
        None => (None, path),
    };

    let target = normalize_extension(ext);
    let mut stripped = String::with_capacity(basename.len());
    let mut removed = false;
    let mut rest = basename;

    // Keep the stem, then copy every extension except the first match
    let stem_len = rest.find('.').unwrap_or(rest.len());
    stripped.push_str(&rest[..stem_len]);
    rest = &rest[stem_len..];
    for segment in extensions_of(rest) {
        if !removed && segment.eq_ignore_ascii_case(&target) {
            removed = true;
        } else {
            stripped.push_str(segment);
        }
    }

    match dir {
        Some(dir) => format!("{dir}/{stripped}"),
        None => stripped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_paths() {
        assert_eq!(
            AssetAttributes::search_paths("foo/bar.js"),
            vec!["foo/bar.js", "foo/bar/index.js", "foo/bar/component.json"]
        );
        assert_eq!(
            AssetAttributes::search_paths("index.js"),
            vec!["index.js"]
        );
        assert_eq!(
            AssetAttributes::search_paths("application"),
            vec!["application", "application/index", "application/component.json"]
        );
    }

    #[test]
    fn test_strip_extension() {
        assert_eq!(strip_extension("js/app.js.coffee", ".coffee"), "js/app.js");
        assert_eq!(strip_extension("app.coffee.js.coffee", ".coffee"), "app.js.coffee");
        assert_eq!(strip_extension("a.coffee/b.js.erb", ".erb"), "a.coffee/b.js");
    }

    #[test]
    fn test_logical_path_outside_roots() {
        let roots = vec![PathBuf::from("/srv/assets")];
        assert_eq!(
            logical_path_for(&roots, Path::new("/srv/assets/js/app.js")),
            "js/app.js"
        );
        assert_eq!(logical_path_for(&roots, Path::new("/tmp/other.js")), "other.js");
    }
}
