//! Ordered search roots and extension-aware file lookup.
//!
//! ```text
//! roots:      [app/assets, vendor/assets]
//! extensions: [.js, .css, .coffee]
//! aliases:    .js -> [.coffee]
//!
//! find("app.js") tries, per root:
//!   app.js, app.js.coffee, app.coffee, ...   (scored by extension order)
//!   app/index.js, ...
//!   app/component.json
//! ```
//!
//! All lookups are read-only stats and directory listings, so independent
//! logical paths can be searched concurrently.

mod component;
mod stat;

pub use component::{ComponentManifest, MANIFEST_FILE};
pub use stat::{EntryKind, Stat, entries, stat};

use std::path::{Component, Path, PathBuf};

use regex::Regex;
use rustc_hash::FxHashMap;

/// Score offset for alias extensions, so they sort after registered ones.
const ALIAS_SCORE: usize = 11;

/// Ordered roots plus the recognized extensions and their aliases.
#[derive(Debug, Clone, Default)]
pub struct SearchPath {
    paths: Vec<PathBuf>,
    extensions: Vec<String>,
    /// Format extension -> extensions that may stand in for it
    /// (`.js` -> `[.coffee]`).
    aliases: FxHashMap<String, Vec<String>>,
}

impl SearchPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Insert a root with the highest priority. Duplicates are ignored.
    pub fn prepend_path(&mut self, path: PathBuf) {
        if !self.paths.contains(&path) {
            self.paths.insert(0, path);
        }
    }

    /// Insert a root with the lowest priority. Duplicates are ignored.
    pub fn append_path(&mut self, path: PathBuf) {
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    pub fn clear_paths(&mut self) {
        self.paths.clear();
    }

    pub fn append_extension(&mut self, extension: &str) {
        let extension = normalize_extension(extension);
        if !self.extensions.contains(&extension) {
            self.extensions.push(extension);
        }
    }

    /// Let `new_extension` stand in for `old_extension` during lookup.
    pub fn alias_extension(&mut self, new_extension: &str, old_extension: &str) {
        let new_extension = normalize_extension(new_extension);
        let aliases = self
            .aliases
            .entry(normalize_extension(old_extension))
            .or_default();
        if !aliases.contains(&new_extension) {
            aliases.push(new_extension);
        }
    }

    pub fn aliases_for(&self, extension: &str) -> &[String] {
        self.aliases
            .get(&normalize_extension(extension))
            .map_or(&[], Vec::as_slice)
    }

    /// Search for the first file matching any of `logical_paths`.
    ///
    /// Roots are visited in priority order; within a root each logical path
    /// variant is tried in order. `accept` is called with every existing
    /// regular file that matches and the first `Some` wins.
    ///
    /// Paths starting with `./` or `../` are only searched below `base_path`.
    pub fn find<T>(
        &self,
        logical_paths: &[String],
        base_path: Option<&Path>,
        mut accept: impl FnMut(&Path) -> Option<T>,
    ) -> Option<T> {
        let relative = logical_paths.first().is_some_and(|p| is_relative(p));
        let bases: Vec<&Path> = match (relative, base_path) {
            (true, Some(base)) => vec![base],
            (true, None) => return None,
            (false, _) => self.paths.iter().map(PathBuf::as_path).collect(),
        };

        for base in bases {
            for logical_path in logical_paths {
                let full = clean_path(&base.join(logical_path.trim_start_matches('/')));
                let (Some(dir), Some(basename)) =
                    (full.parent(), full.file_name().and_then(|n| n.to_str()))
                else {
                    continue;
                };

                for name in self.matches(dir, basename) {
                    let candidate = dir.join(&name);
                    if !stat(&candidate).is_some_and(|s| s.is_file()) {
                        continue;
                    }
                    if let Some(found) = accept(&candidate) {
                        return Some(found);
                    }
                }
            }
        }

        None
    }

    /// Entries of `dir` that can stand for `basename`, best match first.
    fn matches(&self, dir: &Path, basename: &str) -> Vec<String> {
        let extname = extensions_of(basename).last().copied().unwrap_or("");
        let aliases = self.aliases_for(extname);

        let Some(pattern) = self.pattern_for(basename, extname, aliases) else {
            return Vec::new();
        };

        let mut matches: Vec<String> = entries(dir)
            .into_iter()
            .filter(|name| pattern.is_match(name))
            .collect();

        // Stable: entries are already sorted by name
        matches.sort_by_key(|name| self.score(name, basename, aliases));
        matches
    }

    /// `^basename(?:alias)?(?:ext)*$`
    fn pattern_for(&self, basename: &str, extname: &str, aliases: &[String]) -> Option<Regex> {
        let basename_re = if aliases.is_empty() || extname.is_empty() {
            regex::escape(basename)
        } else {
            let stem = basename.strip_suffix(extname).unwrap_or(basename);
            let alternatives: Vec<String> = std::iter::once(extname)
                .chain(aliases.iter().map(String::as_str))
                .map(regex::escape)
                .collect();
            format!("{}(?:{})", regex::escape(stem), alternatives.join("|"))
        };

        let pattern = if self.extensions.is_empty() {
            format!("^{basename_re}$")
        } else {
            let extensions: Vec<String> =
                self.extensions.iter().map(|e| regex::escape(e)).collect();
            format!("^{basename_re}(?:{})*$", extensions.join("|"))
        };

        Regex::new(&pattern).ok()
    }

    /// Lower is better. An exact match scores 0.
    fn score(&self, name: &str, basename: &str, aliases: &[String]) -> usize {
        let rest = name.replacen(basename, "", 1);
        extensions_of(&rest)
            .into_iter()
            .map(|ext| {
                if let Some(i) = self.extensions.iter().position(|e| e == ext) {
                    i + 1
                } else if let Some(i) = aliases.iter().position(|e| e == ext) {
                    i + ALIAS_SCORE
                } else {
                    0
                }
            })
            .sum()
    }
}

// ============================================================================
// Path helpers
// ============================================================================

/// Normalize an extension to lowercase with a leading dot.
pub fn normalize_extension(extension: &str) -> String {
    let extension = extension.to_ascii_lowercase();
    if extension.starts_with('.') {
        extension
    } else {
        format!(".{extension}")
    }
}

/// Every `.ext` segment of a file name, in order.
///
/// `"foo.js.coffee"` -> `[".js", ".coffee"]`
pub fn extensions_of(name: &str) -> Vec<&str> {
    let mut result = Vec::new();
    let mut rest = name;
    while let Some(start) = rest.find('.') {
        let after = &rest[start + 1..];
        let len = after.find('.').unwrap_or(after.len());
        if len > 0 {
            result.push(&rest[start..start + 1 + len]);
        }
        rest = &after[len..];
    }
    result
}

/// `./foo` and `../foo` are resolved against the requesting file.
pub fn is_relative(logical_path: &str) -> bool {
    logical_path.starts_with("./") || logical_path.starts_with("../")
}

/// Lexically resolve `.` and `..` without touching the file system.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !cleaned.pop() {
                    cleaned.push("..");
                }
            }
            other => cleaned.push(other),
        }
    }
    cleaned
}
