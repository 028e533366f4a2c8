//! Per-file build context handed to every processor.
//!
//! A `Context` collects what a file declares while it is processed:
//!
//! - `required_paths`: files concatenated before it in a bundle
//! - `dependency_paths`: files checked by mtime only (`depend_on`)
//! - `dependency_assets`: files and directories checked by digest
//! - `stubbed_assets`: files excluded from the bundle with their requires
//!
//! The collected sets become the processed asset's dependency records.

use std::fs;
use std::path::{Path, PathBuf};

use base64::prelude::{BASE64_STANDARD, Engine as _};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

use crate::attributes::DEFAULT_MIME_TYPE;
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::processor::Registered;

pub struct Context<'a> {
    environment: &'a Environment,
    logical_path: String,
    pathname: PathBuf,
    content_type: String,
    required_paths: Vec<PathBuf>,
    dependency_paths: Vec<PathBuf>,
    dependency_assets: Vec<PathBuf>,
    stubbed_assets: Vec<PathBuf>,
}

impl<'a> Context<'a> {
    pub fn new(environment: &'a Environment, logical_path: &str, pathname: &Path) -> Self {
        Self {
            environment,
            logical_path: logical_path.to_string(),
            pathname: pathname.to_path_buf(),
            content_type: environment.content_type_of(pathname),
            required_paths: Vec::new(),
            dependency_paths: Vec::new(),
            dependency_assets: vec![pathname.to_path_buf()],
            stubbed_assets: Vec::new(),
        }
    }

    pub fn environment(&self) -> &'a Environment {
        self.environment
    }

    pub fn pathname(&self) -> &Path {
        &self.pathname
    }

    /// Search root containing this file.
    pub fn root_path(&self) -> Option<PathBuf> {
        self.environment
            .paths()
            .into_iter()
            .find(|root| self.pathname.starts_with(root))
    }

    /// Logical path with its extension removed: `foo/bar.js` -> `foo/bar`.
    pub fn logical_path(&self) -> &str {
        let name_start = self.logical_path.rfind('/').map_or(0, |i| i + 1);
        match self.logical_path[name_start..].rfind('.') {
            Some(dot) if dot > 0 => &self.logical_path[..name_start + dot],
            _ => &self.logical_path,
        }
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn required_paths(&self) -> &[PathBuf] {
        &self.required_paths
    }

    pub fn dependency_paths(&self) -> &[PathBuf] {
        &self.dependency_paths
    }

    pub fn dependency_assets(&self) -> &[PathBuf] {
        &self.dependency_assets
    }

    pub fn stubbed_assets(&self) -> &[PathBuf] {
        &self.stubbed_assets
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Resolve `path` relative to this file.
    ///
    /// Absolute paths must exist. With a `content_type`, a path whose own
    /// format extension implies another type is rejected, and only
    /// candidates of that type are accepted.
    pub fn resolve(&self, path: impl AsRef<Path>, content_type: Option<&str>) -> Result<PathBuf> {
        let path = path.as_ref();

        if path.is_absolute() {
            return match self.environment.stat(path) {
                Some(_) => Ok(path.to_path_buf()),
                None => Err(Error::NotFound(path.display().to_string())),
            };
        }

        let logical = path
            .to_str()
            .ok_or_else(|| Error::NotFound(path.display().to_string()))?;
        let base_path = self.pathname.parent();

        let Some(content_type) = content_type else {
            return self.environment.resolve_from(logical, base_path);
        };

        let attributes = self.environment.attributes_for(path);
        if attributes.format_extension.is_some() && attributes.content_type != content_type {
            return Err(Error::InvalidRequire {
                path: logical.to_string(),
                reason: format!(
                    "{} is not of content type {content_type}",
                    attributes.content_type
                ),
            });
        }

        self.environment
            .resolve_with(logical, base_path, |candidate| {
                (self.environment.content_type_of(candidate) == content_type)
                    .then(|| candidate.to_path_buf())
            })
            .ok_or_else(|| Error::NotFound(logical.to_string()))
    }

    /// Content type to match requires against, if this file has one.
    fn requirable_content_type(&self) -> Option<&str> {
        (self.content_type != DEFAULT_MIME_TYPE).then_some(self.content_type.as_str())
    }

    // ========================================================================
    // Recording
    // ========================================================================

    /// Rebuild when `path` gets a newer mtime. Not part of the bundle.
    pub fn depend_on(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let resolved = self.resolve(path, None)?;
        push_unique(&mut self.dependency_paths, resolved);
        Ok(())
    }

    /// Rebuild when `path`, or anything it depends on, changes content.
    pub fn depend_on_asset(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let resolved = self.resolve(path, None)?;
        push_unique(&mut self.dependency_assets, resolved);
        Ok(())
    }

    /// Add `path` to the bundle ahead of this file.
    pub fn require_asset(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content_type = self.requirable_content_type().map(String::from);

        let resolved = self
            .resolve(path, content_type.as_deref())
            .map_err(|err| match err {
                Error::NotFound(_) => Error::InvalidRequire {
                    path: path.display().to_string(),
                    reason: "file not found".into(),
                },
                other => other,
            })?;

        // Absolute paths skip the type filter in `resolve`
        let invalid = |reason: String| Error::InvalidRequire {
            path: path.display().to_string(),
            reason,
        };
        if !self.environment.stat(&resolved).is_some_and(|s| s.is_file()) {
            return Err(invalid("not a file".into()));
        }
        if let Some(expected) = content_type.as_deref() {
            let actual = self.environment.content_type_of(&resolved);
            if actual != expected {
                return Err(invalid(format!("{actual} is not of content type {expected}")));
            }
        }

        push_unique(&mut self.dependency_assets, resolved.clone());
        push_unique(&mut self.required_paths, resolved);
        Ok(())
    }

    /// Exclude `path` and its own requires from the bundle.
    pub fn stub_asset(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let resolved = self.resolve(path, None)?;
        push_unique(&mut self.stubbed_assets, resolved);
        Ok(())
    }

    /// Bundled body of `path` as a `data:` URI, for inlining images or
    /// fonts into a stylesheet. `path` becomes a dependency of this file.
    ///
    /// The base64 payload is percent-escaped: `+` `/` `=` become
    /// `%2B` `%2F` `%3D`.
    pub fn asset_data_uri(&mut self, path: impl AsRef<Path>) -> Result<String> {
        let resolved = self.resolve(path, None)?;
        self.depend_on_asset(&resolved)?;

        let asset = self
            .environment
            .get(&resolved)?
            .ok_or_else(|| Error::NotFound(resolved.display().to_string()))?;
        let encoded = BASE64_STANDARD.encode(asset.to_bytes()?);

        Ok(format!(
            "data:{};base64,{}",
            asset.content_type(),
            utf8_percent_encode(&encoded, NON_ALPHANUMERIC)
        ))
    }

    /// Whether `path` resolves to a file this one may require.
    pub fn is_asset_requirable(&self, path: impl AsRef<Path>) -> bool {
        let Ok(resolved) = self.resolve(path, None) else {
            return false;
        };
        if !self.environment.stat(&resolved).is_some_and(|s| s.is_file()) {
            return false;
        }
        match self.requirable_content_type() {
            None => true,
            Some(content_type) => self.environment.content_type_of(&resolved) == content_type,
        }
    }

    // ========================================================================
    // Processing
    // ========================================================================

    /// Run `processors` over `data`, or over the contents of `path`.
    ///
    /// Each processor's callback sees the output it produced.
    pub fn evaluate(
        &mut self,
        path: &Path,
        data: Option<String>,
        processors: &[Registered],
    ) -> Result<String> {
        let mut result = match data {
            Some(data) => data,
            None => fs::read_to_string(path).map_err(|e| Error::Io(path.to_path_buf(), e))?,
        };

        for registered in processors {
            result = registered
                .processor
                .render(self, result)
                .map_err(|e| Error::from_processor(path.to_path_buf(), registered.name(), e))?;

            if let Some(callback) = &registered.callback {
                callback(self, &result);
            }
        }

        Ok(result)
    }
}

fn push_unique(list: &mut Vec<PathBuf>, path: PathBuf) {
    if !list.contains(&path) {
        list.push(path);
    }
}
