//! Project configuration from `rivets.toml`.
//!
//! ```toml
//! # Relative to this file; defaults to its directory
//! root = "."
//! paths = ["app/assets/javascripts", "app/assets/stylesheets", "vendor/assets"]
//! version = "1.0"
//!
//! [cache]
//! enabled = true
//! dir = ".rivets/cache"
//!
//! [mime_types]
//! ".mustache" = "text/html"
//! ```

mod error;
mod util;

pub use error::ConfigError;
pub use util::find_config_file;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::log;

/// Default config file name.
pub const CONFIG_FILE: &str = "rivets.toml";

/// Default cache directory, relative to the root.
const DEFAULT_CACHE_DIR: &str = ".rivets/cache";

// ============================================================================
// Sections
// ============================================================================

/// `[cache]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Keep built assets in `dir` between runs.
    pub enabled: bool,
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from(DEFAULT_CACHE_DIR),
        }
    }
}

// ============================================================================
// Root configuration
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RivetsConfig {
    /// Absolute path of the loaded file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Search roots in priority order, relative to `root`.
    #[serde(default)]
    pub paths: Vec<PathBuf>,

    /// Application version folded into every digest.
    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub cache: CacheConfig,

    /// Extra extension -> MIME type registrations.
    #[serde(default)]
    pub mime_types: BTreeMap<String, String>,
}

impl RivetsConfig {
    /// Locate `config_name` (searching upward from cwd) and load it.
    pub fn load(config_name: &Path) -> Result<Self, ConfigError> {
        let path = find_config_file(config_name).ok_or_else(|| {
            ConfigError::Validation(format!(
                "config file `{}` not found",
                config_name.display()
            ))
        })?;
        Self::from_path(&path)
    }

    /// Load and validate a config file, warning about unknown fields.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (mut config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        config.config_path = path.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    /// Parse without locating a file or validating paths.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring: {}", display_path, fields.join(", "));
    }

    /// Directory containing the config file.
    fn base_dir(&self) -> PathBuf {
        self.config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    /// Project root: `root` taken from the config file's directory.
    pub fn root(&self) -> PathBuf {
        let base = self.base_dir();
        match &self.root {
            Some(root) => base.join(root),
            None => base,
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root().join(&self.cache.dir)
    }

    /// Check every search root exists and MIME types look like `type/subtype`.
    ///
    /// All problems are reported together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();
        let root = self.root();

        if self.paths.is_empty() {
            problems.push("`paths` must list at least one search root".to_string());
        }
        for path in &self.paths {
            let full = root.join(path);
            if !full.is_dir() {
                problems.push(format!("search root `{}` is not a directory", full.display()));
            }
        }
        for (extension, mime_type) in &self.mime_types {
            if !mime_type.contains('/') {
                problems.push(format!(
                    "`mime_types.\"{extension}\"` = `{mime_type}` is not a MIME type"
                ));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(problems.join("; ")))
        }
    }
}
