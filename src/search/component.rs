//! `component.json` manifests: a directory standing in for its `main` file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Manifest file name searched as `<name>/component.json`.
pub const MANIFEST_FILE: &str = "component.json";

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Main {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComponentManifest {
    #[serde(default)]
    main: Option<Main>,
}

impl ComponentManifest {
    /// Parse a manifest. Unreadable or malformed manifests are ignored.
    pub fn load(path: &Path) -> Option<Self> {
        let content = fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn is_manifest(path: &Path) -> bool {
        path.file_name().is_some_and(|name| name == MANIFEST_FILE)
    }

    /// Candidate main files, relative to the manifest's directory.
    ///
    /// A list of mains is filtered by `extension` (the queried logical
    /// path's extension); with no extension every entry is a candidate.
    pub fn mains(&self, dir: &Path, extension: Option<&str>) -> Vec<PathBuf> {
        match &self.main {
            None => Vec::new(),
            Some(Main::One(main)) => vec![dir.join(main)],
            Some(Main::Many(mains)) => mains
                .iter()
                .filter(|main| {
                    extension.is_none_or(|ext| {
                        super::extensions_of(main).last().copied() == Some(ext)
                    })
                })
                .map(|main| dir.join(main))
                .collect(),
        }
    }
}
