//! Flat, serde-friendly form of an asset for external cache stores.
//!
//! ```json
//! {
//!   "class": "ProcessedAsset",
//!   "logical_path": "application.js",
//!   "pathname": "$root/app/assets/application.js",
//!   "required_paths": ["$root/app/assets/application.js"],
//!   "dependency_paths": [{"path": "...", "mtime": ..., "digest": "...", "tracking": "digest"}],
//!   "_version": "..."
//! }
//! ```
//!
//! Paths under the environment root are stored relative to `$root` so a
//! cache directory stays valid when the project moves.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::bundled::required_assets;
use super::{Asset, AssetMeta, BundledAsset, ProcessedAsset, StaticAsset};
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::freshness::{DependencyFile, Tracking, hex_digest};

const ROOT_PREFIX: &str = "$root";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetClass {
    StaticAsset,
    ProcessedAsset,
    BundledAsset,
}

impl AssetClass {
    pub fn name(self) -> &'static str {
        match self {
            Self::StaticAsset => "StaticAsset",
            Self::ProcessedAsset => "ProcessedAsset",
            Self::BundledAsset => "BundledAsset",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRecord {
    pub path: String,
    pub mtime: SystemTime,
    pub digest: String,
    pub tracking: Tracking,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRecord {
    pub class: AssetClass,
    pub logical_path: String,
    pub pathname: String,
    pub content_type: String,
    pub mtime: SystemTime,
    pub length: u64,
    pub digest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency_digest: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependency_paths: Vec<DependencyRecord>,
    /// Environment digest the asset was built under.
    #[serde(rename = "_version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Asset {
    /// Flatten into a record stamped with the current environment digest.
    pub fn encode(&self, env: &Environment) -> AssetRecord {
        let meta = self.meta();
        let mut record = AssetRecord {
            class: self.class(),
            logical_path: meta.logical_path.clone(),
            pathname: compress_path(env, &meta.pathname),
            content_type: meta.content_type.clone(),
            mtime: meta.mtime,
            length: meta.length,
            digest: meta.digest.clone(),
            source: None,
            dependency_digest: None,
            required_paths: Vec::new(),
            dependency_paths: Vec::new(),
            version: Some(hex_digest(&env.digest())),
        };

        match self {
            Self::Static(_) => {}
            Self::Processed(asset) => {
                record.source = Some(asset.source.clone());
                record.dependency_digest = Some(asset.dependency_digest.clone());
            }
            Self::Bundled(asset) => {
                record.source = Some(asset.source.clone());
                record.dependency_digest = Some(asset.dependency_digest().to_string());
            }
        }

        if !matches!(self, Self::Static(_)) {
            record.required_paths = self
                .required_paths()
                .iter()
                .map(|path| compress_path(env, path))
                .collect();
            record.dependency_paths = self
                .dependency_files()
                .iter()
                .map(|dep| DependencyRecord {
                    path: compress_path(env, &dep.path),
                    mtime: dep.mtime,
                    digest: dep.digest.clone(),
                    tracking: dep.tracking,
                })
                .collect();
        }

        record
    }

    /// Rebuild an asset from a record without reprocessing its source.
    ///
    /// A bundle record is only accepted if its processed asset still has
    /// the same dependency digest.
    pub fn from_record(env: &Environment, record: AssetRecord) -> Result<Self> {
        let meta = AssetMeta {
            logical_path: record.logical_path,
            pathname: expand_path(env, &record.pathname),
            content_type: record.content_type,
            mtime: record.mtime,
            length: record.length,
            digest: record.digest,
        };
        let missing = |field: &str| Error::CacheCorruption(format!("missing `{field}`"));

        match record.class {
            AssetClass::StaticAsset => Ok(Self::Static(StaticAsset::from_meta(meta))),
            AssetClass::ProcessedAsset => Ok(Self::Processed(ProcessedAsset {
                source: record.source.ok_or_else(|| missing("source"))?,
                dependency_digest: record
                    .dependency_digest
                    .ok_or_else(|| missing("dependency_digest"))?,
                required_paths: record
                    .required_paths
                    .iter()
                    .map(|path| expand_path(env, path))
                    .collect(),
                dependency_paths: record
                    .dependency_paths
                    .into_iter()
                    .map(|dep| DependencyFile {
                        path: expand_path(env, &dep.path),
                        mtime: dep.mtime,
                        digest: dep.digest,
                        tracking: dep.tracking,
                    })
                    .collect(),
                meta,
            })),
            AssetClass::BundledAsset => {
                let expected = record
                    .dependency_digest
                    .ok_or_else(|| missing("dependency_digest"))?;
                let processed = env.find_asset(&meta.pathname, false)?.ok_or_else(|| {
                    Error::CacheCorruption(format!("{} no longer exists", meta.pathname.display()))
                })?;

                let current = match processed.as_ref() {
                    Asset::Processed(asset) => asset.dependency_digest.as_str(),
                    _ => processed.digest(),
                };
                if current != expected {
                    return Err(Error::CacheCorruption(format!(
                        "{} dependencies changed",
                        meta.logical_path
                    )));
                }

                let required_assets = required_assets(env, &meta.pathname, &processed)?;
                Ok(Self::Bundled(BundledAsset {
                    source: record.source.ok_or_else(|| missing("source"))?,
                    processed: Arc::clone(&processed),
                    required_assets,
                    meta,
                }))
            }
        }
    }
}

/// `/project/app/a.js` -> `$root/app/a.js`
fn compress_path(env: &Environment, path: &Path) -> String {
    match path.strip_prefix(env.root()) {
        Ok(relative) if !env.root().as_os_str().is_empty() => {
            let parts: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            format!("{ROOT_PREFIX}/{}", parts.join("/"))
        }
        _ => path.display().to_string(),
    }
}

/// `$root/app/a.js` -> `/project/app/a.js`
fn expand_path(env: &Environment, path: &str) -> PathBuf {
    match path.strip_prefix(ROOT_PREFIX) {
        Some(relative) => env.root().join(relative.trim_start_matches('/')),
        None => PathBuf::from(path),
    }
}
