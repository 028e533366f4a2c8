//! External asset cache.
//!
//! The store only sees opaque keys and bytes. Keys are
//! `rivets/<blake3(path with the root stripped)>` so a cache directory
//! survives moving the project; values are serialized [`AssetRecord`]s
//! stamped with the environment digest they were built under.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;

use super::Environment;
use super::find::cache_key_for;
use crate::asset::{Asset, AssetRecord};
use crate::error::{Error, Result};
use crate::freshness::hex_digest;

/// Key/value store for serialized assets.
///
/// Failures are never fatal: a store that can't read returns `None` and a
/// store that can't write drops the value.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    fn set(&self, key: &str, value: Vec<u8>);
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.get(key).map(|value| value.clone())
    }

    fn set(&self, key: &str, value: Vec<u8>) {
        self.entries.insert(key.to_string(), value);
    }
}

/// One JSON file per key under a cache directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl CacheStore for FileStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        fs::read(self.path_for(key)).ok()
    }

    fn set(&self, key: &str, value: Vec<u8>) {
        let path = self.path_for(key);
        let tmp = path.with_extension("json+");

        let written = path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|()| fs::write(&tmp, &value))
            .and_then(|()| fs::rename(&tmp, &path));

        if let Err(e) = written {
            crate::debug!("cache"; "failed to write {}: {}", path.display(), e);
            let _ = fs::remove_file(&tmp);
        }
    }
}

// ============================================================================
// Environment integration
// ============================================================================

impl Environment {
    /// Store key for an in-memory cache key.
    pub(crate) fn expand_cache_key(&self, key: &str) -> String {
        let root = self.root.display().to_string();
        let relative = if root.is_empty() {
            key.to_string()
        } else {
            key.replace(&root, "")
        };
        format!("rivets/{}", blake3::hash(relative.as_bytes()).to_hex())
    }

    /// Return a fresh cached asset for `requested`, or build and store one.
    ///
    /// A failed build is never stored. A successful one is stored under
    /// the requested key and under its own pathname.
    pub(crate) fn cache_asset(
        &self,
        requested: &Path,
        pathname: &Path,
        bundle: bool,
        build: impl FnOnce() -> Result<Arc<Asset>>,
    ) -> Result<Arc<Asset>> {
        let Some(store) = self.store.as_deref() else {
            return build();
        };

        let key = cache_key_for(requested, bundle);
        if let Some(asset) = self.read_cached(store, &key, pathname) {
            return Ok(Arc::new(asset));
        }

        let asset = build()?;
        match serde_json::to_vec(&asset.encode(self)) {
            Ok(bytes) => {
                let path_key = cache_key_for(asset.pathname(), bundle);
                if path_key != key {
                    store.set(&self.expand_cache_key(&path_key), bytes.clone());
                }
                store.set(&self.expand_cache_key(&key), bytes);
            }
            Err(e) => crate::debug!("cache"; "failed to encode {}: {}", key, e),
        }

        Ok(asset)
    }

    fn read_cached(&self, store: &dyn CacheStore, key: &str, pathname: &Path) -> Option<Asset> {
        let bytes = store.get(&self.expand_cache_key(key))?;

        match self.decode_cached(&bytes, pathname) {
            Ok(asset) if asset.is_fresh(self) => {
                crate::debug!("cache"; "hit {}", key);
                Some(asset)
            }
            Ok(_) => {
                crate::debug!("cache"; "stale {}", key);
                None
            }
            Err(err) => {
                crate::debug!("cache"; "miss {}: {}", key, err);
                None
            }
        }
    }

    fn decode_cached(&self, bytes: &[u8], pathname: &Path) -> Result<Asset> {
        let record: AssetRecord =
            serde_json::from_slice(bytes).map_err(|e| Error::CacheCorruption(e.to_string()))?;

        let version = hex_digest(&self.digest());
        if record.version.as_deref() != Some(version.as_str()) {
            return Err(Error::CacheCorruption("version mismatch".into()));
        }

        let asset = Asset::from_record(self, record)?;
        if asset.pathname() != pathname {
            return Err(Error::CacheCorruption(format!(
                "entry points at {}",
                asset.pathname().display()
            )));
        }
        Ok(asset)
    }
}
