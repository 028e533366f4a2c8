//! Logical path resolution and asset lookup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::Environment;
use crate::asset::{Asset, BundledAsset, ProcessedAsset, StaticAsset};
use crate::attributes::AssetAttributes;
use crate::error::{Error, Result};
use crate::search::{ComponentManifest, extensions_of};

/// In-memory cache key: the requested path plus the bundle flag.
pub(crate) fn cache_key_for(path: &Path, bundle: bool) -> String {
    format!("{}:{}", path.display(), u8::from(bundle))
}

impl Environment {
    /// Physical path for a logical path, searching every root.
    pub fn resolve(&self, logical_path: &str) -> Result<PathBuf> {
        self.resolve_from(logical_path, None)
    }

    /// Like [`resolve`](Self::resolve), with `./` and `../` taken from
    /// `base_path`.
    pub(crate) fn resolve_from(
        &self,
        logical_path: &str,
        base_path: Option<&Path>,
    ) -> Result<PathBuf> {
        self.resolve_with(logical_path, base_path, |path| Some(path.to_path_buf()))
            .ok_or_else(|| Error::NotFound(logical_path.to_string()))
    }

    /// Walk the candidates for `logical_path` until `accept` returns `Some`.
    ///
    /// A matching `component.json` is replaced by its `main` files.
    pub(crate) fn resolve_with<T>(
        &self,
        logical_path: &str,
        base_path: Option<&Path>,
        mut accept: impl FnMut(&Path) -> Option<T>,
    ) -> Option<T> {
        // Snapshot so `accept` may query the environment
        let search_path = self.search_path();
        let candidates = AssetAttributes::search_paths(logical_path);
        let basename = logical_path.rsplit('/').next().unwrap_or(logical_path);
        let extension = extensions_of(basename).last().copied();

        search_path.find(&candidates, base_path, |path| {
            if !ComponentManifest::is_manifest(path) {
                return accept(path);
            }
            let manifest = ComponentManifest::load(path)?;
            let dir = path.parent()?;
            manifest
                .mains(dir, extension)
                .into_iter()
                .filter(|main| self.stat(main).is_some_and(|s| s.is_file()))
                .find_map(|main| accept(&main))
        })
    }

    /// Find and build an asset.
    ///
    /// `path` is a logical path or an existing absolute path. Returns
    /// `Ok(None)` when nothing matches; build errors propagate.
    pub fn find_asset(&self, path: impl AsRef<Path>, bundle: bool) -> Result<Option<Arc<Asset>>> {
        let path = path.as_ref();
        let key = cache_key_for(path, bundle);

        if let Some(asset) = self.assets.get(&key).map(|entry| Arc::clone(entry.value())) {
            if asset.is_fresh(self) {
                crate::debug!("cache"; "memory hit {}", key);
                return Ok(Some(asset));
            }
            crate::debug!("cache"; "memory stale {}", key);
            self.assets.remove(&key);
        }

        let (logical_path, pathname) = if path.is_absolute() {
            if self.stat(path).is_none() {
                return Ok(None);
            }
            (self.attributes_for(path).logical_path, path.to_path_buf())
        } else {
            let Some(logical) = path.to_str() else {
                return Ok(None);
            };
            let pathname = match self.resolve(logical) {
                Ok(pathname) => pathname,
                Err(err) if err.is_not_found() => return Ok(None),
                Err(err) => return Err(err),
            };

            // `application` -> `application.js`
            let mut logical = logical.to_string();
            if path.extension().is_none() {
                let expanded = self.attributes_for(&pathname).logical_path;
                if let Some(ext) = Path::new(&expanded).extension() {
                    logical.push('.');
                    logical.push_str(&ext.to_string_lossy());
                }
            }
            (logical, pathname)
        };

        let asset = self.build_asset(&logical_path, path, &pathname, bundle)?;

        self.assets.insert(key, Arc::clone(&asset));
        self.assets
            .insert(cache_key_for(&pathname, bundle), Arc::clone(&asset));
        Ok(Some(asset))
    }

    /// Bundled asset for `path`.
    pub fn get(&self, path: impl AsRef<Path>) -> Result<Option<Arc<Asset>>> {
        self.find_asset(path, true)
    }

    /// Full output of the bundled asset for `path`.
    pub fn compile(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        let asset = self
            .get(path)?
            .ok_or_else(|| Error::NotFound(path.display().to_string()))?;
        asset.to_string_lossy()
    }

    /// Build the right asset kind for `pathname`, going through the
    /// external cache when one is attached.
    fn build_asset(
        &self,
        logical_path: &str,
        requested: &Path,
        pathname: &Path,
        bundle: bool,
    ) -> Result<Arc<Asset>> {
        self.cache_asset(requested, pathname, bundle, || {
            let attributes = self.attributes_for(pathname);
            let asset = if attributes.processors.is_empty() {
                Asset::Static(StaticAsset::build(self, logical_path, pathname)?)
            } else if bundle {
                Asset::Bundled(BundledAsset::build(self, logical_path, pathname)?)
            } else {
                Asset::Processed(ProcessedAsset::build(self, logical_path, pathname)?)
            };
            crate::debug!("build"; "{} ({})", logical_path, asset.class_name());
            Ok(Arc::new(asset))
        })
    }
}
