//! A processed file concatenated with everything it requires.

use std::path::Path;
use std::sync::Arc;

use super::{Asset, AssetMeta};
use crate::context::Context;
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::freshness::digest_bytes;

#[derive(Debug, Clone)]
pub struct BundledAsset {
    pub(crate) meta: AssetMeta,
    pub(crate) source: String,
    /// The unbundled asset for the same file.
    pub(crate) processed: Arc<Asset>,
    /// Bundle parts in order; `processed` is among them.
    pub(crate) required_assets: Vec<Arc<Asset>>,
}

impl BundledAsset {
    pub(crate) fn build(env: &Environment, logical_path: &str, pathname: &Path) -> Result<Self> {
        let processed = env
            .find_asset(pathname, false)?
            .ok_or_else(|| Error::NotFound(pathname.display().to_string()))?;
        let required_assets = required_assets(env, pathname, &processed)?;

        let mut concatenated = String::new();
        for asset in &required_assets {
            concatenated.push_str(&asset.body()?);
        }

        let bundle_processors = env.bundle_processors(processed.content_type());
        let mut context = Context::new(env, logical_path, pathname);
        let source = context.evaluate(pathname, Some(concatenated), &bundle_processors)?;

        let mtime = required_assets
            .iter()
            .map(|asset| asset.mtime())
            .chain(processed.dependency_files().iter().map(|dep| dep.mtime))
            .max()
            .unwrap_or_else(|| processed.mtime());

        Ok(Self {
            meta: AssetMeta {
                logical_path: logical_path.to_string(),
                pathname: pathname.to_path_buf(),
                content_type: processed.content_type().to_string(),
                mtime,
                length: source.len() as u64,
                digest: digest_bytes(&env.digest(), &source),
            },
            source,
            processed,
            required_assets,
        })
    }

    /// Fresh exactly when the underlying processed asset is.
    pub(crate) fn is_fresh(&self, env: &Environment) -> bool {
        self.processed.is_fresh(env)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn processed(&self) -> &Arc<Asset> {
        &self.processed
    }

    pub fn dependency_digest(&self) -> &str {
        match self.processed.as_ref() {
            Asset::Processed(asset) => &asset.dependency_digest,
            _ => self.processed.digest(),
        }
    }
}

/// Unbundled assets for every required path of `processed`, in order.
pub(crate) fn required_assets(
    env: &Environment,
    pathname: &Path,
    processed: &Arc<Asset>,
) -> Result<Vec<Arc<Asset>>> {
    processed
        .required_paths()
        .iter()
        .map(|path| {
            if path == pathname {
                return Ok(Arc::clone(processed));
            }
            env.find_asset(path, false)?
                .ok_or_else(|| Error::NotFound(path.display().to_string()))
        })
        .collect()
}
