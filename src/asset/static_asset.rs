//! Files served unchanged, such as images and fonts.

use std::fs;
use std::path::Path;

use super::AssetMeta;
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::freshness::{DependencyFile, Tracking, dependency_fresh};

/// A file no processor applies to. The body is read on demand.
#[derive(Debug, Clone)]
pub struct StaticAsset {
    pub(crate) meta: AssetMeta,
}

impl StaticAsset {
    pub(crate) fn build(env: &Environment, logical_path: &str, pathname: &Path) -> Result<Self> {
        let not_found = || Error::NotFound(pathname.display().to_string());

        let stat = env.stat(pathname).ok_or_else(not_found)?;
        let metadata = fs::metadata(pathname).map_err(|e| Error::Io(pathname.to_path_buf(), e))?;
        let digest = env.file_digest(pathname).ok_or_else(not_found)?;

        Ok(Self {
            meta: AssetMeta {
                logical_path: logical_path.to_string(),
                pathname: pathname.to_path_buf(),
                content_type: env.content_type_of(pathname),
                mtime: stat.mtime,
                length: metadata.len(),
                digest,
            },
        })
    }

    pub(crate) fn from_meta(meta: AssetMeta) -> Self {
        Self { meta }
    }

    /// The file itself, tracked by content so a touched but unchanged file
    /// stays fresh.
    pub(crate) fn dependency_file(&self) -> DependencyFile {
        DependencyFile {
            path: self.meta.pathname.clone(),
            mtime: self.meta.mtime,
            digest: self.meta.digest.clone(),
            tracking: Tracking::Digest,
        }
    }

    pub(crate) fn is_fresh(&self, env: &Environment) -> bool {
        dependency_fresh(env, &self.dependency_file())
    }

    pub(crate) fn read(&self) -> Result<Vec<u8>> {
        fs::read(&self.meta.pathname).map_err(|e| Error::Io(self.meta.pathname.clone(), e))
    }
}
