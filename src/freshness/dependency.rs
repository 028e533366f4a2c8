//! Recorded dependency files and the shared freshness check.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::mtime::is_newer;
use crate::environment::Environment;
use crate::error::{Error, Result};

/// How a recorded dependency is compared against the live file system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tracking {
    /// `depend_on`: only a newer mtime marks it stale.
    Mtime,
    /// Own file, required files, `depend_on_asset` and directories:
    /// any change of the salted content digest marks it stale.
    Digest,
}

/// A file (or directory) an asset was built from, as it was at build time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyFile {
    pub path: PathBuf,
    pub mtime: SystemTime,
    pub digest: String,
    pub tracking: Tracking,
}

impl DependencyFile {
    /// Record the current state of `path`.
    pub fn capture(env: &Environment, path: &Path, tracking: Tracking) -> Result<Self> {
        let stat = env
            .stat(path)
            .ok_or_else(|| Error::NotFound(path.display().to_string()))?;
        let digest = env
            .file_digest(path)
            .ok_or_else(|| Error::NotFound(path.display().to_string()))?;

        Ok(Self {
            path: path.to_path_buf(),
            mtime: stat.mtime,
            digest,
            tracking,
        })
    }
}

/// Check a recorded dependency against the live file system.
///
/// A missing path is always stale.
pub fn dependency_fresh(env: &Environment, dep: &DependencyFile) -> bool {
    let Some(stat) = env.stat(&dep.path) else {
        crate::debug!("fresh"; "{} (removed)", dep.path.display());
        return false;
    };

    let fresh = match dep.tracking {
        Tracking::Mtime => !is_newer(stat.mtime, dep.mtime),
        Tracking::Digest => env
            .file_digest(&dep.path)
            .is_some_and(|digest| digest == dep.digest),
    };

    if !fresh {
        crate::debug!("fresh"; "{} (changed)", dep.path.display());
    }
    fresh
}
