//! Built assets.
//!
//! | Variant     | Built when                 | Output                          |
//! |-------------|----------------------------|---------------------------------|
//! | `Static`    | no processor applies       | the file as-is                  |
//! | `Processed` | single file, `bundle=false`| processor output of one file    |
//! | `Bundled`   | `bundle=true`              | required files concatenated     |
//!
//! All variants share [`AssetMeta`] and answer freshness against the live
//! file system through [`crate::freshness::dependency_fresh`].

mod bundled;
mod codec;
mod processed;
mod static_asset;

pub use bundled::BundledAsset;
pub use codec::{AssetClass, AssetRecord, DependencyRecord};
pub use processed::ProcessedAsset;
pub use static_asset::StaticAsset;

use std::borrow::Cow;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::freshness::DependencyFile;
use crate::freshness::mtime::secs;

/// Attributes every asset carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetMeta {
    pub logical_path: String,
    pub pathname: PathBuf,
    pub content_type: String,
    pub mtime: SystemTime,
    /// Output length in bytes.
    pub length: u64,
    /// Salted digest of the full output.
    pub digest: String,
}

#[derive(Debug)]
pub enum Asset {
    Static(StaticAsset),
    Processed(ProcessedAsset),
    Bundled(BundledAsset),
}

impl Asset {
    pub fn meta(&self) -> &AssetMeta {
        match self {
            Self::Static(asset) => &asset.meta,
            Self::Processed(asset) => &asset.meta,
            Self::Bundled(asset) => &asset.meta,
        }
    }

    pub fn class(&self) -> AssetClass {
        match self {
            Self::Static(_) => AssetClass::StaticAsset,
            Self::Processed(_) => AssetClass::ProcessedAsset,
            Self::Bundled(_) => AssetClass::BundledAsset,
        }
    }

    pub fn class_name(&self) -> &'static str {
        self.class().name()
    }

    #[inline]
    pub fn logical_path(&self) -> &str {
        &self.meta().logical_path
    }

    #[inline]
    pub fn pathname(&self) -> &Path {
        &self.meta().pathname
    }

    #[inline]
    pub fn content_type(&self) -> &str {
        &self.meta().content_type
    }

    #[inline]
    pub fn mtime(&self) -> SystemTime {
        self.meta().mtime
    }

    #[inline]
    pub fn length(&self) -> u64 {
        self.meta().length
    }

    #[inline]
    pub fn digest(&self) -> &str {
        &self.meta().digest
    }

    // ========================================================================
    // Freshness
    // ========================================================================

    /// Whether the files this asset was built from are unchanged.
    ///
    /// Always checks the live file system; the verdict is never cached.
    pub fn is_fresh(&self, env: &Environment) -> bool {
        match self {
            Self::Static(asset) => asset.is_fresh(env),
            Self::Processed(asset) => asset.is_fresh(env),
            Self::Bundled(asset) => asset.is_fresh(env),
        }
    }

    pub fn is_stale(&self, env: &Environment) -> bool {
        !self.is_fresh(env)
    }

    /// Files concatenated into this asset's bundle, itself excluded.
    pub fn dependencies(&self) -> Vec<PathBuf> {
        self.required_paths()
            .into_iter()
            .filter(|path| path != self.pathname())
            .collect()
    }

    /// Bundle order of the files this asset requires, itself included.
    pub(crate) fn required_paths(&self) -> Vec<PathBuf> {
        match self {
            Self::Static(asset) => vec![asset.meta.pathname.clone()],
            Self::Processed(asset) => asset.required_paths.clone(),
            Self::Bundled(asset) => asset.processed.required_paths(),
        }
    }

    /// Everything freshness is checked against.
    pub(crate) fn dependency_files(&self) -> Vec<DependencyFile> {
        match self {
            Self::Static(asset) => vec![asset.dependency_file()],
            Self::Processed(asset) => asset.dependency_paths.clone(),
            Self::Bundled(asset) => asset.processed.dependency_files(),
        }
    }

    // ========================================================================
    // Output
    // ========================================================================

    /// The assets whose bodies make up this one, in order.
    pub fn to_list(self: &Arc<Self>) -> Vec<Arc<Asset>> {
        match self.as_ref() {
            Self::Bundled(asset) => asset.required_assets.clone(),
            _ => vec![Arc::clone(self)],
        }
    }

    /// This asset's own contribution to a bundle.
    pub fn body(&self) -> Result<Cow<'_, str>> {
        match self {
            Self::Static(asset) => Ok(Cow::Owned(lossy(asset.read()?))),
            Self::Processed(asset) => Ok(Cow::Borrowed(&asset.source)),
            Self::Bundled(asset) => asset.processed.body(),
        }
    }

    /// Full output bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Self::Static(asset) => asset.read(),
            Self::Processed(asset) => Ok(asset.source.clone().into_bytes()),
            Self::Bundled(asset) => Ok(asset.source.clone().into_bytes()),
        }
    }

    /// Full output as text, replacing invalid UTF-8.
    pub fn to_string_lossy(&self) -> Result<String> {
        match self {
            Self::Static(asset) => Ok(lossy(asset.read()?)),
            Self::Processed(asset) => Ok(asset.source.clone()),
            Self::Bundled(asset) => Ok(asset.source.clone()),
        }
    }

    /// Write the full output to `path`, gzipped if it ends in `.gz`.
    ///
    /// The file is written next to the target and renamed into place, then
    /// given this asset's mtime.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let io_err = |e| Error::Io(path.to_path_buf(), e);

        let bytes = self.to_bytes()?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push("+");
        let tmp = PathBuf::from(tmp);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let written = if path.extension().is_some_and(|ext| ext == "gz") {
            write_gzip(&tmp, &bytes)
        } else {
            fs::write(&tmp, &bytes)
        };
        if let Err(e) = written.and_then(|()| fs::rename(&tmp, path)) {
            let _ = fs::remove_file(&tmp);
            return Err(io_err(e));
        }

        File::options()
            .write(true)
            .open(path)
            .and_then(|file| file.set_modified(self.mtime()))
            .map_err(io_err)
    }
}

/// Same kind, logical path, mtime (to the second) and digest.
impl PartialEq for Asset {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (self.meta(), other.meta());
        self.class() == other.class()
            && a.logical_path == b.logical_path
            && secs(a.mtime) == secs(b.mtime)
            && a.digest == b.digest
    }
}

fn lossy(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

fn write_gzip(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut encoder = GzEncoder::new(File::create(path)?, Compression::best());
    encoder.write_all(bytes)?;
    encoder.finish()?.sync_all()
}

#[cfg(test)]
mod tests;
