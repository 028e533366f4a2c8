//! Freshness detection: salted content digests (blake3) and mtimes.
//!
//! An asset records every file it was built from as a [`DependencyFile`].
//! Re-checking those records against the live file system is the only way
//! an asset is ever considered fresh; no verdict is cached.

mod dependency;
mod hash;
pub mod mtime;

pub use dependency::{DependencyFile, Tracking, dependency_fresh};
pub use hash::{digest_bytes, digest_reader, hex_digest};
