//! Rivets - an asset pipeline.
//!
//! Logical paths such as `application.js` are resolved against ordered
//! search roots, run through a per-type chain of processors, bundled with
//! everything they `require`, and cached in memory (and optionally in an
//! external store) until a file they depend on changes.
//!
//! ```text
//! Environment::find_asset("application.js")
//!   ├── resolve        search roots × extensions × aliases
//!   ├── attributes     format / engine extensions, content type, processors
//!   ├── build          Static | Processed | Bundled
//!   └── freshness      mtimes and digests of every dependency
//! ```

pub mod asset;
pub mod attributes;
pub mod config;
pub mod context;
pub mod environment;
pub mod error;
pub mod freshness;
pub mod logger;
pub mod mime;
pub mod processor;
pub mod search;

pub use asset::Asset;
pub use context::Context;
pub use environment::{CacheStore, Environment, FileStore, MemoryStore, PathFilter};
pub use error::{Error, Result};
pub use processor::{FnProcessor, Processor};

/// Engine version, folded into every digest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
