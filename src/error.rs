//! Engine error types.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while resolving, building or caching assets.
#[derive(Debug, Error)]
pub enum Error {
    /// Logical path resolves to no physical file in any root.
    #[error("couldn't find file `{0}`")]
    NotFound(String),

    /// A `require` points at a missing file or one of another content type.
    #[error("can't require `{path}`: {reason}")]
    InvalidRequire { path: String, reason: String },

    /// An engine or processor failed while transforming a file.
    #[error("{processor} failed (in {})", .path.display())]
    ProcessorFailure {
        path: PathBuf,
        processor: String,
        #[source]
        source: anyhow::Error,
    },

    /// A cached asset entry could not be trusted.
    #[error("cache entry rejected: {0}")]
    CacheCorruption(String),

    #[error("{} has already been required", .0.display())]
    CircularDependency(PathBuf),

    #[error("{}:{line}: {message}", .path.display())]
    Directive {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("IO error on `{}`", .0.display())]
    Io(PathBuf, #[source] std::io::Error),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Lift an error returned by a processor back into the engine error type.
    ///
    /// Engine errors raised through the `Context` (bad requires, cycles)
    /// keep their identity; anything else is attributed to the processor.
    pub(crate) fn from_processor(path: PathBuf, processor: &str, err: anyhow::Error) -> Self {
        match err.downcast::<Error>() {
            Ok(engine) => engine,
            Err(source) => Self::ProcessorFailure {
                path,
                processor: processor.to_string(),
                source,
            },
        }
    }
}
