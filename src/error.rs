// File: src/error.rs
// Error type shared across the crate.

use crate::core::context::Context;
use std::path::PathBuf;
use thiserror::Error;

/// Convenient result type used throughout the crate.
pub type Result<T, E = ChatError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ChatError {
    /// Temperature must be a finite value greater than zero.
    #[error("invalid temperature: {0} (must be > 0)")]
    InvalidTemperature(f64),
    /// The context was never observed during training. Callers treat this
    /// as the end of the model, not as a failure.
    #[error("unknown context {0}")]
    UnknownContext(Context),
    /// Upsert attempted on a store opened for serving.
    #[error("frequency store at {0:?} is read-only")]
    ReadOnlyStore(PathBuf),
    #[error("context has {found} tokens but the store expects {expected}")]
    OrderMismatch { expected: usize, found: usize },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("io error while processing {path:?}: {source}")]
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ChatError {
    /// Wraps an IO error, attaching the path it happened on when known.
    pub fn io(source: std::io::Error, path: Option<PathBuf>) -> Self {
        Self::Io { source, path }
    }

    /// True for conditions that mean "the model ran out", which end a
    /// generation gracefully instead of surfacing to the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::UnknownContext(_))
    }
}

impl From<bincode::Error> for ChatError {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
