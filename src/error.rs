//! Error types for the order book
//!
//! Only construction-time failures are errors. Matching and queue operations
//! report "nothing happened" through empty results or `false`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Top-level crate error
#[derive(Error, Debug)]
pub enum BookError {
    #[error("queue capacity must be a power of two of at least 2, got {capacity}")]
    InvalidQueueCapacity { capacity: usize },

    #[error("invalid engine config: {reason}")]
    InvalidConfig { reason: String },

    #[error("failed to parse engine config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("failed to open {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("failed to resize {}: {source}", .path.display())]
    Resize { path: PathBuf, source: io::Error },

    #[error("failed to map {}: {source}", .path.display())]
    Map { path: PathBuf, source: io::Error },

    #[error("failed to flush {}: {source}", .path.display())]
    Flush { path: PathBuf, source: io::Error },

    #[error("cannot map zero records from {}", .path.display())]
    EmptyMapping { path: PathBuf },

    #[error("drain worker panicked")]
    WorkerPanicked,
}
