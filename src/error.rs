use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced to callers at configuration or input boundaries.
///
/// Internal invariant violations (duplicate heap keys, heap underflow) are
/// bugs, not recoverable states, and panic instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Sketch width out of range. Widths are powers of two; the exponent is
    /// capped at 30 so the hash high bit stays free for sign use.
    #[error("invalid sketch width: log2_width must be in [{min}, 30], got {got}")]
    InvalidWidth { got: u32, min: u32 },

    #[error("invalid sketch depth: must be at least 1")]
    InvalidDepth,

    #[error("initial learning rate must be positive, got {0}")]
    InvalidLearningRate(f32),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A record in a sparse dataset could not be parsed. The run aborts;
    /// there is no partial-line recovery.
    #[error("malformed record at {path}:{line}: {reason}")]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
