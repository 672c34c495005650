//! Error handling for S3M loading and playback.

use thiserror::Error;

/// Convenient result alias for S3M parsing and playback.
pub type Result<T> = std::result::Result<T, S3mError>;

/// Errors that may occur while loading an S3M module.
///
/// Playback itself never fails: the engine degrades gracefully (channels
/// deactivate on sample underrun, unimplemented commands are ignored).
#[derive(Debug, Error)]
pub enum S3mError {
    /// The file header failed validation (magic bytes, EOF marker, type
    /// field, or one of the count fields out of range).
    #[error("not an S3M module: {0}")]
    BadModule(&'static str),

    /// An instrument header failed validation.
    #[error("instrument {index}: {reason}")]
    BadInstrument {
        /// Zero-based instrument index inside the file.
        index: usize,
        /// What went wrong.
        reason: String,
    },

    /// A packed pattern stream truncated mid-slot or produced an
    /// impossible row.
    #[error("pattern {pattern}: {reason}")]
    MalformedPattern {
        /// Zero-based pattern index inside the file.
        pattern: usize,
        /// What went wrong.
        reason: String,
    },

    /// The underlying read failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
