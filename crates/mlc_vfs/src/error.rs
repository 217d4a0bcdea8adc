//! Error types for index operations.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, VfsError>;

/// Errors raised while discovering, hashing or indexing archives.
///
/// Archives that fail to open while the index is built do not produce an
/// error: they are logged and skipped.
#[derive(Error, Debug)]
pub enum VfsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("archive error: {0}")]
    Archive(#[from] mlc_archive::ArchiveError),

    /// A path handed to the index is not valid UTF-8 or has no file name.
    #[error("invalid path: {0}")]
    InvalidPath(Utf8PathBuf),

    #[error("{0}")]
    Other(String),
}

impl From<String> for VfsError {
    fn from(s: String) -> Self {
        VfsError::Other(s)
    }
}
