//! Error types for archive operations.
//!
//! Every fallible function in this crate returns [`Result<T>`]. Errors from the
//! `zip` and `binrw` crates and from `std::io` convert automatically.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Errors that can occur while reading, extracting or rebuilding archives.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Reading or writing the underlying stream failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The zip crate could not parse the archive.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A pack table-of-contents record could not be read or written.
    #[error("binrw error: {0}")]
    BinRw(#[from] binrw::Error),

    /// The stream does not start with the pack magic.
    #[error("invalid pack magic: {0:#018x}")]
    InvalidMagic(u64),

    /// The pack was written by an unknown format version.
    #[error("unsupported pack version: {0}")]
    InvalidVersion(u32),

    /// A pack entry uses a compression id this crate does not know.
    #[error("invalid compression type: {0}")]
    InvalidCompressionType(u8),

    /// The requested entry is not part of the archive.
    #[error("entry not found: {0}")]
    EntryNotFound(String),

    /// Two entries in a container share the same (case-insensitive) path.
    #[error("duplicate entry: {0}")]
    DuplicateEntry(String),

    /// An entry path is empty or contains a NUL byte.
    #[error("invalid entry path: {0:?}")]
    InvalidEntryPath(String),

    /// A header or TOC field points past the end of the stream.
    #[error("truncated archive: {0}")]
    Truncated(String),

    /// No registered codec recognises the archive signature.
    #[error("unsupported archive format: {0}")]
    UnsupportedFormat(String),

    /// The codec can read the format but cannot write it back.
    #[error("{codec} archives cannot be rebuilt")]
    RebuildUnsupported { codec: &'static str },

    /// Stored data does not match the checksum recorded in the table of contents.
    #[error("checksum mismatch for '{path}': expected {expected:016x}, found {actual:016x}")]
    ChecksumMismatch {
        path: String,
        expected: u64,
        actual: u64,
    },

    /// A string could not be parsed as a content hash.
    #[error("invalid content hash: {0:?}")]
    InvalidHash(String),

    /// Catch-all for errors raised by data providers during rebuilds.
    #[error("{0}")]
    Other(String),
}

impl From<String> for ArchiveError {
    fn from(s: String) -> Self {
        ArchiveError::Other(s)
    }
}
