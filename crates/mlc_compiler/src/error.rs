//! Error types for compilation.
//!
//! All fallible functions in this crate return [`Result<T>`]. Errors from the
//! archive and index crates, and from the parsers the compiler uses, convert
//! automatically via `From` impls.
//!
//! Most errors raised while resolving a single source file do not abort the
//! compilation: the orchestrator records them as
//! [`RecordFailure`](crate::RecordFailure)s and carries on.

use camino::Utf8PathBuf;
use mlc_archive::ContentHash;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CompilerError>;

#[derive(Error, Debug)]
pub enum CompilerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("archive error: {0}")]
    Archive(#[from] mlc_archive::ArchiveError),

    #[error("index error: {0}")]
    Vfs(#[from] mlc_vfs::VfsError),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("invalid regex: {0}")]
    Regex(#[from] regex::Error),

    #[error("INI error: {0}")]
    Ini(#[from] ini::ParseError),

    /// Diffing or applying a binary patch failed.
    #[error("patch error: {0}")]
    Patch(String),

    /// The settings file is missing a required value or has an invalid one.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// The settings file has an extension other than `.toml` or `.json`.
    #[error("unsupported settings format: {0}")]
    UnsupportedSettingsFormat(Utf8PathBuf),

    /// The cancellation token was set.
    #[error("compilation cancelled")]
    Cancelled,

    /// An entry of a game container was matched by an ignore rule. Dropping a
    /// single entry would make the rebuilt container differ from the original.
    #[error("entry '{entry}' of container '{container}' was ignored: {reason}")]
    IgnoredInContainer {
        container: String,
        entry: String,
        reason: String,
    },

    /// Rebuilding a container from its entries did not reproduce the original bytes.
    #[error("rebuilding '{path}' produced {actual} instead of {expected}")]
    ContainerRebuildMismatch {
        path: String,
        expected: ContentHash,
        actual: ContentHash,
    },

    /// Files the caller marked as critical could not be resolved.
    #[error("{} critical file(s) unresolved: {}", paths.len(), paths.join(", "))]
    CriticalFilesUnresolved { paths: Vec<String> },

    /// A directive references a blob that is not in the blob store.
    #[error("blob not found: {0}")]
    BlobNotFound(String),

    /// A directive points into an archive the index does not know.
    #[error("no known archive with hash {0}")]
    ArchiveNotFound(ContentHash),

    /// The mod list was written by a newer or older compiler.
    #[error("unsupported mod list version: {found} (expected {expected})")]
    UnsupportedModListVersion { found: u32, expected: u32 },

    #[error("{0}")]
    Other(String),
}

impl From<String> for CompilerError {
    fn from(s: String) -> Self {
        CompilerError::Other(s)
    }
}
