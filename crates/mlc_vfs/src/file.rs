//! Virtual files and hash paths.

use crate::image_state::ImageFingerprint;
use mlc_archive::ContentHash;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a [`VirtualFile`] inside a [`ContentIndex`](crate::ContentIndex).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub u32);

/// Index of a [`KnownArchive`](crate::KnownArchive) inside a [`ContentIndex`](crate::ContentIndex).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchiveId(pub u32);

/// A file known to the index: either a top-level archive or an entry nested
/// (possibly several levels deep) inside one.
#[derive(Debug, Clone)]
pub struct VirtualFile {
    pub id: FileId,
    /// For a top-level archive its file name, otherwise the entry path inside
    /// the immediate container.
    pub name: String,
    pub hash: ContentHash,
    pub size: u64,
    pub parent: Option<FileId>,
    pub archive: ArchiveId,
    /// 0 for a top-level archive, incremented once per enclosing container.
    pub nesting_factor: u32,
    pub fingerprint: Option<ImageFingerprint>,
}

impl VirtualFile {
    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }

    /// Last path segment of [`name`](Self::name).
    pub fn file_name(&self) -> &str {
        file_name_of(&self.name)
    }

    /// Directory part of [`name`](Self::name), empty at the container root.
    pub fn folder(&self) -> &str {
        self.name.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
    }
}

/// Last `/`-separated segment of `path`.
pub(crate) fn file_name_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(_, name)| name).unwrap_or(path)
}

/// The address of a file: a top-level archive hash followed by the entry path
/// at each nesting level.
///
/// Displays as `hash|level1|level2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashPath {
    pub hash: ContentHash,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<String>,
}

impl HashPath {
    pub fn new(hash: ContentHash, parts: Vec<String>) -> Self {
        Self { hash, parts }
    }

    /// The address of a top-level archive.
    pub fn archive(hash: ContentHash) -> Self {
        Self::new(hash, Vec::new())
    }

    /// Number of nesting levels below the top-level archive.
    pub fn depth(&self) -> usize {
        self.parts.len()
    }
}

impl fmt::Display for HashPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hash)?;
        for part in &self.parts {
            write!(f, "|{}", part)?;
        }
        Ok(())
    }
}
