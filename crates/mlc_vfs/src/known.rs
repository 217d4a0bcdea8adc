//! Known archives: the top-level files the installer can reacquire.

use crate::error::{Result, VfsError};
use crate::hash_cache::{file_stamp, HashCache};
use camino::{Utf8Path, Utf8PathBuf};
use mlc_archive::ContentHash;
use serde::{Deserialize, Serialize};

/// Where a known archive comes from, and therefore how the installer gets it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ArchiveSource {
    /// A download with a `.meta` sidecar.
    #[serde(rename_all = "camelCase")]
    Download {
        /// Stable identity of the download, e.g. a URL or `game|mod|file` key.
        primary_key: String,
        /// Raw sidecar text, carried into the manifest for the installer.
        #[serde(default)]
        meta: String,
    },
    /// A file shipped with the game installation.
    GameFile { game: String },
}

/// A top-level archive the index knows about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnownArchive {
    /// File name as it should appear in the manifest.
    pub name: String,
    pub path: Utf8PathBuf,
    pub hash: ContentHash,
    pub size: u64,
    /// Modification time in seconds since the Unix epoch.
    pub modified: u64,
    pub source: ArchiveSource,
}

impl KnownArchive {
    /// Stat and hash `path`, going through `cache` when one is given.
    pub fn from_path(
        path: &Utf8Path,
        source: ArchiveSource,
        cache: Option<&HashCache>,
    ) -> Result<Self> {
        let name = path
            .file_name()
            .ok_or_else(|| VfsError::InvalidPath(path.to_path_buf()))?
            .to_string();
        let (size, modified) = file_stamp(path)?;
        let hash = match cache {
            Some(cache) => cache.hash_file(path)?,
            None => ContentHash::of_file(path)?,
        };

        Ok(Self {
            name,
            path: path.to_path_buf(),
            hash,
            size,
            modified,
            source,
        })
    }

    pub fn is_game_file(&self) -> bool {
        matches!(self.source, ArchiveSource::GameFile { .. })
    }

    /// Name of the game this archive ships with, if it is a game file.
    pub fn game(&self) -> Option<&str> {
        match &self.source {
            ArchiveSource::GameFile { game } => Some(game),
            ArchiveSource::Download { .. } => None,
        }
    }
}
