//! Content-addressed store for bytes shipped inside the mod list.

use crate::error::{CompilerError, Result};
use camino::Utf8PathBuf;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Where a blob's bytes come from when the mod list is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobSource {
    /// Copied from a file at export time. Used for inlined source files so
    /// large files are not held in memory.
    File(Utf8PathBuf),
    Bytes(Vec<u8>),
}

/// Append-only blob store shared by all steps.
///
/// Inserting an id that already exists is a no-op: ids are derived from
/// content, so the first writer's bytes are as good as any later writer's.
#[derive(Debug, Default)]
pub struct BlobStore {
    blobs: Mutex<BTreeMap<String, BlobSource>>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_bytes(&self, id: impl Into<String>, bytes: Vec<u8>) -> String {
        self.insert(id.into(), BlobSource::Bytes(bytes))
    }

    pub fn insert_file(&self, id: impl Into<String>, path: Utf8PathBuf) -> String {
        self.insert(id.into(), BlobSource::File(path))
    }

    fn insert(&self, id: String, source: BlobSource) -> String {
        self.lock().entry(id.clone()).or_insert(source);
        id
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    pub fn read(&self, id: &str) -> Result<Vec<u8>> {
        let source = self
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| CompilerError::BlobNotFound(id.to_string()))?;
        match source {
            BlobSource::Bytes(bytes) => Ok(bytes),
            BlobSource::File(path) => Ok(std::fs::read(path.as_std_path())?),
        }
    }

    /// Ids in sorted order.
    pub fn ids(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, BlobSource>> {
        self.blobs.lock().unwrap_or_else(|e| e.into_inner())
    }
}
