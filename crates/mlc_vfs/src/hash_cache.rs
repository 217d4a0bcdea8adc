//! Persistent cache of file content hashes.
//!
//! Hashing every download and game file is the slowest part of indexing, and
//! those files rarely change between compilations. The [`HashCache`] remembers
//! the SHA-256 of each file together with the size and modification time it had
//! when it was hashed, and is persisted as `hash_cache.json` in the compiler's
//! state directory. A file whose size or timestamp differs is rehashed.
//!
//! # JSON format
//!
//! ```json
//! {
//!   "version": 1,
//!   "entries": {
//!     "D:/Modding/downloads/SomeMod.zip": {
//!       "size": 1048576,
//!       "modified": 1700000000,
//!       "hash": "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
//!     }
//!   }
//! }
//! ```

use crate::error::Result;
use camino::Utf8Path;
use mlc_archive::ContentHash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::UNIX_EPOCH;

const HASH_CACHE_VERSION: u32 = 1;

/// A cached hash, valid while the file keeps the recorded size and mtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedHash {
    pub size: u64,
    /// Seconds since the Unix epoch.
    pub modified: u64,
    pub hash: ContentHash,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HashCacheFile {
    version: u32,
    entries: BTreeMap<String, CachedHash>,
}

/// Thread-safe hash cache shared by the parallel hashing passes.
#[derive(Debug, Default)]
pub struct HashCache {
    entries: RwLock<BTreeMap<String, CachedHash>>,
    dirty: AtomicBool,
}

/// Size and modification time (epoch seconds) of a file.
pub fn file_stamp(path: &Utf8Path) -> Result<(u64, u64)> {
    let metadata = std::fs::metadata(path.as_std_path())?;
    let modified = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);
    Ok((metadata.len(), modified))
}

impl HashCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the cache from a file.
    ///
    /// A missing file or a file written by another schema version yields an
    /// empty cache. A file that exists but cannot be parsed is an error.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        if !path.as_std_path().exists() {
            return Ok(Self::new());
        }

        let contents = std::fs::read_to_string(path.as_std_path())?;
        let file: HashCacheFile = serde_json::from_str(&contents)?;
        if file.version != HASH_CACHE_VERSION {
            tracing::info!(
                "Discarding hash cache with version {} (current: {})",
                file.version,
                HASH_CACHE_VERSION
            );
            return Ok(Self::new());
        }

        tracing::debug!("Loaded {} cached hashes from {}", file.entries.len(), path);
        Ok(Self {
            entries: RwLock::new(file.entries),
            dirty: AtomicBool::new(false),
        })
    }

    /// Save the cache to a file if anything changed since it was loaded.
    ///
    /// Creates parent directories if needed.
    pub fn save(&self, path: &Utf8Path) -> Result<()> {
        if !self.dirty.load(Ordering::Acquire) && path.as_std_path().exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent.as_std_path())?;
        }

        let entries = self.read_entries().clone();
        let contents = serde_json::to_string_pretty(&HashCacheFile {
            version: HASH_CACHE_VERSION,
            entries,
        })?;
        std::fs::write(path.as_std_path(), contents)?;
        self.dirty.store(false, Ordering::Release);
        Ok(())
    }

    /// Hash a file, reusing the cached value when size and mtime still match.
    pub fn hash_file(&self, path: &Utf8Path) -> Result<ContentHash> {
        let (size, modified) = file_stamp(path)?;
        let key = path.as_str().to_string();

        if let Some(cached) = self.read_entries().get(&key) {
            if cached.size == size && cached.modified == modified {
                return Ok(cached.hash);
            }
        }

        let hash = ContentHash::of_file(path)?;
        self.write_entries().insert(key, CachedHash { size, modified, hash });
        self.dirty.store(true, Ordering::Release);
        Ok(hash)
    }

    /// Look up a cached entry without touching the file system.
    pub fn get(&self, path: &Utf8Path) -> Option<CachedHash> {
        self.read_entries().get(path.as_str()).copied()
    }

    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A poisoned lock only means another hashing thread panicked; the map itself
    // is still consistent because every write is a single insert.
    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, CachedHash>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_entries(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, CachedHash>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    fn temp_path(dir: &TempDir, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join(name)).unwrap()
    }

    #[test]
    fn test_hash_file_populates_cache() {
        let dir = TempDir::new().unwrap();
        let file = temp_path(&dir, "a.bin");
        std::fs::write(&file, b"abc").unwrap();

        let cache = HashCache::new();
        let hash = cache.hash_file(&file).unwrap();
        assert_eq!(hash, ContentHash::of(b"abc"));
        assert_eq!(cache.get(&file).unwrap().size, 3);
    }

    #[test]
    fn test_cached_value_is_reused_while_stamp_matches() {
        let dir = TempDir::new().unwrap();
        let file = temp_path(&dir, "a.bin");
        std::fs::write(&file, b"abc").unwrap();
        let (size, modified) = file_stamp(&file).unwrap();

        let cache = HashCache::new();
        let fake = ContentHash::of(b"something else");
        cache
            .write_entries()
            .insert(file.to_string(), CachedHash { size, modified, hash: fake });

        assert_eq!(cache.hash_file(&file).unwrap(), fake);
    }

    #[test]
    fn test_changed_size_forces_rehash() {
        let dir = TempDir::new().unwrap();
        let file = temp_path(&dir, "a.bin");
        std::fs::write(&file, b"abc").unwrap();

        let cache = HashCache::new();
        cache.hash_file(&file).unwrap();
        std::fs::write(&file, b"abcdef").unwrap();

        assert_eq!(cache.hash_file(&file).unwrap(), ContentHash::of(b"abcdef"));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let file = temp_path(&dir, "a.bin");
        let cache_path = temp_path(&dir, "state/hash_cache.json");
        std::fs::write(&file, b"abc").unwrap();

        let cache = HashCache::new();
        cache.hash_file(&file).unwrap();
        cache.save(&cache_path).unwrap();

        let loaded = HashCache::load(&cache_path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get(&file), cache.get(&file));
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = TempDir::new().unwrap();
        let cache = HashCache::load(&temp_path(&dir, "missing.json")).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_load_other_version_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = temp_path(&dir, "hash_cache.json");
        std::fs::write(&path, r#"{"version":99,"entries":{}}"#).unwrap();
        assert!(HashCache::load(&path).unwrap().is_empty());
    }

    #[test]
    fn test_load_invalid_json_is_error() {
        let dir = TempDir::new().unwrap();
        let path = temp_path(&dir, "hash_cache.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(HashCache::load(&path).is_err());
    }
}
