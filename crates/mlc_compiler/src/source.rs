//! Source records: the files of the installation being compiled.

use crate::error::Result;
use crate::path::RelativePath;
use camino::{Utf8Path, Utf8PathBuf};
use mlc_archive::ContentHash;
use mlc_vfs::HashCache;
use rayon::prelude::*;
use walkdir::WalkDir;

/// Where a record extracted from a game container came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerOrigin {
    /// The container's own path.
    pub container: RelativePath,
    /// Entry path inside the container.
    pub entry: String,
}

/// One file to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSourceFile {
    pub path: RelativePath,
    pub absolute: Utf8PathBuf,
    pub hash: ContentHash,
    pub size: u64,
    pub container: Option<ContainerOrigin>,
}

impl RawSourceFile {
    /// Hash `absolute` and build a record for it.
    pub fn from_file(path: RelativePath, absolute: Utf8PathBuf) -> Result<Self> {
        let size = std::fs::metadata(absolute.as_std_path())?.len();
        let hash = ContentHash::of_file(&absolute)?;
        Ok(Self {
            path,
            absolute,
            hash,
            size,
            container: None,
        })
    }

    pub fn read(&self) -> Result<Vec<u8>> {
        Ok(std::fs::read(self.absolute.as_std_path())?)
    }

    pub fn read_to_string(&self) -> Result<String> {
        Ok(std::fs::read_to_string(self.absolute.as_std_path())?)
    }
}

/// Enumerates and hashes every file under an installation root.
pub struct SourceWalker<'a> {
    root: Utf8PathBuf,
    cache: Option<&'a HashCache>,
    /// Files the compiler writes itself.
    excluded: Vec<Utf8PathBuf>,
}

impl<'a> SourceWalker<'a> {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: None,
            excluded: Vec::new(),
        }
    }

    /// Leave `path` out of the walk.
    pub fn excluding(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.excluded.push(path.into());
        self
    }

    pub fn with_cache(mut self, cache: &'a HashCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Records sorted by relative path. Files that vanish or fail to hash are
    /// logged and skipped.
    pub fn walk(&self) -> Result<Vec<RawSourceFile>> {
        tracing::info!("Scanning {}", self.root);

        let mut files = Vec::new();
        for entry in WalkDir::new(self.root.as_std_path()).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let absolute = match Utf8PathBuf::from_path_buf(entry.into_path()) {
                Ok(path) => path,
                Err(path) => {
                    tracing::warn!("Skipping non-UTF-8 path: {}", path.display());
                    continue;
                }
            };
            if self.excluded.iter().any(|p| *p == absolute) {
                tracing::debug!("Skipping compiler output {}", absolute);
                continue;
            }
            let Ok(relative) = absolute.strip_prefix(&self.root) else {
                continue;
            };
            files.push((RelativePath::new(relative.as_str()), absolute.clone()));
        }
        files.sort();

        let records: Vec<Option<RawSourceFile>> = files
            .into_par_iter()
            .map(|(path, absolute)| match self.hash(&absolute) {
                Ok((hash, size)) => Some(RawSourceFile {
                    path,
                    absolute,
                    hash,
                    size,
                    container: None,
                }),
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", absolute, e);
                    None
                }
            })
            .collect();

        let records: Vec<RawSourceFile> = records.into_iter().flatten().collect();
        tracing::info!("Found {} source files", records.len());
        Ok(records)
    }

    fn hash(&self, path: &Utf8Path) -> Result<(ContentHash, u64)> {
        let size = std::fs::metadata(path.as_std_path())?.len();
        let hash = match self.cache {
            Some(cache) => cache.hash_file(path)?,
            None => ContentHash::of_file(path)?,
        };
        Ok((hash, size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_is_sorted_and_hashed() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        std::fs::create_dir_all(root.join("mods/B")).unwrap();
        std::fs::create_dir_all(root.join("mods/A")).unwrap();
        std::fs::write(root.join("mods/B/b.txt"), b"b").unwrap();
        std::fs::write(root.join("mods/A/a.txt"), b"a").unwrap();
        std::fs::write(root.join("ModOrganizer.ini"), b"ini").unwrap();

        let records = SourceWalker::new(root.clone()).walk().unwrap();
        let paths: Vec<&str> = records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["ModOrganizer.ini", "mods/A/a.txt", "mods/B/b.txt"]);
        assert_eq!(records[1].hash, ContentHash::of(b"a"));
        assert_eq!(records[1].size, 1);
        assert_eq!(records[1].absolute, root.join("mods/A/a.txt"));
    }

    #[test]
    fn test_walk_uses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        std::fs::write(root.join("a.txt"), b"a").unwrap();

        let cache = HashCache::new();
        SourceWalker::new(root.clone()).with_cache(&cache).walk().unwrap();
        assert!(cache.get(&root.join("a.txt")).is_some());
    }

    #[test]
    fn test_walk_skips_excluded_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        std::fs::write(root.join("a.txt"), b"a").unwrap();
        std::fs::write(root.join("List.modlist"), b"output").unwrap();
        std::fs::write(root.join("hashes.json"), b"{}").unwrap();

        let records = SourceWalker::new(root.clone())
            .excluding(root.join("List.modlist"))
            .excluding(root.join("hashes.json"))
            .walk()
            .unwrap();
        let paths: Vec<&str> = records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt"]);
    }
}
