//! The content index.
//!
//! The [`ContentIndex`] answers the compiler's central question: "where can the
//! installer get a file with this hash?". It is built once per compilation from
//! the list of [`KnownArchive`]s by opening every archive with the registered
//! [`Codecs`], recursing into nested containers, and recording a [`VirtualFile`]
//! for every file met on the way.
//!
//! Archives are indexed in parallel and merged in input order, so two builds
//! over the same inputs produce identical [`FileId`]s. Candidates returned by
//! [`by_hash`](ContentIndex::by_hash) are ordered by nesting factor, shallowest
//! first.
//!
//! Failures never abort the build:
//!
//! - a top-level archive that cannot be read is skipped with a warning
//! - a nested container that cannot be read is kept as a plain leaf

use crate::file::{file_name_of, ArchiveId, FileId, HashPath, VirtualFile};
use crate::image_state::{is_texture_path, ImageFingerprint, PerceptualHasher};
use crate::known::KnownArchive;
use mlc_archive::{Codecs, ContentHash, SIGNATURE_LEN};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

/// Containers nested deeper than this are indexed as leaves.
pub const DEFAULT_MAX_DEPTH: u32 = 8;

/// A file recorded while indexing a single archive, before ids are assigned.
struct LocalNode {
    name: String,
    hash: ContentHash,
    size: u64,
    parent: Option<usize>,
    depth: u32,
    fingerprint: Option<ImageFingerprint>,
}

/// Configures and runs an index build.
pub struct IndexBuilder {
    codecs: Arc<Codecs>,
    hasher: Option<Arc<dyn PerceptualHasher>>,
    max_depth: u32,
}

impl IndexBuilder {
    pub fn new(codecs: Arc<Codecs>) -> Self {
        Self {
            codecs,
            hasher: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Fingerprint texture-class files while indexing.
    pub fn with_perceptual_hasher(mut self, hasher: Arc<dyn PerceptualHasher>) -> Self {
        self.hasher = Some(hasher);
        self
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Index `archives`. Their order fixes the order of ids and tie candidates.
    pub fn build(&self, archives: Vec<KnownArchive>) -> ContentIndex {
        tracing::info!("Building content index from {} known archives", archives.len());

        let trees: Vec<Option<Vec<LocalNode>>> = archives
            .par_iter()
            .map(|archive| self.index_archive(archive))
            .collect();

        let mut index = ContentIndex::default();
        for (archive, tree) in archives.into_iter().zip(trees) {
            let archive_id = ArchiveId(index.archives.len() as u32);
            index.archives.push(archive);
            let Some(tree) = tree else {
                index.roots.push(None);
                continue;
            };

            let base = index.files.len();
            index.roots.push(Some(FileId(base as u32)));
            for (offset, node) in tree.into_iter().enumerate() {
                let id = FileId((base + offset) as u32);
                let parent = node.parent.map(|p| FileId((base + p) as u32));
                if let Some(parent) = parent {
                    index.children.entry(parent).or_default().push(id);
                }
                index.by_hash.entry(node.hash).or_default().push(id);
                index.files.push(VirtualFile {
                    id,
                    name: node.name,
                    hash: node.hash,
                    size: node.size,
                    parent,
                    archive: archive_id,
                    nesting_factor: node.depth,
                    fingerprint: node.fingerprint,
                });
            }
        }

        let files = &index.files;
        for candidates in index.by_hash.values_mut() {
            candidates.sort_by_key(|id| files[id.0 as usize].nesting_factor);
        }
        for file in files.iter().filter(|f| f.fingerprint.is_some()) {
            index
                .by_stem
                .entry(stem_of(file.file_name()))
                .or_default()
                .push(file.id);
        }

        tracing::info!(
            "Content index built: {} archives ({} skipped), {} files, {} unique hashes",
            index.archives.len(),
            index.roots.iter().filter(|r| r.is_none()).count(),
            index.files.len(),
            index.by_hash.len()
        );
        index
    }

    fn index_archive(&self, archive: &KnownArchive) -> Option<Vec<LocalNode>> {
        let header = match Codecs::read_signature(&archive.path) {
            Ok(header) => header,
            Err(e) => {
                tracing::warn!("Skipping unreadable archive '{}': {}", archive.path, e);
                return None;
            }
        };

        let mut nodes = vec![LocalNode {
            name: archive.name.clone(),
            hash: archive.hash,
            size: archive.size,
            parent: None,
            depth: 0,
            fingerprint: None,
        }];

        if self.codecs.is_container(&header) {
            let result = self.codecs.for_each_entry(&archive.path, &mut |path, data| {
                self.push_entry(&mut nodes, 0, 1, path, data);
                Ok(())
            });
            if let Err(e) = result {
                tracing::warn!("Skipping archive '{}': {}", archive.path, e);
                return None;
            }
        } else if self.hasher.is_some() && is_texture_path(&archive.name) {
            match std::fs::read(archive.path.as_std_path()) {
                Ok(data) => nodes[0].fingerprint = self.fingerprint(&archive.name, &data),
                Err(e) => tracing::warn!("Cannot read '{}' for fingerprinting: {}", archive.path, e),
            }
        }

        tracing::debug!("Indexed '{}': {} files", archive.name, nodes.len());
        Some(nodes)
    }

    fn push_entry(&self, nodes: &mut Vec<LocalNode>, parent: usize, depth: u32, path: &str, data: &[u8]) {
        let index = nodes.len();
        nodes.push(LocalNode {
            name: path.to_string(),
            hash: ContentHash::of(data),
            size: data.len() as u64,
            parent: Some(parent),
            depth,
            fingerprint: self.fingerprint(path, data),
        });

        let header = &data[..data.len().min(SIGNATURE_LEN)];
        if depth >= self.max_depth || !self.codecs.is_container(header) {
            return;
        }

        let checkpoint = nodes.len();
        let result = self.codecs.for_each_entry_in_bytes(path, data, &mut |child, bytes| {
            self.push_entry(nodes, index, depth + 1, child, bytes);
            Ok(())
        });
        if let Err(e) = result {
            tracing::warn!("Treating nested container '{}' as a plain file: {}", path, e);
            nodes.truncate(checkpoint);
        }
    }

    fn fingerprint(&self, path: &str, data: &[u8]) -> Option<ImageFingerprint> {
        let hasher = self.hasher.as_ref()?;
        if !is_texture_path(path) {
            return None;
        }
        hasher.fingerprint(data)
    }
}

/// Lowercased file name without its extension.
pub fn stem_of(file_name: &str) -> String {
    let name = file_name_of(file_name);
    let stem = name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name);
    stem.to_ascii_lowercase()
}

/// Every file reachable from the known archives, addressable by id and by hash.
#[derive(Default)]
pub struct ContentIndex {
    archives: Vec<KnownArchive>,
    /// Root file of each archive, `None` when the archive was skipped.
    roots: Vec<Option<FileId>>,
    files: Vec<VirtualFile>,
    by_hash: HashMap<ContentHash, Vec<FileId>>,
    children: HashMap<FileId, Vec<FileId>>,
    /// Fingerprinted files by lowercased stem.
    by_stem: HashMap<String, Vec<FileId>>,
}

impl ContentIndex {
    /// Build with the default codecs and no perceptual hasher.
    pub fn build(archives: Vec<KnownArchive>) -> Self {
        IndexBuilder::new(Arc::new(Codecs::default())).build(archives)
    }

    /// All files with `hash`, shallowest first. Empty when unknown.
    pub fn by_hash(&self, hash: &ContentHash) -> &[FileId] {
        self.by_hash.get(hash).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn contains_hash(&self, hash: &ContentHash) -> bool {
        self.by_hash.contains_key(hash)
    }

    pub fn file(&self, id: FileId) -> &VirtualFile {
        &self.files[id.0 as usize]
    }

    pub fn get(&self, id: FileId) -> Option<&VirtualFile> {
        self.files.get(id.0 as usize)
    }

    pub fn parent(&self, id: FileId) -> Option<&VirtualFile> {
        self.file(id).parent.map(|p| self.file(p))
    }

    pub fn children(&self, id: FileId) -> &[FileId] {
        self.children.get(&id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// The archive a file ultimately lives in.
    pub fn archive_of(&self, id: FileId) -> &KnownArchive {
        self.archive(self.file(id).archive)
    }

    pub fn archive(&self, id: ArchiveId) -> &KnownArchive {
        &self.archives[id.0 as usize]
    }

    pub fn archives(&self) -> &[KnownArchive] {
        &self.archives
    }

    /// Root file of an archive, or `None` if it was skipped while indexing.
    pub fn root_of(&self, id: ArchiveId) -> Option<FileId> {
        self.roots.get(id.0 as usize).copied().flatten()
    }

    /// Whether the archive was indexed successfully.
    pub fn is_indexed(&self, id: ArchiveId) -> bool {
        self.root_of(id).is_some()
    }

    /// Address of a file relative to its top-level archive.
    pub fn hash_path(&self, id: FileId) -> HashPath {
        let mut parts = Vec::new();
        let mut current = self.file(id);
        while let Some(parent) = current.parent {
            parts.push(current.name.clone());
            current = self.file(parent);
        }
        parts.reverse();
        HashPath::new(current.hash, parts)
    }

    /// Fingerprinted files whose lowercased stem equals `stem`.
    pub fn by_stem(&self, stem: &str) -> &[FileId] {
        self.by_stem
            .get(&stem.to_ascii_lowercase())
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// The file named `file_name` in the same container folder as `id`.
    pub fn sibling(&self, id: FileId, file_name: &str) -> Option<&VirtualFile> {
        let file = self.file(id);
        let parent = file.parent?;
        let folder = file.folder();
        self.children(parent)
            .iter()
            .map(|c| self.file(*c))
            .find(|c| c.folder() == folder && c.file_name().eq_ignore_ascii_case(file_name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &VirtualFile> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::known::ArchiveSource;
    use camino::{Utf8Path, Utf8PathBuf};
    use mlc_archive::{PackBuilder, PackCompression, PackEntryBuilder};
    use std::io::{Cursor, Write};
    use tempfile::TempDir;

    fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            let options = zip::write::SimpleFileOptions::default();
            for (name, data) in files {
                writer.start_file(*name, options).unwrap();
                writer.write_all(data).unwrap();
            }
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    fn pack_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = PackBuilder::new();
        for (name, _) in files {
            builder = builder.with_entry(PackEntryBuilder::new(*name, PackCompression::Zstd));
        }
        let mut cursor = Cursor::new(Vec::new());
        builder
            .build_to_writer(&mut cursor, |entry| {
                let (_, data) = files.iter().find(|(n, _)| *n == entry.path).unwrap();
                Ok(data.to_vec())
            })
            .unwrap();
        cursor.into_inner()
    }

    fn known(dir: &Utf8Path, name: &str, data: &[u8]) -> KnownArchive {
        let path = dir.join(name);
        std::fs::write(&path, data).unwrap();
        KnownArchive::from_path(
            &path,
            ArchiveSource::Download {
                primary_key: name.to_string(),
                meta: String::new(),
            },
            None,
        )
        .unwrap()
    }

    fn temp_dir() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_nested_containers_are_indexed() {
        let (_guard, dir) = temp_dir();
        let inner = pack_bytes(&[("textures/a.dds", b"AAAA".as_slice())]);
        let outer = zip_bytes(&[
            ("data/inner.pack", inner.as_slice()),
            ("readme.txt", b"hello".as_slice()),
        ]);
        let archive = known(&dir, "Mod.zip", &outer);
        let archive_hash = archive.hash;

        let index = ContentIndex::build(vec![archive]);
        assert_eq!(index.len(), 4);

        let [id] = index.by_hash(&ContentHash::of(b"AAAA")) else {
            panic!("expected exactly one candidate");
        };
        let file = index.file(*id);
        assert_eq!(file.nesting_factor, 2);
        assert_eq!(
            index.hash_path(*id),
            HashPath::new(archive_hash, vec!["data/inner.pack".into(), "textures/a.dds".into()])
        );
        assert_eq!(index.parent(*id).unwrap().name, "data/inner.pack");
        assert_eq!(index.archive_of(*id).name, "Mod.zip");
    }

    #[test]
    fn test_candidates_ordered_by_nesting() {
        let (_guard, dir) = temp_dir();
        let inner = pack_bytes(&[("deep.txt", b"same".as_slice())]);
        let nested = known(&dir, "Nested.zip", &zip_bytes(&[("inner.pack", inner.as_slice())]));
        let flat = known(&dir, "Flat.zip", &zip_bytes(&[("flat.txt", b"same".as_slice())]));

        let index = ContentIndex::build(vec![nested, flat]);
        let depths: Vec<u32> = index
            .by_hash(&ContentHash::of(b"same"))
            .iter()
            .map(|id| index.file(*id).nesting_factor)
            .collect();
        assert_eq!(depths, vec![1, 2]);
    }

    #[test]
    fn test_unreadable_archive_is_skipped() {
        let (_guard, dir) = temp_dir();
        let good = known(&dir, "Good.zip", &zip_bytes(&[("a.txt", b"a".as_slice())]));
        let mut broken = known(&dir, "Broken.zip", b"PK\x03\x04 truncated");
        broken.path = dir.join("does-not-exist.zip");

        let index = ContentIndex::build(vec![broken, good]);
        assert!(!index.is_indexed(ArchiveId(0)));
        assert!(index.is_indexed(ArchiveId(1)));
        assert!(index.contains_hash(&ContentHash::of(b"a")));
    }

    #[test]
    fn test_corrupt_nested_container_becomes_leaf() {
        let (_guard, dir) = temp_dir();
        let bogus = b"GAMEPACK but not really".to_vec();
        let archive = known(&dir, "Mod.zip", &zip_bytes(&[("bad.pack", bogus.as_slice())]));

        let index = ContentIndex::build(vec![archive]);
        let [id] = index.by_hash(&ContentHash::of(&bogus)) else {
            panic!("nested container should still be indexed");
        };
        assert!(index.children(*id).is_empty());
    }

    #[test]
    fn test_oversized_entry_count_is_a_leaf() {
        let (_guard, dir) = temp_dir();
        let mut bogus = b"GAMEPACK".to_vec();
        bogus.extend_from_slice(&1u32.to_le_bytes());
        bogus.extend_from_slice(&0u32.to_le_bytes());
        bogus.extend_from_slice(&u32::MAX.to_le_bytes());
        let archive = known(
            &dir,
            "Mod.zip",
            &zip_bytes(&[("bad.pack", bogus.as_slice()), ("readme.txt", b"hi".as_slice())]),
        );

        let index = ContentIndex::build(vec![archive]);
        let [id] = index.by_hash(&ContentHash::of(&bogus)) else {
            panic!("nested container should still be indexed");
        };
        assert!(index.children(*id).is_empty());
        assert_eq!(index.by_hash(&ContentHash::of(b"hi")).len(), 1);
    }

    #[test]
    fn test_loose_file_is_a_leaf_archive() {
        let (_guard, dir) = temp_dir();
        let archive = known(&dir, "Skyrim.esm", b"plugin bytes");

        let index = ContentIndex::build(vec![archive]);
        assert_eq!(index.len(), 1);
        let root = index.root_of(ArchiveId(0)).unwrap();
        assert!(index.file(root).is_top_level());
        assert_eq!(index.hash_path(root).depth(), 0);
    }

    #[test]
    fn test_fingerprints_and_siblings() {
        struct FirstBytes;
        impl PerceptualHasher for FirstBytes {
            fn fingerprint(&self, data: &[u8]) -> Option<ImageFingerprint> {
                let bytes: [u8; 8] = data.get(..8)?.try_into().ok()?;
                Some(ImageFingerprint(u64::from_le_bytes(bytes)))
            }
        }

        let (_guard, dir) = temp_dir();
        let archive = known(
            &dir,
            "Textures.zip",
            &zip_bytes(&[
                ("textures/rock.dds", b"diffuse!".as_slice()),
                ("textures/rock_n.dds", b"normal!!".as_slice()),
                ("meshes/rock.nif", b"mesh....".as_slice()),
            ]),
        );

        let index = IndexBuilder::new(Arc::new(Codecs::default()))
            .with_perceptual_hasher(Arc::new(FirstBytes))
            .build(vec![archive]);

        let rocks = index.by_stem("ROCK");
        assert_eq!(rocks.len(), 1);
        let rock = index.file(rocks[0]);
        assert_eq!(rock.name, "textures/rock.dds");

        let normal = index.by_stem("rock_n")[0];
        let sibling = index.sibling(normal, "rock.dds").unwrap();
        assert_eq!(sibling.id, rock.id);
        assert!(index.sibling(normal, "rock.nif").is_none());
    }

    #[test]
    fn test_stem_of() {
        assert_eq!(stem_of("textures/Rock_N.dds"), "rock_n");
        assert_eq!(stem_of("noext"), "noext");
    }
}
