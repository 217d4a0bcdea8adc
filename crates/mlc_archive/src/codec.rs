//! The archive codec abstraction and the codec registry.
//!
//! An [`ArchiveCodec`] knows one container format. It can enumerate entries
//! (with their content hash and size), extract a single entry, and, for game
//! containers, describe the container well enough to rebuild it byte for byte.
//!
//! [`Codecs`] is the registry the rest of the compiler talks to. Format
//! dispatch happens here, by file signature: callers never pick a codec
//! themselves.

use crate::error::{ArchiveError, Result};
use crate::hash::ContentHash;
use crate::pack::{PackCodec, PackState};
use crate::zip_codec::ZipCodec;
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read, Seek, SeekFrom};

/// Number of leading bytes handed to [`ArchiveCodec::matches_signature`].
pub const SIGNATURE_LEN: usize = 8;

/// Object-safe combination of [`Read`] and [`Seek`].
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek + ?Sized> ReadSeek for T {}

/// One file stored inside an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path inside the archive, normalized to forward slashes.
    pub path: String,
    pub hash: ContentHash,
    pub size: u64,
}

/// Everything needed to rebuild a game container from its entries.
///
/// Stored verbatim in the manifest's container directives, so variants are
/// tagged explicitly and new formats are added as new variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ContainerState {
    Pack(PackState),
}

impl ContainerState {
    /// Name of the codec able to rebuild this container.
    pub fn codec_name(&self) -> &'static str {
        match self {
            ContainerState::Pack(_) => PackCodec::NAME,
        }
    }

    /// Entry paths in container order.
    pub fn entry_paths(&self) -> Vec<&str> {
        match self {
            ContainerState::Pack(state) => state.entries.iter().map(|e| e.path.as_str()).collect(),
        }
    }
}

/// Callback used by [`ArchiveCodec::for_each_entry`].
pub type EntryVisitor<'a> = dyn FnMut(&str, &[u8]) -> Result<()> + 'a;

/// Callback used by [`ArchiveCodec::build`] to obtain an entry's bytes.
pub type EntryProvider<'a> = dyn FnMut(&str) -> Result<Vec<u8>> + 'a;

/// A single archive format.
pub trait ArchiveCodec: Send + Sync {
    /// Short, stable format name (`"zip"`, `"pack"`).
    fn name(&self) -> &'static str;

    /// Whether the first [`SIGNATURE_LEN`] bytes of a file identify this format.
    fn matches_signature(&self, header: &[u8]) -> bool;

    /// Visit every file entry together with its decompressed bytes.
    fn for_each_entry(&self, reader: &mut dyn ReadSeek, visit: &mut EntryVisitor<'_>) -> Result<()>;

    /// Extract a single entry.
    fn extract(&self, reader: &mut dyn ReadSeek, entry_path: &str) -> Result<Vec<u8>>;

    /// Enumerate entries with their content hash and size.
    fn list(&self, reader: &mut dyn ReadSeek) -> Result<Vec<ArchiveEntry>> {
        let mut entries = Vec::new();
        self.for_each_entry(reader, &mut |path, data| {
            entries.push(ArchiveEntry {
                path: path.to_string(),
                hash: ContentHash::of(data),
                size: data.len() as u64,
            });
            Ok(())
        })?;
        Ok(entries)
    }

    /// Describe the container for a later rebuild. Read-only formats return `None`.
    fn read_state(&self, _reader: &mut dyn ReadSeek) -> Result<Option<ContainerState>> {
        Ok(None)
    }

    /// Rebuild a container from its recorded state and the bytes of each entry.
    fn build(&self, _state: &ContainerState, _provide: &mut EntryProvider<'_>) -> Result<Vec<u8>> {
        Err(ArchiveError::RebuildUnsupported { codec: self.name() })
    }

    /// Whether [`build`](Self::build) is implemented.
    fn supports_rebuild(&self) -> bool {
        false
    }
}

/// Registry of known archive formats.
///
/// The default registry knows zip archives (downloads) and pack containers
/// (game archives).
pub struct Codecs {
    codecs: Vec<Box<dyn ArchiveCodec>>,
}

impl Default for Codecs {
    fn default() -> Self {
        Self::empty().with_codec(ZipCodec).with_codec(PackCodec)
    }
}

impl std::fmt::Debug for Codecs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.codecs.iter().map(|c| c.name()))
            .finish()
    }
}

impl Codecs {
    /// A registry with no formats at all.
    pub fn empty() -> Self {
        Self { codecs: Vec::new() }
    }

    pub fn with_codec(mut self, codec: impl ArchiveCodec + 'static) -> Self {
        self.codecs.push(Box::new(codec));
        self
    }

    /// Find the codec whose signature matches `header`.
    pub fn detect(&self, header: &[u8]) -> Option<&dyn ArchiveCodec> {
        self.codecs
            .iter()
            .find(|c| c.matches_signature(header))
            .map(|c| c.as_ref())
    }

    /// Whether `header` belongs to any known archive format.
    pub fn is_container(&self, header: &[u8]) -> bool {
        self.detect(header).is_some()
    }

    /// Whether `header` belongs to a format that can be rebuilt (a game container).
    pub fn is_rebuildable(&self, header: &[u8]) -> bool {
        self.detect(header).is_some_and(|c| c.supports_rebuild())
    }

    /// Read the signature of a file on disk.
    pub fn read_signature(path: &Utf8Path) -> Result<Vec<u8>> {
        let mut file = std::fs::File::open(path.as_std_path())?;
        read_signature(&mut file)
    }

    /// Enumerate the entries of an archive on disk.
    pub fn open(&self, path: &Utf8Path) -> Result<Vec<ArchiveEntry>> {
        let mut file = std::fs::File::open(path.as_std_path())?;
        let codec = self.codec_for(&mut file, path.as_str())?;
        codec.list(&mut file)
    }

    /// Visit every entry of an in-memory archive. `name` is used in errors only.
    pub fn for_each_entry_in_bytes(
        &self,
        name: &str,
        bytes: &[u8],
        visit: &mut EntryVisitor<'_>,
    ) -> Result<()> {
        let mut cursor = Cursor::new(bytes);
        let codec = self.codec_for(&mut cursor, name)?;
        codec.for_each_entry(&mut cursor, visit)
    }

    /// Visit every entry of an archive on disk.
    pub fn for_each_entry(&self, path: &Utf8Path, visit: &mut EntryVisitor<'_>) -> Result<()> {
        let mut file = std::fs::File::open(path.as_std_path())?;
        let codec = self.codec_for(&mut file, path.as_str())?;
        codec.for_each_entry(&mut file, visit)
    }

    /// Extract one entry from an archive on disk.
    pub fn extract(&self, path: &Utf8Path, entry_path: &str) -> Result<Vec<u8>> {
        let mut file = std::fs::File::open(path.as_std_path())?;
        let codec = self.codec_for(&mut file, path.as_str())?;
        codec.extract(&mut file, entry_path)
    }

    /// Extract one entry from an in-memory archive.
    pub fn extract_from_bytes(&self, name: &str, bytes: &[u8], entry_path: &str) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(bytes);
        let codec = self.codec_for(&mut cursor, name)?;
        codec.extract(&mut cursor, entry_path)
    }

    /// Describe a container on disk. Returns `None` for read-only formats.
    pub fn container_state(&self, path: &Utf8Path) -> Result<Option<ContainerState>> {
        let mut file = std::fs::File::open(path.as_std_path())?;
        let codec = self.codec_for(&mut file, path.as_str())?;
        codec.read_state(&mut file)
    }

    /// Rebuild a container from its state, asking `provide` for each entry's bytes.
    pub fn build(&self, state: &ContainerState, provide: &mut EntryProvider<'_>) -> Result<Vec<u8>> {
        let codec = self
            .codecs
            .iter()
            .find(|c| c.name() == state.codec_name())
            .ok_or_else(|| ArchiveError::UnsupportedFormat(state.codec_name().to_string()))?;
        codec.build(state, provide)
    }

    fn codec_for(&self, reader: &mut dyn ReadSeek, name: &str) -> Result<&dyn ArchiveCodec> {
        let header = read_signature(reader)?;
        self.detect(&header)
            .ok_or_else(|| ArchiveError::UnsupportedFormat(name.to_string()))
    }
}

/// Read up to [`SIGNATURE_LEN`] bytes and rewind to the start.
fn read_signature<R: Read + Seek + ?Sized>(reader: &mut R) -> Result<Vec<u8>> {
    let mut header = Vec::with_capacity(SIGNATURE_LEN);
    (&mut *reader)
        .take(SIGNATURE_LEN as u64)
        .read_to_end(&mut header)?;
    reader.seek(SeekFrom::Start(0))?;
    Ok(header)
}

/// Normalize an entry path: forward slashes, no leading separator.
pub fn normalize_entry_path(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::{PackBuilder, PackCompression, PackEntryBuilder};
    use std::io::Write;

    fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut cursor);
            for (name, data) in files {
                zip.start_file(*name, zip::write::SimpleFileOptions::default())
                    .unwrap();
                zip.write_all(data).unwrap();
            }
            zip.finish().unwrap();
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
                Ok(files
                    .iter()
                    .find(|(n, _)| *n == entry.path)
                    .map(|(_, d)| d.to_vec())
                    .unwrap_or_default())
            })
            .unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_detects_by_signature() {
        let codecs = Codecs::default();
        let zip = zip_bytes(&[("a.txt", b"a".as_slice())]);
        let pack = pack_bytes(&[("a.txt", b"a".as_slice())]);

        assert_eq!(codecs.detect(&zip[..SIGNATURE_LEN]).unwrap().name(), "zip");
        assert_eq!(codecs.detect(&pack[..SIGNATURE_LEN]).unwrap().name(), "pack");
        assert!(codecs.detect(b"DDS |...").is_none());

        assert!(!codecs.is_rebuildable(&zip[..SIGNATURE_LEN]));
        assert!(codecs.is_rebuildable(&pack[..SIGNATURE_LEN]));
    }

    #[test]
    fn test_open_lists_zip_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("A.zip");
        std::fs::write(
            &path,
            zip_bytes(&[("textures/rock.dds", b"rock".as_slice()), ("readme.txt", b"hi".as_slice())]),
        )
        .unwrap();

        let codecs = Codecs::default();
        let entries = codecs
            .open(Utf8Path::from_path(&path).unwrap())
            .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, "textures/rock.dds");
        assert_eq!(entries[0].hash, ContentHash::of(b"rock"));
        assert_eq!(entries[0].size, 4);
    }

    #[test]
    fn test_unknown_format_is_an_error() {
        let codecs = Codecs::default();
        let err = codecs
            .for_each_entry_in_bytes("junk.bin", b"definitely not an archive", &mut |_, _| Ok(()))
            .unwrap_err();
        assert!(matches!(err, ArchiveError::UnsupportedFormat(name) if name == "junk.bin"));
    }

    #[test]
    fn test_zip_cannot_be_rebuilt() {
        let codecs = Codecs::empty().with_codec(ZipCodec);
        let state = ContainerState::Pack(PackState::default());
        let err = codecs.build(&state, &mut |_| Ok(Vec::new())).unwrap_err();
        assert!(matches!(err, ArchiveError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_normalize_entry_path() {
        assert_eq!(normalize_entry_path("\\Data\\a.dds"), "Data/a.dds");
        assert_eq!(normalize_entry_path("a/b"), "a/b");
    }
}
