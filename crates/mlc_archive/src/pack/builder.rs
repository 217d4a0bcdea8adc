use super::{
    hash_entry_path, PackCompression, PackEntry, PackState, PACK_MAGIC, PACK_VERSION,
    PACK_ZSTD_LEVEL,
};
use crate::error::{ArchiveError, Result};
use binrw::BinWrite;
use byteorder::{WriteBytesExt, LE};
use std::collections::HashSet;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use xxhash_rust::xxh3::xxh3_64;

/// Writes pack containers.
///
/// Entries are written in the order they were added, so building twice from
/// the same [`PackState`] and data yields identical bytes.
#[derive(Debug, Clone, Default)]
pub struct PackBuilder {
    flags: u32,
    entries: Vec<PackEntryBuilder>,
}

#[derive(Debug, Clone)]
pub struct PackEntryBuilder {
    pub path: String,
    pub compression: PackCompression,
}

impl PackEntryBuilder {
    pub fn new(path: impl Into<String>, compression: PackCompression) -> Self {
        Self {
            path: path.into(),
            compression,
        }
    }
}

impl PackBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder that reproduces the container described by `state`.
    pub fn from_state(state: &PackState) -> Self {
        Self {
            flags: state.flags,
            entries: state
                .entries
                .iter()
                .map(|e| PackEntryBuilder::new(e.path.clone(), e.compression))
                .collect(),
        }
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_entry(mut self, entry: PackEntryBuilder) -> Self {
        self.entries.push(entry);
        self
    }

    /// Build the container and write it to `writer`.
    ///
    /// * `writer` - Destination, positioned at the start of the container.
    /// * `provide_entry_data` - Returns the uncompressed bytes of each entry.
    pub fn build_to_writer<TWriter, TDataProvider>(
        self,
        writer: &mut TWriter,
        mut provide_entry_data: TDataProvider,
    ) -> Result<()>
    where
        TWriter: io::Write + io::Seek,
        TDataProvider: FnMut(&PackEntryBuilder) -> Result<Vec<u8>>,
    {
        self.validate()?;

        let mut writer = BufWriter::new(writer);

        Self::write_header(&mut writer, self.flags, self.entries.len())?;
        Self::write_paths(&mut writer, &self.entries)?;
        Self::write_alignment(&mut writer)?;

        // Reserve space for the TOC
        let toc_offset = writer.stream_position()?;
        writer.write_all(&vec![0; self.entries.len() * PackEntry::size_of()])?;

        let mut toc = Vec::with_capacity(self.entries.len());
        for (index, entry) in self.entries.iter().enumerate() {
            let data = provide_entry_data(entry)?;
            let stored = compress_entry_data(&data, entry.compression)?;

            let data_offset = writer.stream_position()?;
            writer.write_all(&stored)?;

            toc.push(PackEntry {
                path_hash: hash_entry_path(&entry.path),
                data_offset,
                compression: entry.compression,
                compressed_size: stored.len() as u64,
                uncompressed_size: data.len() as u64,
                compressed_checksum: xxh3_64(&stored),
                uncompressed_checksum: xxh3_64(&data),
                path_index: index as u32,
            });
        }

        let end = writer.stream_position()?;

        // Go back and write the actual TOC
        writer.seek(SeekFrom::Start(toc_offset))?;
        for entry in &toc {
            entry.write(&mut writer)?;
        }
        writer.seek(SeekFrom::Start(end))?;
        writer.flush()?;

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for entry in &self.entries {
            if entry.path.is_empty() || entry.path.contains('\0') {
                return Err(ArchiveError::InvalidEntryPath(entry.path.clone()));
            }
            if !seen.insert(hash_entry_path(&entry.path)) {
                return Err(ArchiveError::DuplicateEntry(entry.path.clone()));
            }
        }
        Ok(())
    }

    fn write_header<W: io::Write>(writer: &mut W, flags: u32, entry_count: usize) -> Result<()> {
        writer.write_all(&PACK_MAGIC)?;
        writer.write_u32::<LE>(PACK_VERSION)?;
        writer.write_u32::<LE>(flags)?;
        writer.write_u32::<LE>(entry_count as u32)?;
        Ok(())
    }

    fn write_paths<W: io::Write>(writer: &mut W, entries: &[PackEntryBuilder]) -> Result<()> {
        for entry in entries {
            writer.write_all(entry.path.as_bytes())?;
            writer.write_all(&[0])?; // Null terminator
        }
        Ok(())
    }

    fn write_alignment<W: io::Write + io::Seek>(writer: &mut W) -> Result<()> {
        let current_pos = writer.stream_position()?;
        let padding = (8 - (current_pos % 8)) % 8;
        writer.write_all(&vec![0; padding as usize])?;
        Ok(())
    }
}

fn compress_entry_data(data: &[u8], compression: PackCompression) -> Result<Vec<u8>> {
    Ok(match compression {
        PackCompression::None => data.to_vec(),
        PackCompression::Zstd => zstd::encode_all(data, PACK_ZSTD_LEVEL)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::PackArchive;
    use std::io::Cursor;

    fn build(builder: PackBuilder, files: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        builder
            .build_to_writer(&mut cursor, |entry| {
                files
                    .iter()
                    .find(|(p, _)| *p == entry.path)
                    .map(|(_, d)| d.clone())
                    .ok_or_else(|| ArchiveError::EntryNotFound(entry.path.clone()))
            })
            .unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_pack_builder() {
        let files = vec![
            ("textures/rock.dds", vec![0xAA; 100]),
            ("meshes/rock.nif", b"mesh".to_vec()),
        ];
        let builder = PackBuilder::new()
            .with_flags(0x10)
            .with_entry(PackEntryBuilder::new("textures/rock.dds", PackCompression::Zstd))
            .with_entry(PackEntryBuilder::new("meshes/rock.nif", PackCompression::None));

        let bytes = build(builder, &files);
        let mut pack = PackArchive::mount_from_reader(Cursor::new(bytes)).unwrap();

        assert_eq!(pack.flags, 0x10);
        assert_eq!(pack.entries().len(), 2);

        let texture = *pack.find("TEXTURES/Rock.dds").unwrap();
        assert_eq!(texture.compression, PackCompression::Zstd);
        assert_eq!(texture.uncompressed_size, 100);
        assert!(texture.compressed_size < 100);
        assert_eq!(texture.uncompressed_checksum, xxh3_64(&[0xAA; 100]));

        assert_eq!(pack.load_entry("textures/rock.dds").unwrap(), vec![0xAA; 100]);
        assert_eq!(pack.load_entry("meshes/rock.nif").unwrap(), b"mesh");
        assert_eq!(pack.entry_path(1), Some("meshes/rock.nif"));
    }

    #[test]
    fn test_rebuild_from_state_is_byte_identical() {
        let files = vec![
            ("a.txt", b"alpha".to_vec()),
            ("b/c.bin", vec![3; 4096]),
            ("b/d.bin", Vec::new()),
        ];
        let builder = PackBuilder::new()
            .with_flags(7)
            .with_entry(PackEntryBuilder::new("a.txt", PackCompression::None))
            .with_entry(PackEntryBuilder::new("b/c.bin", PackCompression::Zstd))
            .with_entry(PackEntryBuilder::new("b/d.bin", PackCompression::Zstd));
        let original = build(builder, &files);

        let pack = PackArchive::mount_from_reader(Cursor::new(original.clone())).unwrap();
        let rebuilt = build(PackBuilder::from_state(&pack.state()), &files);

        assert_eq!(rebuilt, original);
    }

    #[test]
    fn test_rejects_duplicate_paths() {
        let builder = PackBuilder::new()
            .with_entry(PackEntryBuilder::new("a.txt", PackCompression::None))
            .with_entry(PackEntryBuilder::new("A.TXT", PackCompression::None));
        let err = builder
            .build_to_writer(&mut Cursor::new(Vec::new()), |_| Ok(Vec::new()))
            .unwrap_err();
        assert!(matches!(err, ArchiveError::DuplicateEntry(p) if p == "A.TXT"));
    }

    #[test]
    fn test_detects_corrupted_data() {
        let files = vec![("a.txt", b"alpha".to_vec())];
        let builder =
            PackBuilder::new().with_entry(PackEntryBuilder::new("a.txt", PackCompression::None));
        let mut bytes = build(builder, &files);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;

        let mut pack = PackArchive::mount_from_reader(Cursor::new(bytes)).unwrap();
        let err = pack.load_entry("a.txt").unwrap_err();
        assert!(matches!(err, ArchiveError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_rejects_entry_count_larger_than_stream() {
        let mut header = b"GAMEPACK".to_vec();
        header.extend_from_slice(&1u32.to_le_bytes());
        header.extend_from_slice(&0u32.to_le_bytes());
        header.extend_from_slice(&u32::MAX.to_le_bytes());

        let err = PackArchive::mount_from_reader(Cursor::new(header)).unwrap_err();
        assert!(matches!(err, ArchiveError::Truncated(_)));
    }

    #[test]
    fn test_rejects_data_past_end_of_stream() {
        let files = vec![("a.txt", b"alpha".to_vec())];
        let builder =
            PackBuilder::new().with_entry(PackEntryBuilder::new("a.txt", PackCompression::None));
        let mut bytes = build(builder, &files);
        bytes.truncate(bytes.len() - 2);

        let err = PackArchive::mount_from_reader(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, ArchiveError::Truncated(_)));
    }

    #[test]
    fn test_rejects_bad_magic() {
        let err = PackArchive::mount_from_reader(Cursor::new(b"NOTAPACK\x01\0\0\0".to_vec()))
            .unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidMagic(_)));
    }
}
