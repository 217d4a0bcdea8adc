//! Read-only codec for zip archives, the usual format of downloaded mods.

use crate::codec::{normalize_entry_path, ArchiveCodec, EntryVisitor, ReadSeek};
use crate::error::{ArchiveError, Result};
use std::io::Read;
use zip::ZipArchive;

const LOCAL_HEADER_MAGIC: &[u8] = b"PK\x03\x04";
const EMPTY_ARCHIVE_MAGIC: &[u8] = b"PK\x05\x06";

/// Upper bound on buffer space reserved from a declared entry size.
const MAX_PREALLOC: u64 = 64 * 1024 * 1024;

/// Zip archives. Entries are read, never written.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipCodec;

impl ZipCodec {
    pub const NAME: &'static str = "zip";
}

impl ArchiveCodec for ZipCodec {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn matches_signature(&self, header: &[u8]) -> bool {
        header.starts_with(LOCAL_HEADER_MAGIC) || header.starts_with(EMPTY_ARCHIVE_MAGIC)
    }

    fn for_each_entry(&self, reader: &mut dyn ReadSeek, visit: &mut EntryVisitor<'_>) -> Result<()> {
        let mut archive = ZipArchive::new(reader)?;
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }

            let path = normalize_entry_path(file.name());
            let mut data = Vec::with_capacity(file.size().min(MAX_PREALLOC) as usize);
            file.read_to_end(&mut data)?;
            visit(&path, &data)?;
        }
        Ok(())
    }

    fn extract(&self, reader: &mut dyn ReadSeek, entry_path: &str) -> Result<Vec<u8>> {
        let wanted = normalize_entry_path(entry_path);
        let mut archive = ZipArchive::new(reader)?;
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() || normalize_entry_path(file.name()) != wanted {
                continue;
            }

            let mut data = Vec::with_capacity(file.size().min(MAX_PREALLOC) as usize);
            file.read_to_end(&mut data)?;
            return Ok(data);
        }
        Err(ArchiveError::EntryNotFound(entry_path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn sample_zip() -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut cursor);
            let options = zip::write::SimpleFileOptions::default();
            zip.add_directory("textures/", options).unwrap();
            zip.start_file("textures/rock.dds", options).unwrap();
            zip.write_all(b"rock-bytes").unwrap();
            zip.start_file("meshes/rock.nif", options).unwrap();
            zip.write_all(b"mesh").unwrap();
            zip.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_skips_directories() {
        let mut reader = Cursor::new(sample_zip());
        let entries = ZipCodec.list(&mut reader).unwrap();
        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["textures/rock.dds", "meshes/rock.nif"]);
    }

    #[test]
    fn test_extract_entry() {
        let mut reader = Cursor::new(sample_zip());
        let data = ZipCodec.extract(&mut reader, "meshes\\rock.nif").unwrap();
        assert_eq!(data, b"mesh");
    }

    #[test]
    fn test_extract_missing_entry() {
        let mut reader = Cursor::new(sample_zip());
        let err = ZipCodec.extract(&mut reader, "nope.txt").unwrap_err();
        assert!(matches!(err, ArchiveError::EntryNotFound(_)));
    }

    #[test]
    fn test_corrupt_zip_is_an_error() {
        let mut reader = Cursor::new(b"PK\x03\x04 this is truncated".to_vec());
        assert!(ZipCodec.list(&mut reader).is_err());
    }
}
