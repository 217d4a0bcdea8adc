use super::{
    hash_entry_path, PackCompression, PackEntry, PackFileState, PackState, PACK_MAGIC,
    PACK_VERSION,
};
use crate::error::{ArchiveError, Result};
use binrw::BinRead;
use byteorder::{ReadBytesExt, LE};
use std::collections::HashMap;
use std::io::{BufReader, Read, Seek, SeekFrom};
use xxhash_rust::xxh3::xxh3_64;

/// A mounted pack container.
///
/// Mounting reads the header, path table and TOC. Entry data is read lazily
/// from the source on [`load_entry`](Self::load_entry).
#[derive(Debug)]
pub struct PackArchive<TSource: Read + Seek> {
    pub version: u32,
    pub flags: u32,
    paths: Vec<String>,
    entries: Vec<PackEntry>,
    lookup: HashMap<u64, usize>,
    source: TSource,
    stream_len: u64,
}

impl<TSource: Read + Seek> PackArchive<TSource> {
    pub fn mount_from_reader(mut source: TSource) -> Result<Self> {
        let stream_len = source.seek(SeekFrom::End(0))?;
        source.seek(SeekFrom::Start(0))?;
        let mut reader = BufReader::new(&mut source);

        let magic = reader.read_u64::<LE>()?;
        if magic != u64::from_le_bytes(PACK_MAGIC) {
            return Err(ArchiveError::InvalidMagic(magic));
        }

        let version = reader.read_u32::<LE>()?;
        if version != PACK_VERSION {
            return Err(ArchiveError::InvalidVersion(version));
        }

        let flags = reader.read_u32::<LE>()?;
        let entry_count = reader.read_u32::<LE>()? as u64;

        // Every entry needs at least a one-byte path and a TOC record.
        let remaining = stream_len.saturating_sub(reader.stream_position()?);
        if entry_count.saturating_mul(PackEntry::size_of() as u64 + 1) > remaining {
            return Err(ArchiveError::Truncated(format!(
                "{} entries do not fit in {} bytes",
                entry_count, remaining
            )));
        }
        let entry_count = entry_count as usize;

        let mut paths = Vec::with_capacity(entry_count);
        for _ in 0..entry_count {
            paths.push(read_str_until_nul(&mut reader)?);
        }

        // Skip alignment
        let position = reader.stream_position()?;
        reader.seek(SeekFrom::Current(((8 - (position % 8)) % 8) as i64))?;

        let mut entries = Vec::with_capacity(entry_count);
        let mut lookup = HashMap::with_capacity(entry_count);
        for index in 0..entry_count {
            let entry = PackEntry::read(&mut reader)?;
            let path = paths
                .get(entry.path_index as usize)
                .ok_or_else(|| ArchiveError::InvalidEntryPath(format!("#{}", entry.path_index)))?;
            if hash_entry_path(path) != entry.path_hash {
                return Err(ArchiveError::InvalidEntryPath(path.clone()));
            }
            if entry
                .data_offset
                .checked_add(entry.compressed_size)
                .map_or(true, |end| end > stream_len)
            {
                return Err(ArchiveError::Truncated(format!(
                    "data of '{}' ends past {} bytes",
                    path, stream_len
                )));
            }
            lookup.insert(entry.path_hash, index);
            entries.push(entry);
        }

        drop(reader);

        Ok(Self {
            version,
            flags,
            paths,
            entries,
            lookup,
            source,
            stream_len,
        })
    }

    /// TOC records in container order.
    pub fn entries(&self) -> &[PackEntry] {
        &self.entries
    }

    /// Path of the entry at TOC position `index`.
    pub fn entry_path(&self, index: usize) -> Option<&str> {
        self.entries
            .get(index)
            .and_then(|e| self.paths.get(e.path_index as usize))
            .map(String::as_str)
    }

    /// Find an entry by path (case-insensitive).
    pub fn find(&self, path: &str) -> Option<&PackEntry> {
        self.lookup
            .get(&hash_entry_path(path))
            .map(|&index| &self.entries[index])
    }

    /// Load and decompress the entry at TOC position `index`, verifying both checksums.
    pub fn load_entry_at(&mut self, index: usize) -> Result<Vec<u8>> {
        let entry = *self
            .entries
            .get(index)
            .ok_or_else(|| ArchiveError::EntryNotFound(format!("#{index}")))?;
        let path = self.entry_path(index).unwrap_or_default().to_string();

        if entry.data_offset.saturating_add(entry.compressed_size) > self.stream_len {
            return Err(ArchiveError::Truncated(path));
        }
        self.source.seek(SeekFrom::Start(entry.data_offset))?;
        let mut stored = vec![0; entry.compressed_size as usize];
        self.source.read_exact(&mut stored)?;
        verify_checksum(&path, entry.compressed_checksum, &stored)?;

        let data = match entry.compression {
            PackCompression::None => stored,
            PackCompression::Zstd => zstd::decode_all(stored.as_slice())?,
        };
        verify_checksum(&path, entry.uncompressed_checksum, &data)?;

        Ok(data)
    }

    /// Load and decompress an entry by path.
    pub fn load_entry(&mut self, path: &str) -> Result<Vec<u8>> {
        let index = *self
            .lookup
            .get(&hash_entry_path(path))
            .ok_or_else(|| ArchiveError::EntryNotFound(path.to_string()))?;
        self.load_entry_at(index)
    }

    /// Describe this container for a later rebuild.
    pub fn state(&self) -> PackState {
        PackState {
            version: self.version,
            flags: self.flags,
            entries: (0..self.entries.len())
                .map(|index| PackFileState {
                    path: self.entry_path(index).unwrap_or_default().to_string(),
                    compression: self.entries[index].compression,
                })
                .collect(),
        }
    }
}

fn verify_checksum(path: &str, expected: u64, data: &[u8]) -> Result<()> {
    let actual = xxh3_64(data);
    if actual != expected {
        return Err(ArchiveError::ChecksumMismatch {
            path: path.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

fn read_str_until_nul<R: Read>(reader: &mut R) -> Result<String> {
    let mut bytes = Vec::new();
    loop {
        match reader.read_u8()? {
            0 => break,
            b => bytes.push(b),
        }
    }
    String::from_utf8(bytes).map_err(|e| {
        ArchiveError::InvalidEntryPath(String::from_utf8_lossy(e.as_bytes()).into_owned())
    })
}
