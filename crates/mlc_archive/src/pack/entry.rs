use crate::error::ArchiveError;
use binrw::binrw;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Compression applied to a single pack entry.
#[binrw]
#[brw(little, repr = u8)]
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PackCompression {
    #[default]
    None = 0,
    Zstd = 1,
}

impl Display for PackCompression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PackCompression::None => "none",
            PackCompression::Zstd => "zstd",
        })
    }
}

impl TryFrom<u8> for PackCompression {
    type Error = ArchiveError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => PackCompression::None,
            1 => PackCompression::Zstd,
            _ => return Err(ArchiveError::InvalidCompressionType(value)),
        })
    }
}

/// Table-of-contents record for one entry.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PackEntry {
    pub path_hash: u64,

    pub data_offset: u64,
    pub compression: PackCompression,
    pub compressed_size: u64,
    pub uncompressed_size: u64,

    pub compressed_checksum: u64,
    pub uncompressed_checksum: u64,

    pub path_index: u32,
}

impl PackEntry {
    pub const fn size_of() -> usize {
        (std::mem::size_of::<u64>() * 6) + std::mem::size_of::<u32>() + 1
    }
}
