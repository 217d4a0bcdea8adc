//! The `pack` game container format.
//!
//! Game archives are the one kind of container the compiler does not ship
//! whole: it breaks them into entries, resolves each entry separately and
//! records enough about the container to rebuild it at install time. The pack
//! format is the container this crate can both read and rebuild.
//!
//! # Layout
//!
//! All integers are little-endian.
//!
//! | field          | type                              |
//! |----------------|-----------------------------------|
//! | magic          | `b"GAMEPACK"`                      |
//! | version        | `u32` (1)                          |
//! | flags          | `u32`                              |
//! | entry count    | `u32`                              |
//! | entry paths    | `count` NUL-terminated UTF-8 strings |
//! | padding        | zero bytes up to an 8-byte boundary |
//! | TOC            | `count` × [`PackEntry`]            |
//! | data           | entry payloads in TOC order        |
//!
//! Rebuilding a pack from the same entries, compression settings and flags
//! produces the same bytes, which is what lets the installer recreate it.

mod builder;
mod codec;
mod entry;
mod read;

pub use builder::{PackBuilder, PackEntryBuilder};
pub use codec::PackCodec;
pub use entry::{PackCompression, PackEntry};
pub use read::PackArchive;

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh64::xxh64;

/// File magic.
pub const PACK_MAGIC: [u8; 8] = *b"GAMEPACK";

/// Current format version.
pub const PACK_VERSION: u32 = 1;

/// Zstd level used for compressed entries. Changing it changes rebuilt bytes.
pub const PACK_ZSTD_LEVEL: i32 = 3;

/// File extension of pack containers.
pub const PACK_EXTENSION: &str = "pack";

/// Hash an entry path the way the TOC stores it (lowercased xxh64).
pub fn hash_entry_path(path: &str) -> u64 {
    xxh64(path.to_lowercase().as_bytes(), 0)
}

/// Rebuild description of a pack container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackState {
    pub version: u32,
    pub flags: u32,
    /// Entries in TOC order.
    pub entries: Vec<PackFileState>,
}

impl Default for PackState {
    fn default() -> Self {
        Self {
            version: PACK_VERSION,
            flags: 0,
            entries: Vec::new(),
        }
    }
}

/// One entry of a [`PackState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackFileState {
    pub path: String,
    pub compression: PackCompression,
}
