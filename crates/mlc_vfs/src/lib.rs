//! Content index for the modlist compiler.
//!
//! The compiler needs to know, for any file in a modded installation, whether
//! the same bytes can be obtained from something the installer can download or
//! already has. This crate builds that knowledge:
//!
//! - [`KnownArchive`]: a top-level download or game file, hashed via [`HashCache`]
//! - [`ContentIndex`]: every file reachable from the known archives, including
//!   files nested in containers, addressable by [`ContentHash`] and [`HashPath`]
//! - [`PerceptualHasher`]: optional texture fingerprints for similarity matching
//!
//! # Example
//!
//! ```no_run
//! use camino::Utf8Path;
//! use mlc_vfs::{ArchiveSource, ContentIndex, HashCache, KnownArchive};
//!
//! # fn main() -> mlc_vfs::Result<()> {
//! let cache = HashCache::load(Utf8Path::new("state/hash_cache.json"))?;
//! let archive = KnownArchive::from_path(
//!     Utf8Path::new("downloads/SomeMod.zip"),
//!     ArchiveSource::Download { primary_key: "SomeMod".into(), meta: String::new() },
//!     Some(&cache),
//! )?;
//! let index = ContentIndex::build(vec![archive]);
//! println!("{} files indexed", index.len());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod file;
pub mod hash_cache;
pub mod image_state;
pub mod index;
pub mod known;

pub use error::{Result, VfsError};
pub use file::{ArchiveId, FileId, HashPath, VirtualFile};
pub use hash_cache::{file_stamp, CachedHash, HashCache};
pub use image_state::{
    difference_hash, is_texture_path, DifferenceHasher, ImageFingerprint, PerceptualHasher,
    TEXTURE_EXTENSIONS,
};
pub use index::{stem_of, ContentIndex, IndexBuilder, DEFAULT_MAX_DEPTH};
pub use known::{ArchiveSource, KnownArchive};
pub use mlc_archive::ContentHash;
