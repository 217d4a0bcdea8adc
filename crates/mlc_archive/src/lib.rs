//! Archive codecs and content hashing for the modlist compiler.
//!
//! This crate is the compiler's only window into archive formats. It provides:
//!
//! - [`ContentHash`]: the SHA-256 content identity used everywhere else
//! - [`ArchiveCodec`]: list, extract and (for game containers) rebuild a format
//! - [`Codecs`]: the registry that dispatches on file signature
//! - [`ZipCodec`] for downloaded archives and [`PackCodec`] for game containers
//!
//! # Example
//!
//! ```no_run
//! use camino::Utf8Path;
//! use mlc_archive::Codecs;
//!
//! # fn main() -> mlc_archive::Result<()> {
//! let codecs = Codecs::default();
//! for entry in codecs.open(Utf8Path::new("downloads/SomeMod.zip"))? {
//!     println!("{} {} ({} bytes)", entry.hash, entry.path, entry.size);
//! }
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod error;
pub mod hash;
pub mod pack;
pub mod zip_codec;

pub use codec::{
    normalize_entry_path, ArchiveCodec, ArchiveEntry, Codecs, ContainerState, EntryProvider,
    EntryVisitor, ReadSeek, SIGNATURE_LEN,
};
pub use error::{ArchiveError, Result};
pub use hash::ContentHash;
pub use pack::{PackBuilder, PackCodec, PackCompression, PackEntryBuilder, PackState};
pub use zip_codec::ZipCodec;
