//! The compiled mod list and its on-disk archive.
//!
//! A mod list is exported as a zip with one `modlist` entry holding the
//! manifest JSON and one entry per inline blob, named by its blob id.

use crate::blobs::BlobStore;
use crate::consts::MODLIST_ENTRY;
use crate::directive::Directive;
use crate::error::{CompilerError, Result};
use camino::Utf8Path;
use mlc_archive::ContentHash;
use mlc_vfs::{ArchiveSource, ContentIndex, KnownArchive};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{BufReader, BufWriter, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// Current manifest format version.
pub const MODLIST_VERSION: u32 = 1;

/// A download the installer has to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Archive {
    pub hash: ContentHash,
    pub name: String,
    pub size: u64,
    /// How to obtain the archive.
    pub state: ArchiveSource,
}

impl From<&KnownArchive> for Archive {
    fn from(known: &KnownArchive) -> Self {
        Self {
            hash: known.hash,
            name: known.name.clone(),
            size: known.size,
            state: known.source.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModList {
    pub version: u32,
    pub name: String,
    pub author: String,
    pub description: String,
    pub website: String,
    pub modlist_version: String,
    pub game: String,
    pub archives: Vec<Archive>,
    /// One directive per installed file, in installation-path order.
    pub directives: Vec<Directive>,
}

impl ModList {
    /// Write the manifest and every blob it references to a zip at `path`.
    pub fn export(&self, path: &Utf8Path, blobs: &BlobStore) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_str().is_empty() {
                std::fs::create_dir_all(parent.as_std_path())?;
            }
        }
        let file = std::fs::File::create(path.as_std_path())?;
        let mut zip = ZipWriter::new(BufWriter::new(file));
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        zip.start_file(MODLIST_ENTRY, options)?;
        serde_json::to_writer_pretty(&mut zip, self)?;

        let ids: BTreeSet<&str> = self.directives.iter().flat_map(|d| d.blob_ids()).collect();
        for id in &ids {
            let data = blobs.read(id)?;
            zip.start_file(*id, options)?;
            zip.write_all(&data)?;
        }

        zip.finish()?;
        tracing::info!(
            "Wrote {} with {} directives, {} archives and {} blobs",
            path,
            self.directives.len(),
            self.archives.len(),
            ids.len()
        );
        Ok(())
    }

    /// Read the manifest of an exported mod list.
    pub fn load_from_archive(path: &Utf8Path) -> Result<Self> {
        let file = std::fs::File::open(path.as_std_path())?;
        let mut zip = ZipArchive::new(BufReader::new(file))?;
        let entry = zip.by_name(MODLIST_ENTRY)?;
        let modlist: ModList = serde_json::from_reader(BufReader::new(entry))?;
        if modlist.version != MODLIST_VERSION {
            return Err(CompilerError::UnsupportedModListVersion {
                found: modlist.version,
                expected: MODLIST_VERSION,
            });
        }
        Ok(modlist)
    }

    /// Read one blob from an exported mod list.
    pub fn read_blob(path: &Utf8Path, id: &str) -> Result<Vec<u8>> {
        let file = std::fs::File::open(path.as_std_path())?;
        let mut zip = ZipArchive::new(BufReader::new(file))?;
        let mut entry = zip.by_name(id).map_err(|e| match e {
            zip::result::ZipError::FileNotFound => CompilerError::BlobNotFound(id.to_string()),
            other => other.into(),
        })?;
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Number of top-level directives per variant name.
    pub fn count_by_type(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for directive in &self.directives {
            *counts.entry(directive.type_name()).or_insert(0) += 1;
        }
        counts
    }
}

/// The archives referenced by `directives`, including container entries.
///
/// When several known archives share a hash, a file of the target game is
/// preferred, then any game file, then the most recently modified download.
/// The result is sorted by name.
pub fn gather_archives(index: &ContentIndex, directives: &[Directive], game: &str) -> Result<Vec<Archive>> {
    let hashes: BTreeSet<ContentHash> = directives
        .iter()
        .flat_map(|d| d.archive_hash_paths())
        .map(|p| p.hash)
        .collect();

    let mut archives = Vec::with_capacity(hashes.len());
    for hash in hashes {
        let best = index
            .archives()
            .iter()
            .filter(|a| a.hash == hash)
            .max_by_key(|a| {
                let target = a.game().is_some_and(|g| g.eq_ignore_ascii_case(game));
                (target, a.is_game_file(), a.modified, std::cmp::Reverse(a.name.clone()))
            })
            .ok_or(CompilerError::ArchiveNotFound(hash))?;
        archives.push(Archive::from(best));
    }
    archives.sort_by(|a, b| a.name.cmp(&b.name).then(a.hash.cmp(&b.hash)));
    tracing::info!("Mod list needs {} archives", archives.len());
    Ok(archives)
}
