//! Discovery of known archives: downloads with a `.meta` sidecar, and game files.

use crate::consts::META_EXTENSION;
use crate::error::Result;
use camino::{Utf8Path, Utf8PathBuf};
use ini::Ini;
use mlc_vfs::{ArchiveSource, HashCache, KnownArchive};
use rayon::prelude::*;
use walkdir::WalkDir;

/// Derive the primary key of a download from its `.meta` sidecar.
///
/// Tried in order: a direct URL, a Nexus-style `gameName`/`modID`/`fileID`
/// triple, a manual URL. Returns `None` when none is present.
pub fn primary_key_from_meta(meta: &str) -> Option<String> {
    let ini = Ini::load_from_str_noescape(meta).ok()?;
    let general = ini.section(Some("General"))?;
    let get = |key: &str| general.get(key).map(str::trim).filter(|v| !v.is_empty());

    if let Some(url) = get("directURL") {
        return Some(format!("url|{}", url));
    }
    if let (Some(game), Some(mod_id), Some(file_id)) = (get("gameName"), get("modID"), get("fileID")) {
        return Some(format!("nexus|{}|{}|{}", game.to_ascii_lowercase(), mod_id, file_id));
    }
    get("manualURL").map(|url| format!("manual|{}", url))
}

/// Known downloads in `dir`: every top-level file that has a `<file>.meta` sidecar.
///
/// A sidecar without a recognizable source still makes the archive known; its
/// primary key falls back to the file name.
pub fn discover_downloads(dir: &Utf8Path, cache: Option<&HashCache>) -> Result<Vec<KnownArchive>> {
    if !dir.as_std_path().is_dir() {
        tracing::warn!("Downloads folder {} does not exist", dir);
        return Ok(Vec::new());
    }

    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(dir.as_std_path())? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
            tracing::warn!("Skipping non-UTF-8 download: {}", entry.path().display());
            continue;
        };
        if path.extension().is_some_and(|e| e.eq_ignore_ascii_case(META_EXTENSION)) {
            continue;
        }
        let meta_path = Utf8PathBuf::from(format!("{}.{}", path, META_EXTENSION));
        if !meta_path.as_std_path().is_file() {
            tracing::debug!("Skipping {}: no .meta file", path);
            continue;
        }
        candidates.push((path, meta_path));
    }
    candidates.sort();

    let archives: Vec<Option<KnownArchive>> = candidates
        .par_iter()
        .map(|(path, meta_path)| {
            let meta = match std::fs::read_to_string(meta_path.as_std_path()) {
                Ok(meta) => meta,
                Err(e) => {
                    tracing::warn!("Cannot read {}: {}", meta_path, e);
                    return None;
                }
            };
            let primary_key = primary_key_from_meta(&meta).unwrap_or_else(|| {
                let name = path.file_name().unwrap_or_default();
                tracing::debug!("No download source in {}; keying by file name", meta_path);
                format!("file|{}", name)
            });
            let source = ArchiveSource::Download { primary_key, meta };
            match KnownArchive::from_path(path, source, cache) {
                Ok(archive) => Some(archive),
                Err(e) => {
                    tracing::warn!("Cannot hash {}: {}", path, e);
                    None
                }
            }
        })
        .collect();

    let archives: Vec<KnownArchive> = archives.into_iter().flatten().collect();
    tracing::info!("Found {} known downloads in {}", archives.len(), dir);
    Ok(archives)
}

/// Every file under a game folder, as a game-file source named by its relative path.
pub fn discover_game_files(
    game: &str,
    folder: &Utf8Path,
    cache: Option<&HashCache>,
) -> Result<Vec<KnownArchive>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(folder.as_std_path()).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        match Utf8PathBuf::from_path_buf(entry.into_path()) {
            Ok(path) => files.push(path),
            Err(path) => tracing::warn!("Skipping non-UTF-8 game file: {}", path.display()),
        }
    }

    let archives: Vec<Option<KnownArchive>> = files
        .par_iter()
        .map(|path| {
            let source = ArchiveSource::GameFile {
                game: game.to_string(),
            };
            let mut archive = match KnownArchive::from_path(path, source, cache) {
                Ok(archive) => archive,
                Err(e) => {
                    tracing::warn!("Cannot hash game file {}: {}", path, e);
                    return None;
                }
            };
            if let Ok(relative) = path.strip_prefix(folder) {
                archive.name = relative.as_str().replace('\\', "/");
            }
            Some(archive)
        })
        .collect();

    let archives: Vec<KnownArchive> = archives.into_iter().flatten().collect();
    tracing::info!("Found {} game files for {} in {}", archives.len(), game, folder);
    Ok(archives)
}
