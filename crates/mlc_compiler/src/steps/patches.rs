//! Near matches: ship a binary patch against a similar archive entry.
//!
//! Candidates come from cheap lookups only (file name, the mod's installation
//! archive, its `matchAll` archive). The index is never scanned per record.

use super::{directive_for, owning_mod};
use crate::consts::MODS_FOLDER;
use crate::context::CompilerContext;
use crate::directive::{Directive, DirectiveKind};
use crate::error::Result;
use crate::reporter::CompilerEvent;
use crate::source::RawSourceFile;
use crate::stack::CompilationStep;
use mlc_vfs::{ArchiveId, ContentIndex, FileId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub struct IncludePatches {
    ctx: Arc<CompilerContext>,
    /// Lowercased file name to every file carrying it.
    by_name: HashMap<String, Vec<FileId>>,
    /// Lowercased mod name to the archive it was installed from.
    installation: HashMap<String, ArchiveId>,
    /// Lowercased mod name to its `matchAll` archive.
    match_all: HashMap<String, ArchiveId>,
    /// Files of every installation archive.
    archive_files: HashMap<ArchiveId, Vec<FileId>>,
}

impl IncludePatches {
    pub fn new(ctx: Arc<CompilerContext>) -> Self {
        let index = &ctx.index;

        let mut by_name: HashMap<String, Vec<FileId>> = HashMap::new();
        for file in index.iter() {
            if file.is_top_level() && !index.children(file.id).is_empty() {
                continue;
            }
            by_name
                .entry(file.file_name().to_ascii_lowercase())
                .or_default()
                .push(file.id);
        }

        let mut installation = HashMap::new();
        let mut match_all = HashMap::new();
        for meta in ctx.mods.iter() {
            let key = meta.name.to_ascii_lowercase();
            if let Some(archive) = meta
                .installation_file
                .as_deref()
                .and_then(|name| find_archive(index, name))
            {
                installation.insert(key.clone(), archive);
            }
            if let Some(archive) = meta
                .match_all
                .as_deref()
                .and_then(|name| find_archive(index, name))
            {
                match_all.insert(key, archive);
            }
        }

        let wanted: HashSet<ArchiveId> = installation.values().copied().collect();
        let mut archive_files: HashMap<ArchiveId, Vec<FileId>> = HashMap::new();
        for file in index.iter() {
            if !file.is_top_level() && wanted.contains(&file.archive) {
                archive_files.entry(file.archive).or_default().push(file.id);
            }
        }

        tracing::debug!(
            "Patch lookup: {} file names, {} installation archives",
            by_name.len(),
            installation.len()
        );
        Self {
            ctx,
            by_name,
            installation,
            match_all,
            archive_files,
        }
    }

    fn candidates(&self, source: &RawSourceFile) -> Vec<FileId> {
        let index = &self.ctx.index;
        let name = source.path.file_name().to_ascii_lowercase();
        let same_name = self.by_name.get(&name).map(Vec::as_slice).unwrap_or(&[]);
        let in_archive = |archive: ArchiveId| -> Vec<FileId> {
            same_name
                .iter()
                .copied()
                .filter(|id| index.file(*id).archive == archive)
                .collect()
        };

        if let Some(mod_name) = owning_mod(source) {
            if let Some(archive) = self.installation.get(&mod_name).copied() {
                if let Some(relative) = mod_relative_path(source) {
                    let located: Vec<FileId> = self
                        .archive_files
                        .get(&archive)
                        .into_iter()
                        .flatten()
                        .copied()
                        .filter(|id| index.file(*id).name.to_ascii_lowercase().ends_with(&relative))
                        .collect();
                    if !located.is_empty() {
                        return located;
                    }
                }
                let named = in_archive(archive);
                if !named.is_empty() {
                    return named;
                }
            }
            if let Some(archive) = self.match_all.get(&mod_name).copied() {
                let named = in_archive(archive);
                if !named.is_empty() {
                    return named;
                }
            }
        }
        same_name.to_vec()
    }

    /// Candidates ordered by closeness of their path to the record's path.
    fn ranked(&self, source: &RawSourceFile) -> Vec<FileId> {
        let index = &self.ctx.index;
        let target = mod_relative_path(source).unwrap_or_else(|| source.path.as_str().to_ascii_lowercase());

        let mut ranked: Vec<(usize, String, FileId)> = self
            .candidates(source)
            .into_iter()
            .filter(|id| {
                let size = index.file(*id).size;
                if size > self.ctx.settings.max_patch_source_bytes {
                    tracing::trace!("Skipping {} bytes patch source for {}", size, source.path);
                    return false;
                }
                true
            })
            .map(|id| {
                let name = index.file(id).name.to_ascii_lowercase();
                (levenshtein(&name, &target), index.hash_path(id).to_string(), id)
            })
            .collect();
        ranked.sort();
        ranked.truncate(self.ctx.settings.patch_candidates);
        ranked.into_iter().map(|(_, _, id)| id).collect()
    }

    /// 0 for downloads and files of the compiled game, 1 for other games.
    fn preference(&self, id: FileId) -> u8 {
        match self.ctx.index.archive_of(id).game() {
            Some(game) if !game.eq_ignore_ascii_case(&self.ctx.settings.game) => 1,
            _ => 0,
        }
    }
}

impl CompilationStep for IncludePatches {
    fn name(&self) -> &'static str {
        "IncludePatches"
    }

    fn run(&self, source: &RawSourceFile) -> Result<Option<Directive>> {
        let candidates = self.ranked(source);
        if candidates.is_empty() {
            return Ok(None);
        }
        self.ctx.cancel.check()?;

        let index = &self.ctx.index;
        let new = source.read()?;
        let mut best: Option<(Vec<u8>, u8, FileId)> = None;
        for id in candidates {
            let diffed = self
                .ctx
                .read_virtual_file(id)
                .and_then(|old| self.ctx.patcher.diff(&old, &new));
            let patch = match diffed {
                Ok(patch) => patch,
                Err(e) => {
                    self.ctx.reporter.report(CompilerEvent::PatchFailed {
                        path: source.path.to_string(),
                        from: index.hash_path(id).to_string(),
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            let preference = self.preference(id);
            let better = match &best {
                None => true,
                Some((current, current_pref, _)) => {
                    (patch.len(), preference) < (current.len(), *current_pref)
                }
            };
            if better {
                best = Some((patch, preference, id));
            }
        }

        let Some((patch, _, id)) = best else {
            return Ok(None);
        };
        let from_hash = index.file(id).hash;
        let archive_hash_path = index.hash_path(id);
        tracing::debug!(
            "Patching {} from {} ({} bytes)",
            source.path,
            archive_hash_path,
            patch.len()
        );
        let patch_id = self
            .ctx
            .blobs
            .insert_bytes(format!("{}_{}", from_hash.to_hex(), source.hash.to_hex()), patch);

        Ok(Some(directive_for(
            source,
            DirectiveKind::PatchedFromArchive {
                archive_hash_path,
                from_hash,
                patch_id,
            },
        )))
    }
}

/// Lowercased path of the record inside its mod, or inside its container for
/// container entries.
fn mod_relative_path(source: &RawSourceFile) -> Option<String> {
    if let Some(origin) = &source.container {
        return Some(origin.entry.to_ascii_lowercase());
    }
    let mod_name = source.path.mod_name()?;
    source
        .path
        .strip_folder(&format!("{}/{}", MODS_FOLDER, mod_name))
        .map(|p| p.as_str().to_ascii_lowercase())
}

fn find_archive(index: &ContentIndex, name: &str) -> Option<ArchiveId> {
    let name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    index
        .archives()
        .iter()
        .position(|a| a.path.file_name().unwrap_or(&a.name).eq_ignore_ascii_case(name))
        .map(|i| ArchiveId(i as u32))
        .filter(|id| index.is_indexed(*id))
}

/// Edit distance between two strings, counted in chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::CancellationToken;
    use crate::mod_meta::{ModMeta, ModRegistry};
    use crate::patch::{BsdiffPatcher, PatchGenerator};
    use crate::reporter::CollectingReporter;
    use crate::steps::test_support::{download, game_file, known, record, settings, temp_root, zip_bytes};
    use crate::CompilerError;
    use camino::Utf8Path;
    use mlc_vfs::KnownArchive;

    const OLD: &[u8] = b"[Display]\niSize W=1920\niSize H=1080\nbFull Screen=1\n";
    const NEW: &[u8] = b"[Display]\niSize W=2560\niSize H=1440\nbFull Screen=1\n";

    fn context(root: &Utf8Path, archives: Vec<KnownArchive>, mods: ModRegistry) -> CompilerContext {
        CompilerContext::new(settings(root), Arc::new(ContentIndex::build(archives)), mods)
    }

    fn mod_installed_from(name: &str, file: &str) -> ModRegistry {
        let mut mods = ModRegistry::new();
        mods.insert(ModMeta {
            name: name.into(),
            installation_file: Some(file.into()),
            ..Default::default()
        });
        mods
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("data/a.ini", "data/a.ini"), 0);
    }

    #[test]
    fn test_patch_from_installation_archive_applies() {
        let (_guard, root) = temp_root();
        let archive = known(
            &root,
            "downloads/Display Tweaks.zip",
            &zip_bytes(&[("SKSE/display.ini", OLD), ("readme.txt", b"hi".as_slice())]),
            download("dl"),
        );
        let archive_hash = archive.hash;
        let ctx = Arc::new(context(
            &root,
            vec![archive],
            mod_installed_from("Display", "Display Tweaks.zip"),
        ));
        let step = IncludePatches::new(ctx.clone());

        let source = record(&root, "mods/Display/SKSE/display.ini", NEW);
        let directive = step.run(&source).unwrap().unwrap();
        let DirectiveKind::PatchedFromArchive {
            archive_hash_path,
            from_hash,
            patch_id,
        } = directive.kind
        else {
            panic!("expected a patch, got {:?}", directive);
        };

        assert_eq!(archive_hash_path.hash, archive_hash);
        assert_eq!(archive_hash_path.parts, vec!["SKSE/display.ini".to_string()]);
        assert_eq!(from_hash, mlc_archive::ContentHash::of(OLD));
        assert_eq!(patch_id, format!("{}_{}", from_hash.to_hex(), source.hash.to_hex()));

        let patch = ctx.blobs.read(&patch_id).unwrap();
        assert_eq!(BsdiffPatcher::default().apply(OLD, &patch).unwrap(), NEW);
    }

    #[test]
    fn test_same_name_fallback_prefers_closest_path() {
        let (_guard, root) = temp_root();
        let archives = vec![
            known(&root, "a.zip", &zip_bytes(&[("x/y/z/settings.ini", OLD)]), download("a")),
            known(&root, "b.zip", &zip_bytes(&[("Plugin/settings.ini", OLD)]), download("b")),
        ];
        let closest = archives[1].hash;
        let ctx = Arc::new(context(&root, archives, ModRegistry::new()));
        let step = IncludePatches::new(ctx);

        let source = record(&root, "mods/Other/Plugin/settings.ini", NEW);
        let directive = step.run(&source).unwrap().unwrap();
        assert_eq!(directive.archive_hash_path().unwrap().hash, closest);
    }

    #[test]
    fn test_other_game_source_loses_ties() {
        let (_guard, root) = temp_root();
        let archives = vec![
            known(&root, "fo4/Game.ini", OLD, game_file("fallout4")),
            known(&root, "dl/a.zip", &zip_bytes(&[("Game.ini", OLD)]), download("a")),
        ];
        let download_hash = archives[1].hash;
        let ctx = Arc::new(context(&root, archives, ModRegistry::new()));
        let step = IncludePatches::new(ctx);

        let directive = step.run(&record(&root, "Game.ini", NEW)).unwrap().unwrap();
        assert_eq!(directive.archive_hash_path().unwrap().hash, download_hash);
    }

    #[test]
    fn test_no_candidate_has_no_opinion() {
        let (_guard, root) = temp_root();
        let archive = known(&root, "a.zip", &zip_bytes(&[("other.ini", OLD)]), download("a"));
        let step = IncludePatches::new(Arc::new(context(&root, vec![archive], ModRegistry::new())));
        assert!(step.run(&record(&root, "mods/A/unknown.ini", NEW)).unwrap().is_none());
    }

    struct FailingPatcher;

    impl PatchGenerator for FailingPatcher {
        fn diff(&self, _old: &[u8], _new: &[u8]) -> Result<Vec<u8>> {
            Err(CompilerError::Patch("boom".into()))
        }

        fn apply(&self, _old: &[u8], _patch: &[u8]) -> Result<Vec<u8>> {
            Err(CompilerError::Patch("boom".into()))
        }
    }

    #[test]
    fn test_patch_failure_is_reported_and_skipped() {
        let (_guard, root) = temp_root();
        let archive = known(&root, "a.zip", &zip_bytes(&[("a.ini", OLD)]), download("a"));
        let reporter = Arc::new(CollectingReporter::new());
        let ctx = context(&root, vec![archive], ModRegistry::new())
            .with_patcher(Arc::new(FailingPatcher))
            .with_reporter(reporter.clone());
        let step = IncludePatches::new(Arc::new(ctx));

        assert!(step.run(&record(&root, "a.ini", NEW)).unwrap().is_none());
        let events = reporter.events();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], CompilerEvent::PatchFailed { path, .. } if path == "a.ini"));
    }

    #[test]
    fn test_cancelled_before_diffing() {
        let (_guard, root) = temp_root();
        let archive = known(&root, "a.zip", &zip_bytes(&[("a.ini", OLD)]), download("a"));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = context(&root, vec![archive], ModRegistry::new()).with_cancellation(cancel);
        let step = IncludePatches::new(Arc::new(ctx));

        assert!(matches!(
            step.run(&record(&root, "a.ini", NEW)),
            Err(CompilerError::Cancelled)
        ));
    }
}
