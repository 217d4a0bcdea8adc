//! The compilation pipeline.
//!
//! [`Compiler::compile`] runs these stages in order:
//!
//! 1. Discover known archives: downloads with a `.meta` sidecar, plus every
//!    file of the configured game folders.
//! 2. Build the [`ContentIndex`] over them, descending into nested archives.
//! 3. Walk the installation and hash every file.
//! 4. Load mod metadata and build the step stack.
//! 5. Resolve every file on a dedicated worker pool. Ignored files are
//!    dropped, unresolved files and per-file failures are collected. Unmatched
//!    entries of deconstructed containers count as unresolved files too.
//! 6. Fail if a critical path stayed unresolved.
//! 7. Gather the archives the directives reference and export the mod list.
//!
//! The cancellation token is checked between stages and by the expensive
//! steps. A cancelled compilation returns [`CompilerError::Cancelled`] and
//! writes nothing.

use crate::context::CompilerContext;
use crate::directive::{Directive, DirectiveKind};
use crate::downloads::{discover_downloads, discover_game_files};
use crate::error::{CompilerError, Result};
use crate::limiter::CancellationToken;
use crate::manifest::{gather_archives, ModList, MODLIST_VERSION};
use crate::mod_meta::ModRegistry;
use crate::patch::{BsdiffPatcher, PatchGenerator};
use crate::path::RelativePath;
use crate::reporter::{CompilerEvent, Reporter, TracingReporter};
use crate::settings::CompilerSettings;
use crate::source::SourceWalker;
use crate::stack::Stack;
use camino::{Utf8Path, Utf8PathBuf};
use mlc_archive::Codecs;
use mlc_vfs::{ContentIndex, DifferenceHasher, HashCache, IndexBuilder, PerceptualHasher};
use rayon::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Progress information emitted while compiling.
///
/// `current` and `total` are only meaningful during
/// [`Resolving`](CompilerStage::Resolving).
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileProgress {
    pub stage: CompilerStage,
    /// The file that was just resolved.
    pub current_file: Option<String>,
    pub current: u32,
    pub total: u32,
}

/// Stages of the pipeline, emitted in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CompilerStage {
    DiscoveringArchives,
    Indexing,
    ScanningSource,
    Resolving,
    GatheringArchives,
    Writing,
    Complete,
}

/// A file whose resolution failed with an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    pub path: RelativePath,
    pub error: String,
}

/// Summary of a successful compilation.
#[derive(Debug)]
pub struct CompileResult {
    /// The mod list that was written.
    pub modlist: ModList,
    /// `NoMatch` directives, one per unresolved file.
    pub unresolved: Vec<Directive>,
    pub failures: Vec<RecordFailure>,
    /// Number of files left out by ignore rules.
    pub ignored: usize,
    /// Path of the exported mod list.
    pub output: Utf8PathBuf,
    /// Wall-clock time for the whole compilation.
    pub build_time: Duration,
}

type ProgressCallback = Arc<dyn Fn(CompileProgress) + Send + Sync>;

/// Compiles an installation into a mod list.
///
/// Create with [`new`](Self::new), swap collaborators with the `with_*`
/// methods, then call [`compile`](Self::compile).
pub struct Compiler {
    settings: CompilerSettings,
    codecs: Arc<Codecs>,
    patcher: Arc<dyn PatchGenerator>,
    hasher: Option<Arc<dyn PerceptualHasher>>,
    reporter: Arc<dyn Reporter>,
    cancel: CancellationToken,
    progress_callback: Option<ProgressCallback>,
}

impl Compiler {
    /// A compiler with the default codecs, bsdiff patches, difference-hash
    /// texture fingerprints and a tracing reporter.
    pub fn new(settings: CompilerSettings) -> Self {
        Self {
            settings,
            codecs: Arc::new(Codecs::default()),
            patcher: Arc::new(BsdiffPatcher::default()),
            hasher: Some(Arc::new(DifferenceHasher)),
            reporter: Arc::new(TracingReporter),
            cancel: CancellationToken::new(),
            progress_callback: None,
        }
    }

    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(CompileProgress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Use `cancel` to stop the compilation from another thread.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Replace the texture fingerprinting, or turn it off with `None`.
    pub fn with_perceptual_hasher(mut self, hasher: Option<Arc<dyn PerceptualHasher>>) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn with_patcher(mut self, patcher: Arc<dyn PatchGenerator>) -> Self {
        self.patcher = patcher;
        self
    }

    pub fn with_codecs(mut self, codecs: Arc<Codecs>) -> Self {
        self.codecs = codecs;
        self
    }

    pub fn settings(&self) -> &CompilerSettings {
        &self.settings
    }

    /// Run the whole pipeline. See the module docs for the stages.
    pub fn compile(&self) -> Result<CompileResult> {
        let start_time = Instant::now();
        let settings = &self.settings;
        settings.validate()?;

        tracing::info!("Compiling {} (profile {})", settings.source, settings.profile);

        let cache = match &settings.hash_cache {
            Some(path) => HashCache::load(path)?,
            None => HashCache::new(),
        };

        self.emit_stage(CompilerStage::DiscoveringArchives);
        let index = self.build_index(&cache)?;
        self.cancel.check()?;

        self.emit_stage(CompilerStage::ScanningSource);
        let mut walker = SourceWalker::new(settings.source.clone())
            .with_cache(&cache)
            .excluding(settings.output_path());
        if let Some(path) = &settings.hash_cache {
            walker = walker.excluding(path.clone());
        }
        let records = walker.walk()?;
        tracing::info!("Found {} files to resolve", records.len());
        self.cancel.check()?;

        let mods = ModRegistry::load(&settings.source, &settings.selected_profiles())?;
        let scratch = create_scratch(&settings.scratch_dir())?;
        let ctx = Arc::new(self.context(index.clone(), mods).with_scratch(scratch.path.clone()));
        let stack = Stack::from_configs(&settings.effective_stack(), &ctx)?;
        tracing::info!("Resolving with {} steps", stack.len());

        let total = records.len() as u32;
        self.emit_progress(CompileProgress {
            stage: CompilerStage::Resolving,
            current_file: None,
            current: 0,
            total,
        });
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.parallelism())
            .build()
            .map_err(|e| CompilerError::Other(format!("cannot start worker pool: {}", e)))?;
        let done = AtomicU32::new(0);
        let results: Vec<Result<Directive>> = pool.install(|| {
            records
                .par_iter()
                .map(|record| {
                    let result = stack.resolve(record);
                    self.emit_progress(CompileProgress {
                        stage: CompilerStage::Resolving,
                        current_file: Some(record.path.to_string()),
                        current: done.fetch_add(1, Ordering::Relaxed) + 1,
                        total,
                    });
                    result
                })
                .collect()
        });
        self.cancel.check()?;

        let mut directives = Vec::with_capacity(results.len());
        let mut unresolved = Vec::new();
        let mut failures = Vec::new();
        let mut ignored = 0;
        for (record, result) in records.iter().zip(results) {
            match result {
                Ok(directive) if directive.is_ignored() => {
                    self.reporter.report(CompilerEvent::Ignored {
                        path: record.path.to_string(),
                        reason: directive.reason().unwrap_or_default().to_string(),
                    });
                    ignored += 1;
                }
                Ok(directive) if directive.is_no_match() => {
                    self.reporter.report(CompilerEvent::Unresolved {
                        path: record.path.to_string(),
                        reason: directive.reason().unwrap_or_default().to_string(),
                    });
                    unresolved.push(directive);
                }
                Ok(directive) => {
                    for entry in nested_no_matches(&directive) {
                        self.reporter.report(CompilerEvent::Unresolved {
                            path: entry.to.to_string(),
                            reason: entry.reason().unwrap_or_default().to_string(),
                        });
                        unresolved.push(entry.clone());
                    }
                    directives.push(directive);
                }
                Err(CompilerError::Cancelled) => return Err(CompilerError::Cancelled),
                Err(e) => {
                    self.reporter.report(CompilerEvent::RecordFailed {
                        path: record.path.to_string(),
                        error: e.to_string(),
                    });
                    failures.push(RecordFailure {
                        path: record.path.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        tracing::info!(
            "Resolved {} files: {} installable, {} ignored, {} unresolved, {} failed",
            records.len(),
            directives.len(),
            ignored,
            unresolved.len(),
            failures.len()
        );
        self.check_critical(&unresolved, &failures)?;

        self.emit_stage(CompilerStage::GatheringArchives);
        let archives = gather_archives(&index, &directives, &settings.game)?;
        let modlist = ModList {
            version: MODLIST_VERSION,
            name: settings.name.clone(),
            author: settings.author.clone(),
            description: settings.description.clone(),
            website: settings.website.clone(),
            modlist_version: settings.modlist_version.clone(),
            game: settings.game.clone(),
            archives,
            directives,
        };

        self.emit_stage(CompilerStage::Writing);
        self.cancel.check()?;
        let output = settings.output_path();
        modlist.export(&output, &ctx.blobs)?;

        if let Some(path) = &settings.hash_cache {
            cache.save(path)?;
        }
        if let Err(e) = scratch.dir.close() {
            tracing::warn!("Cannot remove scratch folder {}: {}", scratch.path, e);
        }

        self.emit_stage(CompilerStage::Complete);
        let build_time = start_time.elapsed();
        tracing::info!("Compiled {} in {:.2?}", output, build_time);

        Ok(CompileResult {
            modlist,
            unresolved,
            failures,
            ignored,
            output,
            build_time,
        })
    }

    /// Discover known archives and index them.
    pub fn build_index(&self, cache: &HashCache) -> Result<Arc<ContentIndex>> {
        let settings = &self.settings;
        let mut archives = discover_downloads(&settings.downloads_dir(), Some(cache))?;
        for (game, folder) in &settings.game_folders {
            archives.extend(discover_game_files(game, folder, Some(cache))?);
        }
        self.cancel.check()?;

        self.emit_stage(CompilerStage::Indexing);
        let mut builder = IndexBuilder::new(self.codecs.clone());
        if let Some(hasher) = &self.hasher {
            builder = builder.with_perceptual_hasher(hasher.clone());
        }
        Ok(Arc::new(builder.build(archives)))
    }

    fn context(&self, index: Arc<ContentIndex>, mods: ModRegistry) -> CompilerContext {
        let ctx = CompilerContext::new(self.settings.clone(), index, mods)
            .with_codecs(self.codecs.clone())
            .with_patcher(self.patcher.clone())
            .with_reporter(self.reporter.clone())
            .with_cancellation(self.cancel.clone());
        match &self.hasher {
            Some(hasher) => ctx.with_perceptual_hasher(hasher.clone()),
            None => ctx,
        }
    }

    fn check_critical(&self, unresolved: &[Directive], failures: &[RecordFailure]) -> Result<()> {
        let critical = &self.settings.critical_paths;
        if critical.is_empty() {
            return Ok(());
        }
        let is_critical = |path: &RelativePath| {
            critical
                .iter()
                .any(|c| path.in_folder(c) || path.as_str().eq_ignore_ascii_case(c))
        };
        let paths: Vec<String> = unresolved
            .iter()
            .map(|d| &d.to)
            .chain(failures.iter().map(|f| &f.path))
            .filter(|p| is_critical(p))
            .map(|p| p.to_string())
            .collect();
        if paths.is_empty() {
            Ok(())
        } else {
            Err(CompilerError::CriticalFilesUnresolved { paths })
        }
    }

    fn emit_stage(&self, stage: CompilerStage) {
        self.emit_progress(CompileProgress {
            stage,
            current_file: None,
            current: 0,
            total: 0,
        });
    }

    fn emit_progress(&self, progress: CompileProgress) {
        if let Some(callback) = &self.progress_callback {
            callback(progress);
        }
    }
}

/// The scratch folder of one compilation, removed when dropped.
struct Scratch {
    dir: tempfile::TempDir,
    path: Utf8PathBuf,
}

/// A fresh folder below `parent`, so concurrent compilations never share one.
fn create_scratch(parent: &Utf8Path) -> Result<Scratch> {
    std::fs::create_dir_all(parent.as_std_path())?;
    let dir = tempfile::Builder::new()
        .prefix("mlc-scratch-")
        .tempdir_in(parent.as_std_path())?;
    let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
        .map_err(|p| CompilerError::Other(format!("scratch folder {} is not UTF-8", p.display())))?;
    tracing::debug!("Extracting container entries below {}", path);
    Ok(Scratch { dir, path })
}

/// `NoMatch` entries anywhere inside a container directive.
fn nested_no_matches(directive: &Directive) -> Vec<&Directive> {
    let DirectiveKind::CreateContainer { entries, .. } = &directive.kind else {
        return Vec::new();
    };
    entries
        .iter()
        .flat_map(|entry| {
            if entry.is_no_match() {
                vec![entry]
            } else {
                nested_no_matches(entry)
            }
        })
        .collect()
}
