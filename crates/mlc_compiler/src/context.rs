//! Shared, read-mostly state handed to every compilation step.

use crate::blobs::BlobStore;
use crate::error::Result;
use crate::limiter::{CancellationToken, Limiter};
use crate::mod_meta::ModRegistry;
use crate::patch::{BsdiffPatcher, PatchGenerator};
use crate::reporter::{Reporter, TracingReporter};
use crate::settings::CompilerSettings;
use camino::Utf8PathBuf;
use mlc_archive::Codecs;
use mlc_vfs::{ContentIndex, FileId, PerceptualHasher};
use std::sync::Arc;

/// Everything a step may consult. Built once per compilation and shared via `Arc`.
///
/// Apart from the blob store, the reporter and the limiter, nothing in here
/// changes after construction.
pub struct CompilerContext {
    pub settings: CompilerSettings,
    pub index: Arc<ContentIndex>,
    pub mods: ModRegistry,
    pub codecs: Arc<Codecs>,
    pub patcher: Arc<dyn PatchGenerator>,
    pub hasher: Option<Arc<dyn PerceptualHasher>>,
    pub reporter: Arc<dyn Reporter>,
    pub blobs: BlobStore,
    pub cancel: CancellationToken,
    pub limiter: Limiter,
    /// Container entries are extracted below this folder.
    pub scratch: Utf8PathBuf,
}

impl CompilerContext {
    /// A context with the default codecs, bsdiff patches, tracing reporter and
    /// no perceptual hasher.
    pub fn new(settings: CompilerSettings, index: Arc<ContentIndex>, mods: ModRegistry) -> Self {
        let limiter = Limiter::new(settings.max_concurrent_containers);
        let scratch = settings.scratch_dir();
        Self {
            settings,
            index,
            mods,
            codecs: Arc::new(Codecs::default()),
            patcher: Arc::new(BsdiffPatcher::default()),
            hasher: None,
            reporter: Arc::new(TracingReporter),
            blobs: BlobStore::new(),
            cancel: CancellationToken::new(),
            limiter,
            scratch,
        }
    }

    pub fn with_codecs(mut self, codecs: Arc<Codecs>) -> Self {
        self.codecs = codecs;
        self
    }

    pub fn with_patcher(mut self, patcher: Arc<dyn PatchGenerator>) -> Self {
        self.patcher = patcher;
        self
    }

    pub fn with_perceptual_hasher(mut self, hasher: Arc<dyn PerceptualHasher>) -> Self {
        self.hasher = Some(hasher);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_scratch(mut self, scratch: Utf8PathBuf) -> Self {
        self.scratch = scratch;
        self
    }

    /// Read the bytes of an indexed file by walking its hash path from the
    /// top-level archive down.
    pub fn read_virtual_file(&self, id: FileId) -> Result<Vec<u8>> {
        let archive = self.index.archive_of(id);
        let hash_path = self.index.hash_path(id);
        let mut parts = hash_path.parts.iter();

        let Some(first) = parts.next() else {
            return Ok(std::fs::read(archive.path.as_std_path())?);
        };
        let mut name = first.as_str();
        let mut bytes = self.codecs.extract(&archive.path, first)?;
        for part in parts {
            bytes = self.codecs.extract_from_bytes(name, &bytes, part)?;
            name = part.as_str();
        }
        Ok(bytes)
    }
}
