//! Game containers resolved entry by entry.
//!
//! A modded game container rarely matches anything byte for byte, but most of
//! its entries usually do. The container is unpacked into the scratch folder,
//! every entry is run through a small stack of its own, and the result is a
//! [`CreateContainer`](DirectiveKind::CreateContainer) directive from which the
//! installer can rebuild the container.
//!
//! Entries the container stack leaves unmatched stay in the directive as
//! `NoMatch` and are reported by the compiler along with the top-level ones.

use super::{directive_for, owning_path};
use crate::consts::{CONTAINER_EXTENSIONS, TEMP_CONTAINER_FILES};
use crate::context::CompilerContext;
use crate::directive::{Directive, DirectiveKind};
use crate::error::{CompilerError, Result};
use crate::path::RelativePath;
use crate::reporter::CompilerEvent;
use crate::source::{ContainerOrigin, RawSourceFile};
use crate::stack::{CompilationStep, Stack};
use mlc_archive::{normalize_entry_path, ArchiveError, Codecs, ContainerState, ContentHash};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

pub struct DeconstructContainers {
    ctx: Arc<CompilerContext>,
}

impl DeconstructContainers {
    pub fn new(ctx: Arc<CompilerContext>) -> Self {
        Self { ctx }
    }

    /// Unpack every entry below `<scratch>/<temp_id>` and build its record.
    fn extract(&self, source: &RawSourceFile, temp_id: &str) -> Result<Vec<RawSourceFile>> {
        let root = self.ctx.scratch.join(temp_id);
        let container = owning_path(source).clone();
        let mut records = Vec::new();

        self.ctx
            .codecs
            .for_each_entry(&source.absolute, &mut |entry, data| {
                let entry = normalize_entry_path(entry);
                if entry.is_empty() || entry.split('/').any(|s| s == "..") {
                    return Err(ArchiveError::InvalidEntryPath(entry));
                }
                let absolute = root.join(&entry);
                if let Some(parent) = absolute.parent() {
                    std::fs::create_dir_all(parent.as_std_path())?;
                }
                std::fs::write(absolute.as_std_path(), data)?;
                tracing::trace!("Extracted {} from {}", entry, source.path);

                records.push(RawSourceFile {
                    path: RelativePath::new(format!("{}/{}/{}", TEMP_CONTAINER_FILES, temp_id, entry)),
                    absolute,
                    hash: ContentHash::of(data),
                    size: data.len() as u64,
                    container: Some(ContainerOrigin {
                        container: container.clone(),
                        entry,
                    }),
                });
                Ok(())
            })?;
        Ok(records)
    }

    /// Rebuild the container from the extracted entries and compare hashes.
    fn verify(&self, source: &RawSourceFile, state: &ContainerState, records: &[RawSourceFile]) -> Result<()> {
        let by_entry: HashMap<String, &RawSourceFile> = records
            .iter()
            .filter_map(|r| r.container.as_ref().map(|o| (o.entry.to_ascii_lowercase(), r)))
            .collect();

        let rebuilt = self.ctx.codecs.build(state, &mut |entry| {
            let key = normalize_entry_path(entry).to_ascii_lowercase();
            let record = by_entry
                .get(&key)
                .ok_or_else(|| ArchiveError::EntryNotFound(entry.to_string()))?;
            Ok(std::fs::read(record.absolute.as_std_path())?)
        })?;

        let actual = ContentHash::of(&rebuilt);
        if actual != source.hash {
            return Err(CompilerError::ContainerRebuildMismatch {
                path: source.path.to_string(),
                expected: source.hash,
                actual,
            });
        }
        Ok(())
    }

    fn sub_stack(&self) -> Result<Stack> {
        Stack::from_configs(&self.ctx.settings.effective_container_stack(), &self.ctx)
    }
}

/// Scratch subfolder of a container. Derived from the container's path, which
/// is unique within a compilation even when two containers share content.
fn temp_id_for(source: &RawSourceFile) -> String {
    let mut id = ContentHash::of(source.path.as_str().as_bytes()).to_hex();
    id.truncate(16);
    id
}

impl CompilationStep for DeconstructContainers {
    fn name(&self) -> &'static str {
        "DeconstructContainers"
    }

    fn run(&self, source: &RawSourceFile) -> Result<Option<Directive>> {
        if !CONTAINER_EXTENSIONS.iter().any(|ext| source.path.has_extension(ext)) {
            return Ok(None);
        }
        let header = Codecs::read_signature(&source.absolute)?;
        if !self.ctx.codecs.is_rebuildable(&header) {
            return Ok(None);
        }
        self.ctx.cancel.check()?;

        let temp_id = temp_id_for(source);
        // Only unpacking and verification count against the limit. Entries
        // may be containers themselves and need a slot of their own.
        let (state, records) = {
            let _permit = self.ctx.limiter.acquire();
            if source.size >= self.ctx.settings.oversized_container_bytes {
                self.ctx.reporter.report(CompilerEvent::OversizedContainer {
                    path: source.path.to_string(),
                    size: source.size,
                });
            }
            let Some(state) = self.ctx.codecs.container_state(&source.absolute)? else {
                return Ok(None);
            };
            let records = self.extract(source, &temp_id)?;
            self.verify(source, &state, &records)?;
            (state, records)
        };
        tracing::debug!("Deconstructing {} ({} entries)", source.path, records.len());

        let stack = self.sub_stack()?;
        let results: Vec<Result<Directive>> = records.par_iter().map(|r| stack.resolve(r)).collect();

        let mut entries = Vec::with_capacity(records.len());
        for (record, result) in records.iter().zip(results) {
            let mut directive = result?;
            let entry = record
                .container
                .as_ref()
                .map(|o| o.entry.clone())
                .unwrap_or_default();
            match &mut directive.kind {
                DirectiveKind::IgnoredDirectly { reason } => {
                    return Err(CompilerError::IgnoredInContainer {
                        container: source.path.to_string(),
                        entry,
                        reason: reason.clone(),
                    });
                }
                DirectiveKind::NoMatch { reason } => {
                    tracing::debug!("{} has unmatched entry {}", source.path, entry);
                    *reason = format!("{} (entry {} of {})", reason, entry, source.path);
                }
                _ => {}
            }
            entries.push(directive);
        }

        Ok(Some(directive_for(
            source,
            DirectiveKind::CreateContainer {
                temp_id,
                state,
                entries,
            },
        )))
    }
}
