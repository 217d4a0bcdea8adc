//! Mod-list compiler.
//!
//! Turns a modded installation into a portable mod list: for every installed
//! file a [`Directive`] that tells an installer how to regenerate it from
//! public downloads, game files, small inline blobs or binary patches.
//!
//! # Overview
//!
//! - [`Compiler`] runs the whole pipeline from [`CompilerSettings`] to an
//!   exported [`ModList`].
//! - Each file is resolved by a [`Stack`] of [`CompilationStep`]s. The first
//!   step with an opinion decides. Stacks are described by [`StepConfig`]s and
//!   default to [`default_stack`].
//! - Steps consult a shared [`CompilerContext`]: the content index of known
//!   archives, the mod metadata, the blob store and the injected collaborators
//!   ([`PatchGenerator`], [`Reporter`], perceptual hasher).
//!
//! # Example
//!
//! ```no_run
//! use mlc_compiler::{Compiler, CompilerSettings};
//! use camino::Utf8Path;
//!
//! # fn main() -> mlc_compiler::Result<()> {
//! let settings = CompilerSettings::load(Utf8Path::new("compile.toml"))?;
//! let result = Compiler::new(settings).compile()?;
//! println!(
//!     "{} directives, {} unresolved",
//!     result.modlist.directives.len(),
//!     result.unresolved.len()
//! );
//! # Ok(())
//! # }
//! ```

pub mod blobs;
pub mod compiler;
pub mod consts;
pub mod context;
pub mod directive;
pub mod downloads;
pub mod error;
pub mod limiter;
pub mod manifest;
pub mod mod_meta;
pub mod patch;
pub mod path;
pub mod reporter;
pub mod settings;
pub mod source;
pub mod stack;
pub mod steps;

pub use blobs::{BlobSource, BlobStore};
pub use compiler::{CompileProgress, CompileResult, Compiler, CompilerStage, RecordFailure};
pub use context::CompilerContext;
pub use directive::{Directive, DirectiveKind};
pub use downloads::{discover_downloads, discover_game_files, primary_key_from_meta};
pub use error::{CompilerError, Result};
pub use limiter::{CancellationToken, Limiter, LimiterPermit};
pub use manifest::{gather_archives, Archive, ModList, MODLIST_VERSION};
pub use mod_meta::{ModMeta, ModRegistry};
pub use patch::{BsdiffPatcher, PatchGenerator, PATCH_ZSTD_LEVEL};
pub use path::RelativePath;
pub use reporter::{CollectingReporter, CompilerEvent, Reporter, TracingReporter};
pub use settings::CompilerSettings;
pub use source::{ContainerOrigin, RawSourceFile, SourceWalker};
pub use stack::{CompilationStep, Stack, NO_MATCH_REASON};
pub use steps::{
    default_container_stack, default_stack, load_stack, save_stack, StepConfig, TieBreakRule,
};
