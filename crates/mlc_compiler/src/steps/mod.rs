//! The step catalogue.
//!
//! Steps fall into a few families:
//!
//! - **ignore** rules exclude files from the mod list ([`ignore`])
//! - **include** rules inline files into the mod list archive ([`include`])
//! - **matchers** point files at downloadable archives: [`DirectMatch`],
//!   [`IncludePatches`] and [`MatchSimilarTextures`]
//! - [`DeconstructContainers`] resolves a game container entry by entry
//!
//! Stacks are described by [`StepConfig`] values and built with
//! [`Stack::from_configs`](crate::Stack::from_configs).

pub mod config;
pub mod containers;
pub mod direct_match;
pub mod ignore;
pub mod include;
pub mod patches;
pub mod textures;

pub use config::{default_container_stack, default_stack, load_stack, save_stack, StepConfig};
pub use containers::DeconstructContainers;
pub use direct_match::{default_tie_break, DirectMatch, TieBreakRule};
pub use ignore::{
    DropAll, IgnoreDisabledMods, IgnoreExtension, IgnoreFilename, IgnoreInPath,
    IgnoreOtherProfiles, IgnorePathContains, IgnoreRegex, IgnoreSaveFiles, IgnoreTaggedFiles,
    IgnoreTaggedMods,
};
pub use include::{
    IncludeAll, IncludeAllConfigs, IncludeModIniData, IncludeRegex, IncludeStubbedConfigFiles,
    IncludeTaggedFiles, IncludeTaggedMods, IncludeThisProfile,
};
pub use patches::{levenshtein, IncludePatches};
pub use textures::{MatchSimilarTextures, PAIR_POSTFIXES};

use crate::context::CompilerContext;
use crate::directive::{Directive, DirectiveKind};
use crate::path::RelativePath;
use crate::source::RawSourceFile;

/// A directive for `source` with its target, hash and size filled in.
pub(crate) fn directive_for(source: &RawSourceFile, kind: DirectiveKind) -> Directive {
    Directive::new(source.path.clone(), source.hash, source.size, kind)
}

pub(crate) fn ignored(source: &RawSourceFile, reason: impl Into<String>) -> Directive {
    directive_for(
        source,
        DirectiveKind::IgnoredDirectly {
            reason: reason.into(),
        },
    )
}

/// Inline `source` unchanged. The blob id is the content hash.
pub(crate) fn inline(ctx: &CompilerContext, source: &RawSourceFile) -> Directive {
    let id = ctx
        .blobs
        .insert_file(source.hash.to_hex(), source.absolute.clone());
    directive_for(source, DirectiveKind::InlineFile { source_data_id: id })
}

/// The path used for mod-scoped decisions. Container entries inherit the
/// path of the outermost container they came from.
pub(crate) fn owning_path(source: &RawSourceFile) -> &RelativePath {
    source
        .container
        .as_ref()
        .map(|origin| &origin.container)
        .unwrap_or(&source.path)
}

/// Lowercased mod name owning `source`, if it lives in a mod folder.
pub(crate) fn owning_mod(source: &RawSourceFile) -> Option<String> {
    owning_path(source).mod_name().map(|m| m.to_ascii_lowercase())
}
