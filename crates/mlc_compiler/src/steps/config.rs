//! Serializable step descriptions and the default stack.

use super::*;
use crate::consts::{IGNORE_TAG, INCLUDE_TAG, NOMATCH_INCLUDE_TAG};
use crate::context::CompilerContext;
use crate::error::Result;
use crate::settings::CompilerSettings;
use crate::stack::CompilationStep;
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One entry of a step stack, as stored in settings files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step")]
pub enum StepConfig {
    IgnoreInPath { path: String },
    IgnorePathContains { fragment: String },
    IgnoreExtension { extension: String },
    IgnoreFilename { name: String },
    IgnoreRegex { pattern: String },
    IgnoreTaggedFiles { paths: Vec<String> },
    IgnoreTaggedMods { tag: String },
    IgnoreSaveFiles,
    IgnoreOtherProfiles,
    IgnoreDisabledMods,
    IncludeThisProfile,
    IncludeStubbedConfigFiles,
    IncludeRegex { pattern: String },
    IncludeModIniData,
    IncludeTaggedFiles { paths: Vec<String> },
    IncludeTaggedMods { tag: String },
    IncludeAllConfigs,
    IncludeAll,
    DirectMatch,
    IncludePatches,
    DeconstructContainers,
    MatchSimilarTextures,
    DropAll,
}

impl StepConfig {
    /// Instantiate the step.
    pub fn build(&self, ctx: &Arc<CompilerContext>) -> Result<Box<dyn CompilationStep>> {
        let step: Box<dyn CompilationStep> = match self {
            StepConfig::IgnoreInPath { path } => Box::new(IgnoreInPath::new(path.clone())),
            StepConfig::IgnorePathContains { fragment } => {
                Box::new(IgnorePathContains::new(fragment.clone()))
            }
            StepConfig::IgnoreExtension { extension } => {
                Box::new(IgnoreExtension::new(extension.clone()))
            }
            StepConfig::IgnoreFilename { name } => Box::new(IgnoreFilename::new(name.clone())),
            StepConfig::IgnoreRegex { pattern } => Box::new(IgnoreRegex::new(pattern)?),
            StepConfig::IgnoreTaggedFiles { paths } => {
                Box::new(IgnoreTaggedFiles::new(paths.clone()))
            }
            StepConfig::IgnoreTaggedMods { tag } => Box::new(IgnoreTaggedMods::new(ctx, tag.clone())),
            StepConfig::IgnoreSaveFiles => Box::new(IgnoreSaveFiles::new(ctx)),
            StepConfig::IgnoreOtherProfiles => Box::new(IgnoreOtherProfiles::new(ctx)),
            StepConfig::IgnoreDisabledMods => Box::new(IgnoreDisabledMods::new(ctx.clone())),
            StepConfig::IncludeThisProfile => Box::new(IncludeThisProfile::new(ctx.clone())),
            StepConfig::IncludeStubbedConfigFiles => {
                Box::new(IncludeStubbedConfigFiles::new(ctx.clone())?)
            }
            StepConfig::IncludeRegex { pattern } => {
                Box::new(IncludeRegex::new(ctx.clone(), pattern)?)
            }
            StepConfig::IncludeModIniData => Box::new(IncludeModIniData::new(ctx.clone())),
            StepConfig::IncludeTaggedFiles { paths } => {
                Box::new(IncludeTaggedFiles::new(ctx.clone(), paths.clone()))
            }
            StepConfig::IncludeTaggedMods { tag } => {
                Box::new(IncludeTaggedMods::new(ctx.clone(), tag))
            }
            StepConfig::IncludeAllConfigs => Box::new(IncludeAllConfigs::new(ctx.clone())),
            StepConfig::IncludeAll => Box::new(IncludeAll::new(ctx.clone())),
            StepConfig::DirectMatch => Box::new(DirectMatch::new(ctx.clone())),
            StepConfig::IncludePatches => Box::new(IncludePatches::new(ctx.clone())),
            StepConfig::DeconstructContainers => Box::new(DeconstructContainers::new(ctx.clone())),
            StepConfig::MatchSimilarTextures => Box::new(MatchSimilarTextures::new(ctx.clone())),
            StepConfig::DropAll => Box::new(DropAll),
        };
        Ok(step)
    }
}

fn ignore_in_path(path: &str) -> StepConfig {
    StepConfig::IgnoreInPath { path: path.into() }
}

fn ignore_path_contains(fragment: &str) -> StepConfig {
    StepConfig::IgnorePathContains {
        fragment: fragment.into(),
    }
}

fn ignore_extension(extension: &str) -> StepConfig {
    StepConfig::IgnoreExtension {
        extension: extension.into(),
    }
}

fn ignore_filename(name: &str) -> StepConfig {
    StepConfig::IgnoreFilename { name: name.into() }
}

fn include_regex(pattern: &str) -> StepConfig {
    StepConfig::IncludeRegex {
        pattern: pattern.into(),
    }
}

/// The stack used when the settings do not provide one.
pub fn default_stack(settings: &CompilerSettings) -> Vec<StepConfig> {
    let mut stack = vec![
        StepConfig::IgnoreSaveFiles,
        StepConfig::IgnoreTaggedFiles {
            paths: settings.ignore.clone(),
        },
        StepConfig::IgnoreTaggedMods {
            tag: IGNORE_TAG.into(),
        },
    ];
    stack.extend(
        ["logs", "downloads", "webcache", "overwrite", "crashDumps"]
            .into_iter()
            .map(ignore_in_path),
    );
    stack.extend(
        ["temporary_logs", "GPUCache", "SSEEdit Cache"]
            .into_iter()
            .map(ignore_path_contains),
    );
    stack.extend([
        StepConfig::IgnoreOtherProfiles,
        StepConfig::IgnoreDisabledMods,
        StepConfig::IncludeThisProfile,
        StepConfig::IncludeStubbedConfigFiles,
        include_regex("^[^/]*\\.bat$"),
        StepConfig::IncludeModIniData,
        StepConfig::DirectMatch,
        StepConfig::IncludeTaggedFiles {
            paths: settings.include.clone(),
        },
        StepConfig::IncludeTaggedMods {
            tag: INCLUDE_TAG.into(),
        },
        StepConfig::DeconstructContainers,
        ignore_extension(".pyc"),
        ignore_extension(".log"),
        StepConfig::MatchSimilarTextures,
        StepConfig::IncludePatches,
        ignore_extension(".html"),
    ]);
    stack.extend(
        ["HavokBehaviorPostProcess.exe", "portable.txt", ".refcache"]
            .into_iter()
            .map(ignore_filename),
    );
    stack.extend([
        ignore_extension(".bin"),
        include_regex("categories\\.dat$"),
        include_regex("splash\\.png"),
        StepConfig::IncludeAllConfigs,
        StepConfig::IncludeTaggedFiles {
            paths: settings.no_match_include.clone(),
        },
        StepConfig::IncludeTaggedMods {
            tag: NOMATCH_INCLUDE_TAG.into(),
        },
        include_regex(".*\\.txt"),
        ignore_path_contains("/Edit Scripts/Export/"),
        ignore_extension(".cache"),
        include_regex("modlist-image\\.png"),
        StepConfig::DropAll,
    ]);
    stack
}

/// The stack run over each entry of a deconstructed container. Whatever
/// nothing else matched is inlined so the container can always be rebuilt.
pub fn default_container_stack() -> Vec<StepConfig> {
    vec![
        StepConfig::DirectMatch,
        StepConfig::MatchSimilarTextures,
        StepConfig::IncludePatches,
        StepConfig::DeconstructContainers,
        StepConfig::IncludeAll,
    ]
}

/// Save a stack as pretty JSON.
pub fn save_stack(path: &Utf8Path, stack: &[StepConfig]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_str().is_empty() {
            std::fs::create_dir_all(parent.as_std_path())?;
        }
    }
    let json = serde_json::to_string_pretty(stack)?;
    std::fs::write(path.as_std_path(), json)?;
    tracing::debug!("Saved {} steps to {}", stack.len(), path);
    Ok(())
}

pub fn load_stack(path: &Utf8Path) -> Result<Vec<StepConfig>> {
    let file = std::fs::File::open(path.as_std_path())?;
    let stack: Vec<StepConfig> = serde_json::from_reader(std::io::BufReader::new(file))?;
    tracing::debug!("Loaded {} steps from {}", stack.len(), path);
    Ok(stack)
}
