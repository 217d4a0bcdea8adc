//! Compiler settings, loaded from `*.toml` or `*.json`.

use crate::consts::{DOWNLOADS_FOLDER, MODLIST_EXTENSION};
use crate::error::{CompilerError, Result};
use crate::steps::{
    default_container_stack, default_stack, default_tie_break, StepConfig, TieBreakRule,
};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_MAX_CONCURRENT_CONTAINERS: usize = 2;
pub const DEFAULT_OVERSIZED_CONTAINER_BYTES: u64 = 2 * 1024 * 1024 * 1024;
pub const DEFAULT_TEXTURE_SIMILARITY_THRESHOLD: f32 = 0.80;
pub const DEFAULT_PATCH_CANDIDATES: usize = 3;
pub const DEFAULT_MAX_PATCH_SOURCE_BYTES: u64 = 512 * 1024 * 1024;

/// Everything a compilation needs to know about the installation and the
/// mod list it should produce.
///
/// Relative paths in a settings file are resolved against the file's folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerSettings {
    /// Root of the mod manager installation.
    pub source: Utf8PathBuf,
    /// Downloads folder. Defaults to `<source>/downloads`.
    pub downloads: Option<Utf8PathBuf>,
    /// Where the mod list is written. Defaults to `<source>/<name>.modlist`.
    pub output: Option<Utf8PathBuf>,
    /// The profile being compiled.
    pub profile: String,
    pub additional_profiles: Vec<String>,
    /// The game the mod list targets.
    pub game: String,
    /// Game installations whose files count as known archives, by game name.
    pub game_folders: BTreeMap<String, Utf8PathBuf>,

    /// Folders inlined whenever nothing matched earlier.
    pub include: Vec<String>,
    /// Folders left out of the mod list.
    pub ignore: Vec<String>,
    /// Folders inlined only when nothing matched at all.
    pub no_match_include: Vec<String>,
    /// Mods never treated as disabled.
    pub always_enabled: Vec<String>,

    pub name: String,
    pub author: String,
    pub description: String,
    pub website: String,
    pub modlist_version: String,

    /// Worker threads used for resolution. Defaults to the available parallelism.
    pub max_parallelism: Option<usize>,
    /// Containers unpacked at the same time.
    pub max_concurrent_containers: usize,
    /// Containers at least this large are reported before being unpacked.
    pub oversized_container_bytes: u64,
    /// Lowest similarity accepted for perceptual texture matches.
    pub texture_similarity_threshold: f32,
    /// Near-match candidates diffed per file.
    pub patch_candidates: usize,
    /// Archive entries larger than this are never used as patch sources.
    pub max_patch_source_bytes: u64,
    pub tie_break: Vec<TieBreakRule>,

    /// Path prefixes that must resolve for a compilation to succeed.
    pub critical_paths: Vec<String>,
    /// Where file hashes are cached between runs.
    pub hash_cache: Option<Utf8PathBuf>,
    /// Folder in which each compilation creates its own scratch folder for
    /// extracted container entries. Defaults to the system temp folder.
    pub scratch: Option<Utf8PathBuf>,
    /// Replaces the default step stack.
    pub stack: Option<Vec<StepConfig>>,
    /// Replaces the stack run over the entries of each game container.
    pub container_stack: Option<Vec<StepConfig>>,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            source: Utf8PathBuf::new(),
            downloads: None,
            output: None,
            profile: String::new(),
            additional_profiles: Vec::new(),
            game: String::new(),
            game_folders: BTreeMap::new(),
            include: Vec::new(),
            ignore: Vec::new(),
            no_match_include: Vec::new(),
            always_enabled: Vec::new(),
            name: String::new(),
            author: String::new(),
            description: String::new(),
            website: String::new(),
            modlist_version: String::new(),
            max_parallelism: None,
            max_concurrent_containers: DEFAULT_MAX_CONCURRENT_CONTAINERS,
            oversized_container_bytes: DEFAULT_OVERSIZED_CONTAINER_BYTES,
            texture_similarity_threshold: DEFAULT_TEXTURE_SIMILARITY_THRESHOLD,
            patch_candidates: DEFAULT_PATCH_CANDIDATES,
            max_patch_source_bytes: DEFAULT_MAX_PATCH_SOURCE_BYTES,
            tie_break: default_tie_break(),
            critical_paths: Vec::new(),
            hash_cache: None,
            scratch: None,
            stack: None,
            container_stack: None,
        }
    }
}

impl CompilerSettings {
    /// Load settings, choosing the format by file extension.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let extension = path.extension().map(|e| e.to_ascii_lowercase());
        let mut settings: Self = match extension.as_deref() {
            Some("json") => {
                let file = std::fs::File::open(path.as_std_path())?;
                serde_json::from_reader(std::io::BufReader::new(file))?
            }
            Some("toml") => toml::from_str(&std::fs::read_to_string(path.as_std_path())?)?,
            _ => return Err(CompilerError::UnsupportedSettingsFormat(path.to_path_buf())),
        };

        if let Some(base) = path.parent() {
            settings.resolve_relative_to(base);
        }
        tracing::debug!("Loaded settings from {}", path);
        Ok(settings)
    }

    /// Save settings, choosing the format by file extension.
    pub fn save(&self, path: &Utf8Path) -> Result<()> {
        let extension = path.extension().map(|e| e.to_ascii_lowercase());
        let contents = match extension.as_deref() {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("toml") => toml::to_string_pretty(self)
                .map_err(|e| CompilerError::InvalidSettings(e.to_string()))?,
            _ => return Err(CompilerError::UnsupportedSettingsFormat(path.to_path_buf())),
        };
        if let Some(parent) = path.parent() {
            if !parent.as_str().is_empty() {
                std::fs::create_dir_all(parent.as_std_path())?;
            }
        }
        std::fs::write(path.as_std_path(), contents)?;
        Ok(())
    }

    fn resolve_relative_to(&mut self, base: &Utf8Path) {
        let resolve = |path: &mut Utf8PathBuf| {
            if path.is_relative() && !path.as_str().is_empty() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.source);
        for path in [
            &mut self.downloads,
            &mut self.output,
            &mut self.hash_cache,
            &mut self.scratch,
        ]
        .into_iter()
        .flatten()
        {
            resolve(path);
        }
        for path in self.game_folders.values_mut() {
            resolve(path);
        }
    }

    /// Reject settings a compilation cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.source.as_str().is_empty() {
            return Err(CompilerError::InvalidSettings("source is not set".into()));
        }
        if !self.source.is_dir() {
            return Err(CompilerError::InvalidSettings(format!(
                "source folder {} does not exist",
                self.source
            )));
        }
        if self.profile.trim().is_empty() {
            return Err(CompilerError::InvalidSettings("profile is not set".into()));
        }
        if !(0.0..=1.0).contains(&self.texture_similarity_threshold) {
            return Err(CompilerError::InvalidSettings(format!(
                "textureSimilarityThreshold must be between 0 and 1, got {}",
                self.texture_similarity_threshold
            )));
        }
        if self.max_parallelism == Some(0) {
            return Err(CompilerError::InvalidSettings(
                "maxParallelism must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn downloads_dir(&self) -> Utf8PathBuf {
        self.downloads
            .clone()
            .unwrap_or_else(|| self.source.join(DOWNLOADS_FOLDER))
    }

    /// Parent of the per-run scratch folders.
    pub fn scratch_dir(&self) -> Utf8PathBuf {
        self.scratch.clone().unwrap_or_else(|| {
            let temp = std::env::temp_dir();
            Utf8PathBuf::from_path_buf(temp)
                .unwrap_or_else(|p| Utf8PathBuf::from(p.to_string_lossy().into_owned()))
        })
    }

    /// The compiled profile followed by the additional ones.
    pub fn selected_profiles(&self) -> Vec<&str> {
        std::iter::once(self.profile.as_str())
            .chain(self.additional_profiles.iter().map(|p| p.as_str()))
            .filter(|p| !p.is_empty())
            .collect()
    }

    pub fn output_path(&self) -> Utf8PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let stem = if self.name.is_empty() {
                &self.profile
            } else {
                &self.name
            };
            self.source.join(format!("{}.{}", stem, MODLIST_EXTENSION))
        })
    }

    pub fn parallelism(&self) -> usize {
        self.max_parallelism.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// The configured stack, or the default one.
    pub fn effective_stack(&self) -> Vec<StepConfig> {
        self.stack.clone().unwrap_or_else(|| default_stack(self))
    }

    /// The configured container stack, or the default one.
    pub fn effective_container_stack(&self) -> Vec<StepConfig> {
        self.container_stack
            .clone()
            .unwrap_or_else(default_container_stack)
    }
}
