//! Rules that inline files into the mod list archive.

use super::{directive_for, inline, owning_mod};
use crate::consts::{
    is_config_extension, DOWNLOAD_PATH_MAGIC, INSTALL_PATH_MAGIC, MODLIST_FILE, MOD_META_FILE,
};
use crate::context::CompilerContext;
use crate::directive::{Directive, DirectiveKind};
use crate::error::Result;
use crate::source::RawSourceFile;
use crate::stack::CompilationStep;
use mlc_archive::ContentHash;
use regex::{NoExpand, Regex, RegexBuilder};
use std::collections::HashSet;
use std::sync::Arc;

/// Inlines the files of the compiled profiles.
///
/// A profile's `modlist.txt` is cleaned first: lines for disabled mods are
/// dropped, separators are kept.
pub struct IncludeThisProfile {
    ctx: Arc<CompilerContext>,
    selected: HashSet<String>,
}

impl IncludeThisProfile {
    pub fn new(ctx: Arc<CompilerContext>) -> Self {
        let selected = ctx
            .settings
            .selected_profiles()
            .into_iter()
            .map(|p| p.to_ascii_lowercase())
            .collect();
        Self { ctx, selected }
    }
}

/// `modlist.txt` without disabled, non-separator entries.
pub fn clean_modlist(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    for line in text.lines() {
        if line.starts_with('-') && !line.trim_end().ends_with("_separator") {
            continue;
        }
        cleaned.push_str(line);
        cleaned.push_str("\r\n");
    }
    cleaned
}

impl CompilationStep for IncludeThisProfile {
    fn name(&self) -> &'static str {
        "IncludeThisProfile"
    }

    fn run(&self, source: &RawSourceFile) -> Result<Option<Directive>> {
        let Some(profile) = source.path.profile_name() else {
            return Ok(None);
        };
        if !self.selected.contains(&profile.to_ascii_lowercase()) {
            return Ok(None);
        }

        if !source.path.file_name().eq_ignore_ascii_case(MODLIST_FILE) {
            return Ok(Some(inline(&self.ctx, source)));
        }

        let cleaned = clean_modlist(&source.read_to_string()?).into_bytes();
        let hash = ContentHash::of(&cleaned);
        let size = cleaned.len() as u64;
        let id = self.ctx.blobs.insert_bytes(hash.to_hex(), cleaned);
        Ok(Some(Directive::new(
            source.path.clone(),
            hash,
            size,
            DirectiveKind::InlineFile { source_data_id: id },
        )))
    }
}

/// Inlines config files that mention the installation or downloads folder,
/// with those paths replaced by placeholder tokens.
pub struct IncludeStubbedConfigFiles {
    ctx: Arc<CompilerContext>,
    /// Downloads first: the downloads folder usually lives inside the installation.
    replacements: Vec<(Regex, &'static str)>,
}

impl IncludeStubbedConfigFiles {
    pub fn new(ctx: Arc<CompilerContext>) -> Result<Self> {
        let downloads = ctx.settings.downloads_dir();
        let replacements = vec![
            (path_regex(downloads.as_str())?, DOWNLOAD_PATH_MAGIC),
            (path_regex(ctx.settings.source.as_str())?, INSTALL_PATH_MAGIC),
        ];
        Ok(Self { ctx, replacements })
    }
}

/// Case-insensitive regex matching `path` spelled with `/`, `\` or `\\`.
fn path_regex(path: &str) -> Result<Regex> {
    let path = path.replace('\\', "/");
    let path = path.trim_end_matches('/');
    let pattern = path
        .split('/')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"(?:/|\\\\|\\)");
    Ok(RegexBuilder::new(&pattern).case_insensitive(true).build()?)
}

impl CompilationStep for IncludeStubbedConfigFiles {
    fn name(&self) -> &'static str {
        "IncludeStubbedConfigFiles"
    }

    fn run(&self, source: &RawSourceFile) -> Result<Option<Directive>> {
        if !source.path.extension().is_some_and(|e| is_config_extension(&e)) {
            return Ok(None);
        }
        let Ok(text) = source.read_to_string() else {
            return Ok(None);
        };
        if !self.replacements.iter().any(|(re, _)| re.is_match(&text)) {
            return Ok(None);
        }

        let mut stubbed = text;
        for (regex, token) in &self.replacements {
            stubbed = regex.replace_all(&stubbed, NoExpand(token)).into_owned();
        }
        let bytes = stubbed.into_bytes();
        let id = self
            .ctx
            .blobs
            .insert_bytes(ContentHash::of(&bytes).to_hex(), bytes);
        Ok(Some(directive_for(
            source,
            DirectiveKind::RemappedInlineFile { source_data_id: id },
        )))
    }
}

pub struct IncludeRegex {
    ctx: Arc<CompilerContext>,
    regex: Regex,
}

impl IncludeRegex {
    pub fn new(ctx: Arc<CompilerContext>, pattern: &str) -> Result<Self> {
        Ok(Self {
            ctx,
            regex: Regex::new(pattern)?,
        })
    }
}

impl CompilationStep for IncludeRegex {
    fn name(&self) -> &'static str {
        "IncludeRegex"
    }

    fn run(&self, source: &RawSourceFile) -> Result<Option<Directive>> {
        if self.regex.is_match(source.path.as_str()) {
            return Ok(Some(inline(&self.ctx, source)));
        }
        Ok(None)
    }
}

/// Inlines `mods/<name>/meta.ini`.
pub struct IncludeModIniData {
    ctx: Arc<CompilerContext>,
}

impl IncludeModIniData {
    pub fn new(ctx: Arc<CompilerContext>) -> Self {
        Self { ctx }
    }
}

impl CompilationStep for IncludeModIniData {
    fn name(&self) -> &'static str {
        "IncludeModIniData"
    }

    fn run(&self, source: &RawSourceFile) -> Result<Option<Directive>> {
        let is_meta = source.path.mod_name().is_some()
            && source.path.segments().count() == 3
            && source.path.file_name().eq_ignore_ascii_case(MOD_META_FILE);
        if is_meta {
            return Ok(Some(inline(&self.ctx, source)));
        }
        Ok(None)
    }
}

/// Inlines files under any of the user-listed folders.
pub struct IncludeTaggedFiles {
    ctx: Arc<CompilerContext>,
    folders: Vec<String>,
}

impl IncludeTaggedFiles {
    pub fn new(ctx: Arc<CompilerContext>, folders: Vec<String>) -> Self {
        Self { ctx, folders }
    }
}

impl CompilationStep for IncludeTaggedFiles {
    fn name(&self) -> &'static str {
        "IncludeTaggedFiles"
    }

    fn run(&self, source: &RawSourceFile) -> Result<Option<Directive>> {
        if self.folders.iter().any(|f| source.path.in_folder(f)) {
            return Ok(Some(inline(&self.ctx, source)));
        }
        Ok(None)
    }
}

/// Inlines every file of a mod whose notes carry a tag.
pub struct IncludeTaggedMods {
    ctx: Arc<CompilerContext>,
    mods: HashSet<String>,
}

impl IncludeTaggedMods {
    pub fn new(ctx: Arc<CompilerContext>, tag: &str) -> Self {
        let mods: HashSet<String> = ctx
            .mods
            .tagged(tag)
            .into_iter()
            .map(|m| m.to_ascii_lowercase())
            .collect();
        tracing::debug!("{} mods tagged {}", mods.len(), tag);
        Self { ctx, mods }
    }
}

impl CompilationStep for IncludeTaggedMods {
    fn name(&self) -> &'static str {
        "IncludeTaggedMods"
    }

    fn run(&self, source: &RawSourceFile) -> Result<Option<Directive>> {
        match owning_mod(source) {
            Some(name) if self.mods.contains(&name) => Ok(Some(inline(&self.ctx, source))),
            _ => Ok(None),
        }
    }
}

pub struct IncludeAllConfigs {
    ctx: Arc<CompilerContext>,
}

impl IncludeAllConfigs {
    pub fn new(ctx: Arc<CompilerContext>) -> Self {
        Self { ctx }
    }
}

impl CompilationStep for IncludeAllConfigs {
    fn name(&self) -> &'static str {
        "IncludeAllConfigs"
    }

    fn run(&self, source: &RawSourceFile) -> Result<Option<Directive>> {
        if source.path.extension().is_some_and(|e| is_config_extension(&e)) {
            return Ok(Some(inline(&self.ctx, source)));
        }
        Ok(None)
    }
}

/// Terminal step: inlines anything.
pub struct IncludeAll {
    ctx: Arc<CompilerContext>,
}

impl IncludeAll {
    pub fn new(ctx: Arc<CompilerContext>) -> Self {
        Self { ctx }
    }
}

impl CompilationStep for IncludeAll {
    fn name(&self) -> &'static str {
        "IncludeAll"
    }

    fn run(&self, source: &RawSourceFile) -> Result<Option<Directive>> {
        Ok(Some(inline(&self.ctx, source)))
    }
}
