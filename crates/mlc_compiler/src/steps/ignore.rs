//! Rules that exclude files, plus the terminal [`DropAll`].

use super::{directive_for, ignored, owning_mod};
use crate::consts::{INCLUDE_SAVES_TAG, PROFILES_FOLDER, SAVES_FOLDER};
use crate::context::CompilerContext;
use crate::directive::{Directive, DirectiveKind};
use crate::error::Result;
use crate::source::RawSourceFile;
use crate::stack::{CompilationStep, NO_MATCH_REASON};
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;

/// Ignores files inside a folder.
pub struct IgnoreInPath {
    prefix: String,
    reason: String,
}

impl IgnoreInPath {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into().replace('\\', "/").trim_matches('/').to_string();
        let reason = format!("Ignored because path starts with {}", prefix);
        Self { prefix, reason }
    }
}

impl CompilationStep for IgnoreInPath {
    fn name(&self) -> &'static str {
        "IgnoreInPath"
    }

    fn run(&self, source: &RawSourceFile) -> Result<Option<Directive>> {
        if source.path.in_folder(&self.prefix) {
            return Ok(Some(ignored(source, &self.reason)));
        }
        Ok(None)
    }
}

pub struct IgnorePathContains {
    fragment: String,
    reason: String,
}

impl IgnorePathContains {
    pub fn new(fragment: impl Into<String>) -> Self {
        let fragment = fragment.into();
        let reason = format!("Ignored because path contains {}", fragment);
        Self { fragment, reason }
    }
}

impl CompilationStep for IgnorePathContains {
    fn name(&self) -> &'static str {
        "IgnorePathContains"
    }

    fn run(&self, source: &RawSourceFile) -> Result<Option<Directive>> {
        if source.path.contains_ignore_case(&self.fragment) {
            return Ok(Some(ignored(source, &self.reason)));
        }
        Ok(None)
    }
}

pub struct IgnoreExtension {
    extension: String,
    reason: String,
}

impl IgnoreExtension {
    pub fn new(extension: impl Into<String>) -> Self {
        let extension = extension.into().trim_start_matches('.').to_ascii_lowercase();
        let reason = format!("Ignored because path ends with .{}", extension);
        Self { extension, reason }
    }
}

impl CompilationStep for IgnoreExtension {
    fn name(&self) -> &'static str {
        "IgnoreExtension"
    }

    fn run(&self, source: &RawSourceFile) -> Result<Option<Directive>> {
        if source.path.has_extension(&self.extension) {
            return Ok(Some(ignored(source, &self.reason)));
        }
        Ok(None)
    }
}

pub struct IgnoreFilename {
    file_name: String,
    reason: String,
}

impl IgnoreFilename {
    pub fn new(file_name: impl Into<String>) -> Self {
        let file_name = file_name.into();
        let reason = format!("Ignored because filename is {}", file_name);
        Self { file_name, reason }
    }
}

impl CompilationStep for IgnoreFilename {
    fn name(&self) -> &'static str {
        "IgnoreFilename"
    }

    fn run(&self, source: &RawSourceFile) -> Result<Option<Directive>> {
        if source.path.file_name().eq_ignore_ascii_case(&self.file_name) {
            return Ok(Some(ignored(source, &self.reason)));
        }
        Ok(None)
    }
}

pub struct IgnoreRegex {
    regex: Regex,
    reason: String,
}

impl IgnoreRegex {
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            reason: format!("Ignored because path matches regex {}", pattern),
        })
    }
}

impl CompilationStep for IgnoreRegex {
    fn name(&self) -> &'static str {
        "IgnoreRegex"
    }

    fn run(&self, source: &RawSourceFile) -> Result<Option<Directive>> {
        if self.regex.is_match(source.path.as_str()) {
            return Ok(Some(ignored(source, &self.reason)));
        }
        Ok(None)
    }
}

/// Ignores files under any of the user-listed folders.
pub struct IgnoreTaggedFiles {
    folders: Vec<String>,
}

impl IgnoreTaggedFiles {
    pub fn new(folders: Vec<String>) -> Self {
        Self { folders }
    }
}

impl CompilationStep for IgnoreTaggedFiles {
    fn name(&self) -> &'static str {
        "IgnoreTaggedFiles"
    }

    fn run(&self, source: &RawSourceFile) -> Result<Option<Directive>> {
        match self.folders.iter().find(|f| source.path.in_folder(f)) {
            Some(folder) => Ok(Some(ignored(source, format!("Ignored because {} is tagged", folder)))),
            None => Ok(None),
        }
    }
}

/// Ignores every file of a mod whose notes carry a tag.
pub struct IgnoreTaggedMods {
    tag: String,
    mods: HashSet<String>,
}

impl IgnoreTaggedMods {
    pub fn new(ctx: &CompilerContext, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        let mods = ctx
            .mods
            .tagged(&tag)
            .into_iter()
            .map(|m| m.to_ascii_lowercase())
            .collect();
        Self { tag, mods }
    }
}

impl CompilationStep for IgnoreTaggedMods {
    fn name(&self) -> &'static str {
        "IgnoreTaggedMods"
    }

    fn run(&self, source: &RawSourceFile) -> Result<Option<Directive>> {
        match owning_mod(source) {
            Some(name) if self.mods.contains(&name) => Ok(Some(ignored(
                source,
                format!("Ignored because mod is tagged {}", self.tag),
            ))),
            _ => Ok(None),
        }
    }
}

/// Ignores `profiles/*/saves/**` unless the profile holds the include-saves marker.
pub struct IgnoreSaveFiles {
    /// Lowercased names of profiles whose saves are kept.
    kept: HashSet<String>,
}

impl IgnoreSaveFiles {
    pub fn new(ctx: &CompilerContext) -> Self {
        let profiles = ctx.settings.source.join(PROFILES_FOLDER);
        let mut kept = HashSet::new();
        if let Ok(entries) = std::fs::read_dir(profiles.as_std_path()) {
            for entry in entries.flatten() {
                if entry.path().join(INCLUDE_SAVES_TAG).is_file() {
                    if let Ok(name) = entry.file_name().into_string() {
                        tracing::debug!("Keeping saves of profile {}", name);
                        kept.insert(name.to_ascii_lowercase());
                    }
                }
            }
        }
        Self { kept }
    }
}

impl CompilationStep for IgnoreSaveFiles {
    fn name(&self) -> &'static str {
        "IgnoreSaveFiles"
    }

    fn run(&self, source: &RawSourceFile) -> Result<Option<Directive>> {
        let Some(profile) = source.path.profile_name() else {
            return Ok(None);
        };
        let saves = format!("{}/{}/{}", PROFILES_FOLDER, profile, SAVES_FOLDER);
        if source.path.in_folder(&saves) && !self.kept.contains(&profile.to_ascii_lowercase()) {
            return Ok(Some(ignored(source, "Ignore save file")));
        }
        Ok(None)
    }
}

/// Ignores files of profiles that are not being compiled.
pub struct IgnoreOtherProfiles {
    selected: HashSet<String>,
}

impl IgnoreOtherProfiles {
    pub fn new(ctx: &CompilerContext) -> Self {
        Self {
            selected: ctx
                .settings
                .selected_profiles()
                .into_iter()
                .map(|p| p.to_ascii_lowercase())
                .collect(),
        }
    }
}

impl CompilationStep for IgnoreOtherProfiles {
    fn name(&self) -> &'static str {
        "IgnoreOtherProfiles"
    }

    fn run(&self, source: &RawSourceFile) -> Result<Option<Directive>> {
        match source.path.profile_name() {
            Some(profile) if !self.selected.contains(&profile.to_ascii_lowercase()) => {
                Ok(Some(ignored(source, "File not for selected profiles")))
            }
            _ => Ok(None),
        }
    }
}

/// Ignores files of mods disabled in every compiled profile.
pub struct IgnoreDisabledMods {
    ctx: Arc<CompilerContext>,
    always_enabled: HashSet<String>,
}

impl IgnoreDisabledMods {
    pub fn new(ctx: Arc<CompilerContext>) -> Self {
        let always_enabled = ctx
            .settings
            .always_enabled
            .iter()
            .map(|m| m.to_ascii_lowercase())
            .collect();
        Self { ctx, always_enabled }
    }
}

impl CompilationStep for IgnoreDisabledMods {
    fn name(&self) -> &'static str {
        "IgnoreDisabledMods"
    }

    fn run(&self, source: &RawSourceFile) -> Result<Option<Directive>> {
        let Some(name) = source.path.mod_name() else {
            return Ok(None);
        };
        if self.always_enabled.contains(&name.to_ascii_lowercase()) || self.ctx.mods.is_enabled(name) {
            return Ok(None);
        }
        Ok(Some(ignored(source, "Disabled Mod")))
    }
}

/// Terminal step: marks the record unresolved.
#[derive(Debug, Default)]
pub struct DropAll;

impl CompilationStep for DropAll {
    fn name(&self) -> &'static str {
        "DropAll"
    }

    fn run(&self, source: &RawSourceFile) -> Result<Option<Directive>> {
        Ok(Some(directive_for(
            source,
            DirectiveKind::NoMatch {
                reason: NO_MATCH_REASON.to_string(),
            },
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mod_meta::{ModMeta, ModRegistry};
    use crate::steps::test_support::{record, settings, temp_root};
    use mlc_vfs::ContentIndex;

    fn reason_of(step: &dyn CompilationStep, source: &RawSourceFile) -> Option<String> {
        step.run(source)
            .unwrap()
            .and_then(|d| d.reason().map(str::to_string))
    }

    #[test]
    fn test_path_rules() {
        let (_guard, root) = temp_root();
        let log = record(&root, "logs/mo_interface.log", b"log");
        let cache = record(&root, "mods/A/SSEEdit Cache/x.bin", b"x");
        let plain = record(&root, "mods/A/plugin.esp", b"esp");

        assert_eq!(
            reason_of(&IgnoreInPath::new("logs"), &log).as_deref(),
            Some("Ignored because path starts with logs")
        );
        assert!(reason_of(&IgnoreInPath::new("logs"), &plain).is_none());
        assert!(reason_of(&IgnorePathContains::new("sseedit cache"), &cache).is_some());
        assert!(reason_of(&IgnoreExtension::new(".LOG"), &log).is_some());
        assert!(reason_of(&IgnoreFilename::new("PLUGIN.ESP"), &plain).is_some());
        assert!(reason_of(&IgnoreRegex::new(r"\.esp$").unwrap(), &plain).is_some());
        assert!(reason_of(&IgnoreTaggedFiles::new(vec!["mods/A".into()]), &plain).is_some());
    }

    #[test]
    fn test_saves_are_ignored_without_marker() {
        let (_guard, root) = temp_root();
        let save = record(&root, "profiles/Default/saves/quick.ess", b"s");
        let kept = record(&root, "profiles/Keep/saves/quick.ess", b"s");
        record(&root, &format!("profiles/Keep/{}", INCLUDE_SAVES_TAG), b"");
        let ctx = CompilerContext::new(settings(&root), Default::default(), ModRegistry::new());

        let step = IgnoreSaveFiles::new(&ctx);
        assert_eq!(reason_of(&step, &save).as_deref(), Some("Ignore save file"));
        assert!(reason_of(&step, &kept).is_none());
    }

    #[test]
    fn test_other_profiles_are_ignored() {
        let (_guard, root) = temp_root();
        let mut settings = settings(&root);
        settings.additional_profiles = vec!["Extra".into()];
        let ctx = CompilerContext::new(settings, Default::default(), ModRegistry::new());
        let step = IgnoreOtherProfiles::new(&ctx);

        assert!(reason_of(&step, &record(&root, "profiles/Other/plugins.txt", b"p")).is_some());
        assert!(reason_of(&step, &record(&root, "profiles/default/plugins.txt", b"p")).is_none());
        assert!(reason_of(&step, &record(&root, "profiles/Extra/plugins.txt", b"p")).is_none());
    }

    #[test]
    fn test_disabled_mods() {
        let (_guard, root) = temp_root();
        let mut mods = ModRegistry::new();
        mods.enable_from_modlist("+Enabled\n-Disabled\n-Pinned\n-Tagged\n");
        mods.insert(ModMeta {
            name: "Tagged".into(),
            notes: Some(crate::consts::ALWAYS_ENABLE_TAG.into()),
            ..Default::default()
        });
        let mut settings = settings(&root);
        settings.always_enabled = vec!["pinned".into()];
        let ctx = Arc::new(CompilerContext::new(
            settings,
            Arc::new(ContentIndex::default()),
            mods,
        ));
        let step = IgnoreDisabledMods::new(ctx);

        for (path, ignored) in [
            ("mods/Enabled/a.esp", false),
            ("mods/Disabled/a.esp", true),
            ("mods/Pinned/a.esp", false),
            ("mods/Tagged/a.esp", false),
            ("ModOrganizer.ini", false),
        ] {
            let source = record(&root, path, b"x");
            assert_eq!(reason_of(&step, &source).is_some(), ignored, "{}", path);
        }
    }

    #[test]
    fn test_tagged_mods_are_ignored() {
        let (_guard, root) = temp_root();
        let mut mods = ModRegistry::new();
        mods.insert(ModMeta {
            name: "Junk".into(),
            comments: Some("MLC_IGNORE please".into()),
            ..Default::default()
        });
        let ctx = CompilerContext::new(settings(&root), Default::default(), mods);
        let step = IgnoreTaggedMods::new(&ctx, crate::consts::IGNORE_TAG);

        assert!(reason_of(&step, &record(&root, "mods/Junk/a.txt", b"a")).is_some());
        assert!(reason_of(&step, &record(&root, "mods/Other/a.txt", b"a")).is_none());
    }

    #[test]
    fn test_drop_all_marks_unresolved() {
        let (_guard, root) = temp_root();
        let directive = DropAll.run(&record(&root, "a.txt", b"a")).unwrap().unwrap();
        assert!(directive.is_no_match());
        assert_eq!(directive.reason(), Some(NO_MATCH_REASON));
    }
}
