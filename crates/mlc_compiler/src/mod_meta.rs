//! Per-mod metadata and enabled-mod state.
//!
//! Every mod folder carries a `meta.ini` written by the mod manager. The
//! compiler reads a handful of values from its `[General]` section:
//!
//! - `installationFile`: the download the mod was installed from
//! - `matchAll`: an archive that any file of the mod may be matched against
//! - `notes` and `comments`: free text where users put compiler tags
//!
//! Each `meta.ini` is parsed once into a [`ModMeta`]. The [`ModRegistry`] holds
//! them together with the set of mods enabled in the compiled profiles.

use crate::consts::{ALWAYS_ENABLE_TAG, MODLIST_FILE, MODS_FOLDER, MOD_META_FILE, PROFILES_FOLDER};
use crate::error::Result;
use camino::Utf8Path;
use ini::Ini;
use std::collections::{BTreeMap, HashSet};

/// Typed view of a mod's `meta.ini`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModMeta {
    pub name: String,
    pub installation_file: Option<String>,
    pub match_all: Option<String>,
    pub notes: Option<String>,
    pub comments: Option<String>,
}

impl ModMeta {
    pub fn parse(name: impl Into<String>, text: &str) -> Result<Self> {
        let ini = Ini::load_from_str_noescape(text)?;
        let general = ini.section(Some("General"));
        let value = |key: &str| {
            general
                .and_then(|s| s.get(key))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Ok(Self {
            name: name.into(),
            installation_file: value("installationFile").map(|f| file_name_of(&f).to_string()),
            match_all: value("matchAll"),
            notes: value("notes"),
            comments: value("comments"),
        })
    }

    /// Whether `tag` appears in the notes or comments.
    pub fn has_tag(&self, tag: &str) -> bool {
        [&self.notes, &self.comments]
            .into_iter()
            .flatten()
            .any(|text| text.contains(tag))
    }
}

fn file_name_of(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// All mods of an installation and which of them are enabled.
#[derive(Debug, Clone, Default)]
pub struct ModRegistry {
    /// Keyed by lowercased mod name.
    mods: BTreeMap<String, ModMeta>,
    /// Lowercased names of mods enabled in any compiled profile.
    enabled: HashSet<String>,
}

impl ModRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `mods/*/meta.ini` and the `modlist.txt` of each profile under `source`.
    ///
    /// Mods without a `meta.ini` are registered with empty metadata. A
    /// `meta.ini` that fails to parse is logged and treated the same way.
    pub fn load(source: &Utf8Path, profiles: &[&str]) -> Result<Self> {
        let mut registry = Self::new();

        let mods_dir = source.join(MODS_FOLDER);
        if mods_dir.as_std_path().is_dir() {
            for entry in std::fs::read_dir(mods_dir.as_std_path())? {
                let entry = entry?;
                if !entry.file_type()?.is_dir() {
                    continue;
                }
                let Ok(name) = entry.file_name().into_string() else {
                    tracing::warn!("Skipping mod folder with non-UTF-8 name");
                    continue;
                };

                let meta_path = mods_dir.join(&name).join(MOD_META_FILE);
                let meta = match std::fs::read_to_string(meta_path.as_std_path()) {
                    Ok(text) => ModMeta::parse(&name, &text).unwrap_or_else(|e| {
                        tracing::warn!("Invalid {}: {}", meta_path, e);
                        ModMeta::named(&name)
                    }),
                    Err(_) => ModMeta::named(&name),
                };
                registry.insert(meta);
            }
        }

        for profile in profiles {
            let modlist = source.join(PROFILES_FOLDER).join(profile).join(MODLIST_FILE);
            match std::fs::read_to_string(modlist.as_std_path()) {
                Ok(text) => registry.enable_from_modlist(&text),
                Err(e) => tracing::warn!("Cannot read {}: {}", modlist, e),
            }
        }

        tracing::info!(
            "Loaded {} mods ({} enabled) for profiles {:?}",
            registry.mods.len(),
            registry.enabled.len(),
            profiles
        );
        Ok(registry)
    }

    pub fn insert(&mut self, meta: ModMeta) {
        self.mods.insert(meta.name.to_ascii_lowercase(), meta);
    }

    /// Mark the mods listed as enabled (`+Name`) in a `modlist.txt`. Separators
    /// count as enabled too.
    pub fn enable_from_modlist(&mut self, text: &str) {
        for line in text.lines().map(str::trim) {
            if let Some(name) = line.strip_prefix('+') {
                self.enable(name);
            } else if line.ends_with("_separator") {
                if let Some(name) = line.strip_prefix(['-', '*']) {
                    self.enable(name);
                }
            }
        }
    }

    pub fn enable(&mut self, name: &str) {
        self.enabled.insert(name.to_ascii_lowercase());
    }

    pub fn get(&self, name: &str) -> Option<&ModMeta> {
        self.mods.get(&name.to_ascii_lowercase())
    }

    /// Whether `name` is enabled, or tagged to be treated as always enabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.contains(&name.to_ascii_lowercase())
            || self.get(name).is_some_and(|m| m.has_tag(ALWAYS_ENABLE_TAG))
    }

    pub fn has_tag(&self, name: &str, tag: &str) -> bool {
        self.get(name).is_some_and(|m| m.has_tag(tag))
    }

    /// Names of mods carrying `tag`.
    pub fn tagged(&self, tag: &str) -> Vec<&str> {
        self.mods
            .values()
            .filter(|m| m.has_tag(tag))
            .map(|m| m.name.as_str())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModMeta> {
        self.mods.values()
    }

    pub fn len(&self) -> usize {
        self.mods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }
}

impl ModMeta {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    const META: &str = "[General]\n\
        gameName=skyrimse\n\
        installationFile=C:/Modding/downloads/SkyUI_5_2_SE-12604-5-2SE.7z\n\
        notes=\"Keep this one. MLC_INCLUDE\"\n\
        comments=\n";

    #[test]
    fn test_parse_meta() {
        let meta = ModMeta::parse("SkyUI", META).unwrap();
        assert_eq!(
            meta.installation_file.as_deref(),
            Some("SkyUI_5_2_SE-12604-5-2SE.7z")
        );
        assert!(meta.has_tag("MLC_INCLUDE"));
        assert!(!meta.has_tag("MLC_IGNORE"));
        assert_eq!(meta.comments, None);
    }

    #[test]
    fn test_windows_installation_path() {
        let meta = ModMeta::parse(
            "Tweaks",
            "[General]\ninstallationFile=C:\\Modding\\downloads\\Tweaks 1.2.zip\n",
        )
        .unwrap();
        assert_eq!(meta.installation_file.as_deref(), Some("Tweaks 1.2.zip"));
    }

    #[test]
    fn test_modlist_enables_plus_lines_and_separators() {
        let mut registry = ModRegistry::new();
        registry.enable_from_modlist("# header\n+SkyUI\n-Disabled\n-Graphics_separator\n*Unmanaged\n");
        assert!(registry.is_enabled("skyui"));
        assert!(registry.is_enabled("Graphics_separator"));
        assert!(!registry.is_enabled("Disabled"));
        assert!(!registry.is_enabled("Unmanaged"));
    }

    #[test]
    fn test_always_enable_tag() {
        let mut registry = ModRegistry::new();
        registry.insert(ModMeta {
            name: "Tools".into(),
            notes: Some(ALWAYS_ENABLE_TAG.into()),
            ..Default::default()
        });
        assert!(registry.is_enabled("Tools"));
        assert_eq!(registry.tagged(ALWAYS_ENABLE_TAG), vec!["Tools"]);
    }

    #[test]
    fn test_load_from_installation() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        std::fs::create_dir_all(root.join("mods/SkyUI")).unwrap();
        std::fs::create_dir_all(root.join("mods/NoMeta")).unwrap();
        std::fs::create_dir_all(root.join("profiles/Default")).unwrap();
        std::fs::write(root.join("mods/SkyUI/meta.ini"), META).unwrap();
        std::fs::write(root.join("profiles/Default/modlist.txt"), "+SkyUI\n-NoMeta\n").unwrap();

        let registry = ModRegistry::load(&root, &["Default"]).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.is_enabled("SkyUI"));
        assert!(!registry.is_enabled("NoMeta"));
        assert!(registry.get("nometa").unwrap().installation_file.is_none());
    }
}
