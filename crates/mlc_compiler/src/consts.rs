//! Folder names, tags and tokens shared by the steps.

/// Inline every file of a mod whose notes carry this tag.
pub const INCLUDE_TAG: &str = "MLC_INCLUDE";
/// Inline the files of a tagged mod that nothing else matched.
pub const NOMATCH_INCLUDE_TAG: &str = "MLC_NOMATCH_INCLUDE";
pub const IGNORE_TAG: &str = "MLC_IGNORE";
/// Never treat a tagged mod as disabled.
pub const ALWAYS_ENABLE_TAG: &str = "MLC_ALWAYS_ENABLE";
/// Marker file that keeps a profile's saves in the mod list.
pub const INCLUDE_SAVES_TAG: &str = "MLC_INCLUDE_SAVES";

pub const MODS_FOLDER: &str = "mods";
pub const PROFILES_FOLDER: &str = "profiles";
pub const DOWNLOADS_FOLDER: &str = "downloads";
pub const SAVES_FOLDER: &str = "saves";
/// Virtual folder that container entries are rooted in.
pub const TEMP_CONTAINER_FILES: &str = "TEMP_CONTAINER_FILES";

pub const MOD_META_FILE: &str = "meta.ini";
pub const MODLIST_FILE: &str = "modlist.txt";
pub const META_EXTENSION: &str = "meta";

/// Extensions of text files that may embed absolute paths.
pub const CONFIG_EXTENSIONS: &[&str] = &["ini", "json", "yml", "yaml", "xml", "toml"];

/// Extensions of game containers the compiler deconstructs.
pub const CONTAINER_EXTENSIONS: &[&str] = &[mlc_archive::pack::PACK_EXTENSION];

/// Replaces the installation root inside stubbed config files.
pub const INSTALL_PATH_MAGIC: &str = "{--||MO2_PATH_MAGIC||--}";
/// Replaces the downloads folder inside stubbed config files.
pub const DOWNLOAD_PATH_MAGIC: &str = "{--||DOWNLOAD_PATH_MAGIC||--}";

/// Name of the manifest entry inside an exported mod-list archive.
pub const MODLIST_ENTRY: &str = "modlist";
pub const MODLIST_EXTENSION: &str = "modlist";

/// Whether `ext` (without dot) is a config extension, case-insensitive.
pub fn is_config_extension(ext: &str) -> bool {
    CONFIG_EXTENSIONS.iter().any(|c| c.eq_ignore_ascii_case(ext))
}
