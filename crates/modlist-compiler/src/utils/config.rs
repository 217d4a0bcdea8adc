//! Application configuration stored next to the executable.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io;

/// Application-wide configuration stored in config.toml.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct AppConfig {
    /// Settings file used when `--settings` is not given.
    pub default_settings: Option<Utf8PathBuf>,
    /// Tracing filter used when `RUST_LOG` is not set.
    pub log_filter: Option<String>,
    /// Folder for daily log files. No file logging when unset.
    pub log_dir: Option<Utf8PathBuf>,
}

/// Returns the directory where the current executable resides.
pub fn install_dir() -> Option<Utf8PathBuf> {
    let exe = env::current_exe().ok()?;
    let parent = exe.parent()?;
    Utf8PathBuf::from_path_buf(parent.to_path_buf()).ok()
}

/// Returns the default configuration file path (config.toml).
pub fn default_config_path() -> Option<Utf8PathBuf> {
    install_dir().map(|dir| dir.join("config.toml"))
}

/// Loads the configuration at `path`. Missing or unparsable files yield the defaults.
pub fn load_config_from(path: &Utf8Path) -> AppConfig {
    match fs::read_to_string(path.as_std_path()) {
        Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
            eprintln!("Ignoring invalid config file {}: {}", path, e);
            AppConfig::default()
        }),
        Err(_) => AppConfig::default(),
    }
}

pub fn save_config_to(path: &Utf8Path, cfg: &AppConfig) -> io::Result<()> {
    let content = toml::to_string_pretty(cfg).map_err(io::Error::other)?;
    fs::write(path.as_std_path(), content)
}

/// Loads the application configuration from config.toml.
pub fn load_config() -> AppConfig {
    default_config_path()
        .map(|path| load_config_from(&path))
        .unwrap_or_default()
}

/// Saves the application configuration to config.toml.
pub fn save_config(cfg: &AppConfig) -> io::Result<()> {
    match default_config_path() {
        Some(path) => save_config_to(&path, cfg),
        None => Err(io::Error::new(
            io::ErrorKind::NotFound,
            "Could not determine config path",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("config.toml")).unwrap();

        assert_eq!(load_config_from(&path), AppConfig::default());

        let cfg = AppConfig {
            default_settings: Some("C:/Modding/compile.toml".into()),
            log_filter: Some("mlc_compiler=debug".into()),
            log_dir: None,
        };
        save_config_to(&path, &cfg).unwrap();
        assert_eq!(load_config_from(&path), cfg);
    }

    #[test]
    fn invalid_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("config.toml")).unwrap();
        fs::write(&path, "default_settings = [").unwrap();
        assert_eq!(load_config_from(&path), AppConfig::default());
    }
}
