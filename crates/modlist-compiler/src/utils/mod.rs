use crate::errors::CliError;
use camino::Utf8PathBuf;
use miette::Result;
use mlc_compiler::CompilerSettings;

pub mod config;
pub mod logging;

#[macro_export]
macro_rules! println_pad {
    ($($arg:tt)*) => {{
        let __s = format!($($arg)*);
        for __line in __s.lines() {
            println!("    {}", __line);
        }
    }};
}

/// The settings file to use: `explicit` if given, else the configured default.
pub fn resolve_settings_path(explicit: Option<String>) -> Result<Utf8PathBuf> {
    let path = match explicit {
        Some(path) => Utf8PathBuf::from(path),
        None => config::load_config()
            .default_settings
            .ok_or(CliError::SettingsNotGiven)?,
    };
    if !path.as_std_path().is_file() {
        return Err(CliError::SettingsNotFound { path }.into());
    }
    Ok(path)
}

pub fn load_settings(explicit: Option<String>) -> Result<(CompilerSettings, Utf8PathBuf)> {
    let path = resolve_settings_path(explicit)?;
    let settings = CompilerSettings::load(&path)
        .map_err(|e| CliError::invalid_settings(path.clone(), e))?;
    Ok((settings, path))
}

/// Human readable byte count.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}
