use crate::utils::config::{self, AppConfig};
use camino::Utf8PathBuf;
use colored::Colorize;
use miette::Result;
use mlc_compiler::CompilerSettings;

fn update_config(update: impl FnOnce(&mut AppConfig)) -> Result<()> {
    let mut cfg = config::load_config();
    update(&mut cfg);
    config::save_config(&cfg).map_err(|e| miette::miette!("Failed to save config: {}", e))
}

/// Print a config entry with status indicator
fn print_entry(name: &str, value: Option<String>, valid: Option<bool>) {
    let label = format!("{}:", name).bright_white();
    match value {
        Some(value) => {
            let status = match valid {
                Some(true) => "✓".bright_green().to_string(),
                Some(false) => "✗".bright_red().to_string(),
                None => String::new(),
            };
            println!("  {} {} {}", label, value, status);
        }
        None => println!("  {} {}", label, "(not set)".bright_yellow()),
    }
}

pub fn show_config() -> Result<()> {
    let cfg = config::load_config();
    let config_path = config::default_config_path()
        .map(|p| p.to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    println!();
    println!("  {} {}", "config_file:".bright_white(), config_path);
    print_entry(
        "default_settings",
        cfg.default_settings.as_ref().map(|p| p.to_string()),
        cfg.default_settings
            .as_ref()
            .map(|p| CompilerSettings::load(p).is_ok()),
    );
    print_entry("log_filter", cfg.log_filter.clone(), None);
    print_entry(
        "log_dir",
        cfg.log_dir.as_ref().map(|p| p.to_string()),
        cfg.log_dir.as_ref().map(|p| p.as_std_path().is_dir()),
    );
    println!();
    Ok(())
}

pub fn set_default_settings(path: String) -> Result<()> {
    let path = Utf8PathBuf::from(path);
    let path = path
        .canonicalize_utf8()
        .map_err(|e| miette::miette!("Cannot resolve {}: {}", path, e))?;
    CompilerSettings::load(&path).map_err(|e| miette::miette!("Invalid settings file: {}", e))?;

    update_config(|cfg| cfg.default_settings = Some(path.clone()))?;
    println!(
        "{}",
        "✓ Default settings file set successfully!".bright_green().bold()
    );
    println!("  {} {}", "Path:".bright_white().bold(), path.as_str().bright_green());
    Ok(())
}

pub fn set_log_filter(filter: String) -> Result<()> {
    tracing_subscriber::EnvFilter::try_new(&filter)
        .map_err(|e| miette::miette!("Invalid log filter '{}': {}", filter, e))?;
    update_config(|cfg| cfg.log_filter = Some(filter.clone()))?;
    println!("{} {}", "✓ Log filter set to".bright_green().bold(), filter);
    Ok(())
}

pub fn set_log_dir(dir: Option<String>) -> Result<()> {
    let dir = dir.map(Utf8PathBuf::from);
    update_config(|cfg| cfg.log_dir = dir.clone())?;
    match dir {
        Some(dir) => println!("{} {}", "✓ Logging to".bright_green().bold(), dir),
        None => println!("{}", "✓ File logging disabled".bright_green().bold()),
    }
    Ok(())
}

pub fn reset_config() -> Result<()> {
    config::save_config(&AppConfig::default())
        .map_err(|e| miette::miette!("Failed to reset config: {}", e))?;
    println!("{}", "✓ Configuration reset to defaults".bright_green().bold());
    Ok(())
}
