use crate::errors::CliError;
use crate::println_pad;
use crate::utils;
use camino::Utf8PathBuf;
use colored::Colorize;
use miette::{IntoDiagnostic, Result};
use mlc_compiler::{load_stack, save_stack, CompilerSettings, StepConfig};

/// Write the stack a compilation would use to `output`.
pub fn export_stack(settings: Option<String>, output: String) -> Result<()> {
    let settings = match settings {
        Some(path) => utils::load_settings(Some(path))?.0,
        None => CompilerSettings::default(),
    };
    let stack = settings.effective_stack();
    let output = Utf8PathBuf::from(output);
    save_stack(&output, &stack).into_diagnostic()?;

    println!(
        "{} {} {}",
        "✓ Wrote".bright_green().bold(),
        stack.len(),
        format!("steps to {}", output).bright_green()
    );
    Ok(())
}

/// Print a stack file, or the default stack when no file is given.
pub fn show_stack(file: Option<String>) -> Result<()> {
    let stack = match file {
        Some(file) => {
            let path = Utf8PathBuf::from(file);
            load_stack(&path).map_err(|e| CliError::invalid_stack(path.clone(), e))?
        }
        None => CompilerSettings::default().effective_stack(),
    };

    println_pad!("{}", "🧱 Steps (first match wins):".bright_magenta().bold());
    for (index, step) in stack.iter().enumerate() {
        println_pad!(
            "   {} {}",
            format!("{:>2}.", index + 1).dimmed(),
            describe(step)
        );
    }
    Ok(())
}

/// The step name followed by its parameters, if any.
fn describe(step: &StepConfig) -> String {
    let Ok(serde_json::Value::Object(mut fields)) = serde_json::to_value(step) else {
        return format!("{:?}", step);
    };
    let name = fields
        .remove("step")
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    if fields.is_empty() {
        return name.bright_cyan().to_string();
    }
    let params = fields
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(" ");
    format!("{} {}", name.bright_cyan(), params)
}
