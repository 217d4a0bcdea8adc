use crate::errors::CliError;
use crate::println_pad;
use crate::utils::format_size;
use camino::Utf8PathBuf;
use colored::Colorize;
use miette::{IntoDiagnostic, Result};
use mlc_compiler::ModList;
use mlc_vfs::ArchiveSource;

pub struct InspectArgs {
    pub file_path: String,
    /// Print the full manifest as JSON instead of a summary.
    pub json: bool,
}

pub fn inspect_modlist(args: InspectArgs) -> Result<()> {
    let path = Utf8PathBuf::from(args.file_path);
    let modlist =
        ModList::load_from_archive(&path).map_err(|e| CliError::modlist_unreadable(path.clone(), e))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&modlist).into_diagnostic()?);
        return Ok(());
    }

    println_pad!(
        "{} {} {}",
        "📜 Mod list:".bright_blue().bold(),
        modlist.name.bright_cyan().bold(),
        modlist.modlist_version.bright_white()
    );
    println_pad!("{} {}", "🎮 Game:".bright_green(), modlist.game.bright_white());
    if !modlist.author.is_empty() {
        println_pad!("{} {}", "👤 Author:".bright_yellow(), modlist.author.bright_white());
    }
    if !modlist.description.is_empty() {
        println_pad!("{} {}", "📝 Description:".bright_yellow(), modlist.description.bright_white());
    }

    println_pad!("\n{}", "🧾 Directives:".bright_magenta().bold());
    for (kind, count) in modlist.count_by_type() {
        println_pad!("   {} {:<20} {}", "•".bright_cyan(), kind, count);
    }

    println_pad!("\n{}", "📦 Archives:".bright_magenta().bold());
    for archive in &modlist.archives {
        let origin = match &archive.state {
            ArchiveSource::Download { primary_key, .. } => primary_key.clone(),
            ArchiveSource::GameFile { game } => format!("game file ({})", game),
        };
        println_pad!(
            "   {} {} {} {}",
            "•".bright_cyan(),
            archive.name.bright_cyan(),
            format!("({})", format_size(archive.size)).dimmed(),
            origin.dimmed()
        );
    }
    Ok(())
}
