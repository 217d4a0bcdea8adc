use crate::errors::CliError;
use crate::println_pad;
use crate::utils::{self, format_size};
use camino::Utf8PathBuf;
use colored::Colorize;
use miette::Result;
use mlc_compiler::{load_stack, CompileProgress, CompileResult, Compiler, CompilerStage};
use std::sync::Mutex;

#[derive(Debug)]
pub struct CompileArgs {
    pub settings: Option<String>,
    pub profile: Option<String>,
    pub output: Option<String>,
    pub stack: Option<String>,
    pub threads: Option<usize>,
    pub no_texture_matching: bool,
    /// How many unresolved files to list.
    pub show_unresolved: usize,
}

pub fn compile_modlist(args: CompileArgs) -> Result<()> {
    let (mut settings, settings_path) = utils::load_settings(args.settings)?;

    if let Some(profile) = args.profile {
        settings.profile = profile;
    }
    if let Some(output) = args.output {
        settings.output = Some(Utf8PathBuf::from(output));
    }
    if let Some(threads) = args.threads {
        settings.max_parallelism = Some(threads);
    }
    if let Some(stack) = args.stack {
        let path = Utf8PathBuf::from(stack);
        let steps = load_stack(&path).map_err(|e| CliError::invalid_stack(path.clone(), e))?;
        settings.stack = Some(steps);
    }

    println!(
        "{} {} {}",
        "⚙️  Compiling".bright_blue().bold(),
        settings.source.as_str().bright_cyan(),
        format!("(profile {}, settings {})", settings.profile, settings_path).dimmed()
    );

    let mut compiler = Compiler::new(settings).with_progress(progress_printer());
    if args.no_texture_matching {
        compiler = compiler.with_perceptual_hasher(None);
    }

    let result = compiler.compile().map_err(CliError::compilation_failed)?;
    print_summary(&result, args.show_unresolved);
    Ok(())
}

/// Prints a line whenever the stage changes, and every tenth of the resolving stage.
fn progress_printer() -> impl Fn(CompileProgress) + Send + Sync + 'static {
    let last = Mutex::new((None::<CompilerStage>, 0u32));
    move |progress: CompileProgress| {
        let Ok(mut last) = last.lock() else {
            return;
        };
        if last.0 != Some(progress.stage) {
            *last = (Some(progress.stage), 0);
            println_pad!("{} {}", "›".bright_cyan(), stage_label(progress.stage));
            return;
        }
        if progress.stage == CompilerStage::Resolving && progress.total > 0 {
            let decile = progress.current * 10 / progress.total;
            if decile > last.1 {
                last.1 = decile;
                println_pad!(
                    "  {} {}/{}",
                    format!("{:>3}%", decile * 10).bright_white(),
                    progress.current,
                    progress.total
                );
            }
        }
    }
}

fn stage_label(stage: CompilerStage) -> &'static str {
    match stage {
        CompilerStage::DiscoveringArchives => "Discovering downloads and game files",
        CompilerStage::Indexing => "Indexing archive contents",
        CompilerStage::ScanningSource => "Hashing installation",
        CompilerStage::Resolving => "Resolving files",
        CompilerStage::GatheringArchives => "Gathering required archives",
        CompilerStage::Writing => "Writing mod list",
        CompilerStage::Complete => "Done",
    }
}

fn print_summary(result: &CompileResult, show_unresolved: usize) {
    let modlist = &result.modlist;
    let download_size: u64 = modlist.archives.iter().map(|a| a.size).sum();

    println!();
    println!(
        "{} {}",
        "✓ Mod list written to".bright_green().bold(),
        result.output.as_str().bright_white()
    );
    println_pad!(
        "{} {} directives, {} archives ({}), {} ignored, {:.1?}",
        "📦".bright_blue(),
        modlist.directives.len(),
        modlist.archives.len(),
        format_size(download_size),
        result.ignored,
        result.build_time
    );
    for (kind, count) in modlist.count_by_type() {
        println_pad!("   {} {:<20} {}", "•".bright_cyan(), kind, count);
    }

    if !result.failures.is_empty() {
        println!();
        println_pad!(
            "{}",
            format!("⚠ {} file(s) failed to resolve:", result.failures.len())
                .bright_red()
                .bold()
        );
        for failure in &result.failures {
            println_pad!("   {} {}: {}", "•".bright_red(), failure.path, failure.error);
        }
    }

    if !result.unresolved.is_empty() {
        println!();
        println_pad!(
            "{}",
            format!("⚠ {} file(s) have no match:", result.unresolved.len())
                .bright_yellow()
                .bold()
        );
        for directive in result.unresolved.iter().take(show_unresolved) {
            println_pad!("   {} {}", "•".bright_yellow(), directive.to);
        }
        if result.unresolved.len() > show_unresolved {
            println_pad!(
                "   {}",
                format!("… and {} more", result.unresolved.len() - show_unresolved).dimmed()
            );
        }
    }
}
