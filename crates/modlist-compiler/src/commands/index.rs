use crate::println_pad;
use crate::utils::{self, format_size};
use camino::Utf8PathBuf;
use colored::Colorize;
use miette::{IntoDiagnostic, Result};
use mlc_compiler::Compiler;
use mlc_vfs::{ContentHash, ContentIndex, HashCache};

#[derive(Debug)]
pub struct IndexArgs {
    pub settings: Option<String>,
    /// Local files to look up in the index.
    pub lookup: Vec<String>,
}

pub fn index_archives(args: IndexArgs) -> Result<()> {
    let (settings, _) = utils::load_settings(args.settings)?;
    let cache = match &settings.hash_cache {
        Some(path) => HashCache::load(path).into_diagnostic()?,
        None => HashCache::new(),
    };

    let compiler = Compiler::new(settings);
    let index = compiler.build_index(&cache).into_diagnostic()?;
    if let Some(path) = &compiler.settings().hash_cache {
        cache.save(path).into_diagnostic()?;
    }

    print_overview(&index);
    for file in args.lookup {
        print_lookup(&index, Utf8PathBuf::from(file))?;
    }
    Ok(())
}

fn print_overview(index: &ContentIndex) {
    let archives = index.archives();
    let game_files = archives.iter().filter(|a| a.is_game_file()).count();
    let total_size: u64 = archives.iter().map(|a| a.size).sum();
    let deepest = index
        .iter()
        .map(|f| index.hash_path(f.id).depth())
        .max()
        .unwrap_or(0);

    println_pad!("{}", "🗂️  Content index".bright_blue().bold());
    println_pad!(
        "   {} {} downloads, {} game files ({})",
        "•".bright_cyan(),
        archives.len() - game_files,
        game_files,
        format_size(total_size)
    );
    println_pad!(
        "   {} {} indexed files, nested up to {} level(s)",
        "•".bright_cyan(),
        index.len(),
        deepest
    );
}

fn print_lookup(index: &ContentIndex, path: Utf8PathBuf) -> Result<()> {
    let hash = ContentHash::of_file(&path).into_diagnostic()?;
    let found = index.by_hash(&hash);

    println!();
    println_pad!("{} {} {}", "🔎".bright_blue(), path.as_str().bright_white(), hash.to_string().dimmed());
    if found.is_empty() {
        println_pad!("   {}", "not found in any known archive".bright_yellow());
        return Ok(());
    }
    for id in found {
        println_pad!(
            "   {} {} {}",
            "•".bright_cyan(),
            index.archive_of(*id).name.bright_cyan(),
            index.hash_path(*id)
        );
    }
    Ok(())
}
