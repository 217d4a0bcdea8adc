use clap::builder::{styling::AnsiColor, Styles};
use clap::ColorChoice;
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use commands::{
    compile_modlist, export_stack, index_archives, inspect_modlist, reset_config,
    set_default_settings, set_log_dir, set_log_filter, show_config, show_stack, CompileArgs,
    IndexArgs, InspectArgs,
};
use miette::Result;

mod commands;
mod errors;
mod utils;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Log debug output from every crate
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile an installation into a mod list
    Compile {
        /// The settings file (.toml or .json). Defaults to the configured one
        #[arg(short, long)]
        settings: Option<String>,

        /// Compile this profile instead of the one in the settings file
        #[arg(short, long)]
        profile: Option<String>,

        /// Where to write the mod list
        #[arg(short, long)]
        output: Option<String>,

        /// A JSON stack file replacing the configured steps
        #[arg(long)]
        stack: Option<String>,

        /// Worker threads used to resolve files
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// Skip perceptual texture fingerprinting
        #[arg(long, default_value_t = false)]
        no_texture_matching: bool,

        /// How many unmatched files to list in the summary
        #[arg(long, default_value_t = 25)]
        show_unresolved: usize,
    },
    /// Index downloads and game files without compiling
    Index {
        #[arg(short, long)]
        settings: Option<String>,

        /// Local files to look up in the index
        #[arg(short, long)]
        lookup: Vec<String>,
    },
    /// Show or export step stacks
    Stack {
        #[command(subcommand)]
        command: StackCommands,
    },
    /// Show information about a compiled mod list
    Inspect {
        /// The path to the mod list file
        #[arg(short, long)]
        file_path: String,

        /// Print the whole manifest as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Manage the CLI configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum StackCommands {
    /// Print the steps of a stack file, or of the default stack
    Show {
        #[arg(short, long)]
        file: Option<String>,
    },
    /// Write the stack a settings file would use to a JSON file
    Export {
        #[arg(short, long)]
        settings: Option<String>,

        #[arg(short, long, default_value = "stack.json")]
        output: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the current configuration
    Show,
    /// Use this settings file when --settings is not given
    SetDefaultSettings { path: String },
    /// Tracing filter used when RUST_LOG is not set
    SetLogFilter { filter: String },
    /// Write daily log files to a folder, or stop when no folder is given
    SetLogDir { dir: Option<String> },
    /// Reset the configuration to defaults
    Reset,
}

fn parse_args() -> Args {
    // Configure colored/styled help output
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default())
        .placeholder(AnsiColor::Blue.on_default());

    let matches = Args::command()
        .styles(styles)
        .color(ColorChoice::Auto)
        .get_matches();

    Args::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
}

fn main() -> Result<()> {
    let args = parse_args();
    let _log_guard = utils::logging::init_logging(&utils::config::load_config(), args.verbose);

    match args.command {
        Commands::Compile {
            settings,
            profile,
            output,
            stack,
            threads,
            no_texture_matching,
            show_unresolved,
        } => compile_modlist(CompileArgs {
            settings,
            profile,
            output,
            stack,
            threads,
            no_texture_matching,
            show_unresolved,
        }),
        Commands::Index { settings, lookup } => index_archives(IndexArgs { settings, lookup }),
        Commands::Stack { command } => match command {
            StackCommands::Show { file } => show_stack(file),
            StackCommands::Export { settings, output } => export_stack(settings, output),
        },
        Commands::Inspect { file_path, json } => inspect_modlist(InspectArgs { file_path, json }),
        Commands::Config { command } => match command {
            ConfigCommands::Show => show_config(),
            ConfigCommands::SetDefaultSettings { path } => set_default_settings(path),
            ConfigCommands::SetLogFilter { filter } => set_log_filter(filter),
            ConfigCommands::SetLogDir { dir } => set_log_dir(dir),
            ConfigCommands::Reset => reset_config(),
        },
    }
}
