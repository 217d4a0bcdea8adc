use camino::Utf8PathBuf;
use miette::Diagnostic;
use mlc_compiler::CompilerError;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    #[error("No settings file given")]
    #[diagnostic(
        code(settings::not_given),
        help("Pass --settings <file> or run 'modlist-compiler config set-default-settings <file>'")
    )]
    SettingsNotGiven,

    #[error("Settings file not found: {path}")]
    #[diagnostic(
        code(settings::not_found),
        help("Make sure the file exists. Settings files must end in .toml or .json")
    )]
    SettingsNotFound { path: Utf8PathBuf },

    #[error("Invalid settings file: {path}")]
    #[diagnostic(
        code(settings::invalid),
        help("Check the file for syntax errors and missing 'source' or 'profile' values")
    )]
    InvalidSettings {
        path: Utf8PathBuf,
        #[source]
        source: CompilerError,
    },

    #[error("Compilation failed")]
    #[diagnostic(
        code(compile::failed),
        help("Run with RUST_LOG=debug for a detailed log of every resolved file")
    )]
    CompilationFailed {
        #[source]
        source: CompilerError,
    },

    #[error("{count} critical file(s) could not be resolved")]
    #[diagnostic(
        code(compile::critical_unresolved),
        help("Add the downloads these files came from, or remove them from 'criticalPaths':\n{paths}")
    )]
    CriticalFilesUnresolved { count: usize, paths: String },

    #[error("Cannot read mod list: {path}")]
    #[diagnostic(
        code(modlist::unreadable),
        help("The file must be a mod list written by this version of the compiler")
    )]
    ModListUnreadable {
        path: Utf8PathBuf,
        #[source]
        source: CompilerError,
    },

    #[error("Stack file error: {path}")]
    #[diagnostic(
        code(stack::invalid),
        help("A stack file is a JSON array of steps, e.g. [{{\"step\": \"DirectMatch\"}}]")
    )]
    InvalidStack {
        path: Utf8PathBuf,
        #[source]
        source: CompilerError,
    },
}

impl CliError {
    pub fn invalid_settings(path: Utf8PathBuf, source: CompilerError) -> Self {
        Self::InvalidSettings { path, source }
    }

    /// Unwraps the critical-file failure into its own diagnostic.
    pub fn compilation_failed(source: CompilerError) -> Self {
        match source {
            CompilerError::CriticalFilesUnresolved { paths } => Self::CriticalFilesUnresolved {
                count: paths.len(),
                paths: paths
                    .iter()
                    .map(|p| format!("  - {}", p))
                    .collect::<Vec<_>>()
                    .join("\n"),
            },
            source => Self::CompilationFailed { source },
        }
    }

    pub fn modlist_unreadable(path: Utf8PathBuf, source: CompilerError) -> Self {
        Self::ModListUnreadable { path, source }
    }

    pub fn invalid_stack(path: Utf8PathBuf, source: CompilerError) -> Self {
        Self::InvalidStack { path, source }
    }
}
