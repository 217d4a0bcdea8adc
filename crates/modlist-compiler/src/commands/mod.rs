mod compile;
mod config;
mod index;
mod inspect;
mod stack;

pub use compile::{compile_modlist, CompileArgs};
pub use config::{reset_config, set_default_settings, set_log_dir, set_log_filter, show_config};
pub use index::{index_archives, IndexArgs};
pub use inspect::{inspect_modlist, InspectArgs};
pub use stack::{export_stack, show_stack};
