use crate::utils::config::AppConfig;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "modlist_compiler=info,mlc_compiler=info,mlc_vfs=warn,mlc_archive=warn";
const VERBOSE_FILTER: &str = "modlist_compiler=debug,mlc_compiler=debug,mlc_vfs=debug,mlc_archive=info";

/// Install the global subscriber. `RUST_LOG` wins over the configured filter.
///
/// Keep the returned guard alive until exit so buffered file logs get flushed.
pub fn init_logging(cfg: &AppConfig, verbose: bool) -> Option<WorkerGuard> {
    let fallback = if verbose {
        VERBOSE_FILTER.to_string()
    } else {
        cfg.log_filter
            .clone()
            .unwrap_or_else(|| DEFAULT_FILTER.to_string())
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| fallback.into());

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file_guard, file_layer) = match &cfg.log_dir {
        Some(log_dir) => {
            let appender = std::fs::create_dir_all(log_dir.as_std_path()).and_then(|_| {
                rolling::RollingFileAppender::builder()
                    .rotation(rolling::Rotation::DAILY)
                    .filename_prefix("modlist-compiler")
                    .filename_suffix("log")
                    .build(log_dir.as_std_path())
                    .map_err(std::io::Error::other)
            });
            match appender {
                Ok(appender) => {
                    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                    let layer = tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false);
                    (Some(guard), Some(layer))
                }
                Err(e) => {
                    eprintln!("Failed to create log directory {}: {}", log_dir, e);
                    (None, None)
                }
            }
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer);
    if let Some(layer) = file_layer {
        registry.with(layer).init();
    } else {
        registry.init();
    }

    file_guard
}
