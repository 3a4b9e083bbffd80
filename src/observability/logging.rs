use std::fs;
use std::path::Path;
use tracing::warn;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const DEFAULT_LOG_DIR: &str = "logs";
const LOG_FILE_PREFIX: &str = "aed_archiver.log";
const DEFAULT_DIRECTIVES: &str = "aed_archiver=debug,info";

/// `RUST_LOG` when set, else debug for this crate and info for dependencies.
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

fn json_file_writer(dir: &Path) -> Option<(NonBlocking, WorkerGuard)> {
    fs::create_dir_all(dir).ok()?;
    Some(tracing_appender::non_blocking(rolling::daily(dir, LOG_FILE_PREFIX)))
}

/// Console output plus daily-rolling JSON files under `dir`.
///
/// If `dir` cannot be created the archiver still runs, logging to the console
/// only. Hold the returned guard until exit so buffered file lines get flushed.
pub fn init_logging(dir: impl AsRef<Path>) -> Option<WorkerGuard> {
    let dir = dir.as_ref();
    let (file_layer, guard) = match json_file_writer(dir) {
        Some((writer, guard)) => (Some(fmt::layer().json().with_writer(writer)), Some(guard)),
        None => (None, None),
    };

    let console_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_writer(std::io::stdout);

    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(file_layer)
        .with(console_layer)
        .try_init();

    if guard.is_none() {
        warn!(dir = %dir.display(), "Log directory unavailable, logging to console only");
    }
    guard
}
