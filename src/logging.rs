//! Tracing subscriber setup for the binary.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Maps `-v` occurrences to a default level. `RUST_LOG` still wins.
pub fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    }
}

/// Installs the global subscriber: stderr always, plus `log_file` when given.
///
/// Keep the returned guard alive until exit or buffered file lines are lost.
pub fn init(verbosity: u8, log_file: Option<&Path>) -> io::Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(level_for(verbosity).into())
        .from_env_lossy();

    let mut guard = None;
    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let (non_blocking, worker_guard) = tracing_appender::non_blocking(file);
            guard = Some(worker_guard);
            Some(fmt::layer().with_ansi(false).with_writer(non_blocking))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(file_layer)
        .try_init()
        .map_err(io::Error::other)?;

    Ok(guard)
}
