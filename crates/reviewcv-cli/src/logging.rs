//! Installation of the global tracing subscriber.
//!
//! Events go to stderr and, for experiment runs, to a plain-text log file.
//! The level defaults to `info` and can be changed with `RUST_LOG`.

use std::{fs, path::Path};

use anyhow::Context;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*};

const DEFAULT_FILTER: &str = "info";

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Logs to stderr and appends to `log_path`.
///
/// Buffered lines are flushed when the returned guard is dropped, so it has to
/// be held until the program ends.
pub(crate) fn init(log_path: &Path) -> anyhow::Result<WorkerGuard> {
    let dir = log_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
    let file_name = log_path
        .file_name()
        .with_context(|| format!("Invalid log file path: {}", log_path.display()))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(dir)
        .with_context(|| format!("Failed to open log file: {}", log_path.display()))?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let stderr_layer = fmt::layer().with_writer(std::io::stderr);
    let file_layer = fmt::layer().with_ansi(false).with_writer(file_writer);
    let subscriber = Registry::default()
        .with(build_env_filter())
        .with(stderr_layer)
        .with(file_layer);
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install global tracing subscriber")?;

    tracing::info!(path = %log_path.display(), "logging initialized");
    Ok(guard)
}

/// Logs to stderr only.
pub(crate) fn init_stderr() -> anyhow::Result<()> {
    let subscriber = Registry::default()
        .with(build_env_filter())
        .with(fmt::layer().with_writer(std::io::stderr));
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install global tracing subscriber")?;
    Ok(())
}
