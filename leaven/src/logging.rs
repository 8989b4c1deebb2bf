//! File logging. The terminal belongs to the UI, so everything traced goes
//! to `leaven.log` in the data directory instead of stdout.
//!
//! `LEAVEN_LOG` takes the usual `EnvFilter` directives (default `info`).

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn filter() -> EnvFilter {
    EnvFilter::try_from_env("LEAVEN_LOG").unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn init(dir: &Path) -> Result<PathBuf> {
    let log_path = dir.join("leaven.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file at {:?}", log_path))?;

    let file_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(filter())
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::info!(log_file = ?log_path, "leaven logging initialized");
    Ok(log_path)
}
