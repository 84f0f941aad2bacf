// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Subscriber setup and log file retention

use crate::cli::{Cli, LogLevel, Stage};
use crate::config::LoggingConfig;
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, TimeDelta};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Filter directive: `--log-level`, then `RUST_LOG`, then the stage default
pub fn filter_directive(
    cli_level: Option<LogLevel>,
    rust_log: Option<&str>,
    stage: Stage,
) -> String {
    match (cli_level, rust_log.map(str::trim).filter(|s| !s.is_empty())) {
        (Some(level), _) => level.directive().to_string(),
        (None, Some(env)) => env.to_string(),
        (None, None) => stage.default_level().directive().to_string(),
    }
}

/// Default log file name for a run started now
pub fn default_log_file(log_dir: &Path) -> PathBuf {
    log_dir.join(format!("{}.log", Local::now().format("%Y%m%d_%H%M%S")))
}

/// Install console and file logging; returns the log file path
pub fn init(cli: &Cli, config: &LoggingConfig) -> Result<PathBuf> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let directive = filter_directive(cli.log_level, rust_log.as_deref(), cli.stage);
    let filter = EnvFilter::try_new(&directive)
        .unwrap_or_else(|_| EnvFilter::new(cli.stage.default_level().directive()));

    let log_file = cli
        .log_file
        .clone()
        .unwrap_or_else(|| default_log_file(&config.log_dir));
    if let Some(parent) = log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .with_context(|| format!("Failed to open log file {}", log_file.display()))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(file)),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    debug!("Logging to {} (filter '{}')", log_file.display(), directive);
    Ok(log_file)
}

/// Date encoded in a `YYYYMMDD...log` file name
fn log_file_date(path: &Path) -> Option<NaiveDate> {
    if path.extension().and_then(|e| e.to_str()) != Some("log") {
        return None;
    }
    let name = path.file_name()?.to_str()?;
    let prefix = name.get(..8)?;
    NaiveDate::parse_from_str(prefix, "%Y%m%d").ok()
}

/// Delete `*.log` files in `log_dir` dated `retention_days` or more before `today`.
/// Files without a date prefix are left alone. Returns the number removed.
pub fn cleanup_old_logs(log_dir: &Path, retention_days: u32, today: NaiveDate) -> Result<usize> {
    cleanup_with(log_dir, retention_days, today, |path| fs::remove_file(path))
}

/// Retention pass with a pluggable delete; a file that cannot be removed is skipped
fn cleanup_with<F>(
    log_dir: &Path,
    retention_days: u32,
    today: NaiveDate,
    mut remove: F,
) -> Result<usize>
where
    F: FnMut(&Path) -> io::Result<()>,
{
    if !log_dir.is_dir() {
        return Ok(0);
    }

    let cutoff = today - TimeDelta::days(i64::from(retention_days));
    let mut removed = 0;

    let entries = fs::read_dir(log_dir)
        .with_context(|| format!("Failed to read log directory {}", log_dir.display()))?;
    for entry in entries {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                warn!("⚠️ Skipping unreadable entry in {}: {}", log_dir.display(), e);
                continue;
            }
        };
        if !path.is_file() {
            continue;
        }
        let Some(date) = log_file_date(&path) else {
            continue;
        };
        if date > cutoff {
            continue;
        }
        match remove(&path) {
            Ok(()) => {
                debug!("Deleted old log file {}", path.display());
                removed += 1;
            }
            Err(e) => warn!("⚠️ Could not delete old log {}: {}", path.display(), e),
        }
    }

    Ok(removed)
}
