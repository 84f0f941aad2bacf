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

mod cli;
mod config;
mod logging;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::time::Instant;
use tally_core::AggregationRunner;
use tally_influx::{InfluxSession, InfluxSettings};
use tracing::{error, info, info_span, warn};

use crate::cli::Cli;
use crate::config::AppConfig;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let started = Instant::now();

    // Credentials may live in .env; a missing file is fine
    let env_loaded = dotenv::from_path(&cli.env_file).is_ok();

    let config = AppConfig::load(&cli.config_dir, cli.stage);
    let logging_config = config
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    let log_file = logging::init(&cli, &logging_config)?;

    info!("🚀 Starting tally ({} stage)", cli.stage);
    info!("   Log file: {}", log_file.display());
    if env_loaded {
        info!("   Environment loaded from {}", cli.env_file.display());
    }
    if let Some(source) = config.as_ref().ok().and_then(|c| c.source.as_ref()) {
        info!("✅ Loaded configuration from {}", source.display());
    }

    match logging::cleanup_old_logs(
        &logging_config.log_dir,
        logging_config.retention_days,
        Local::now().date_naive(),
    ) {
        Ok(0) => {}
        Ok(removed) => info!(
            "🧹 Removed {} log files older than {} days",
            removed, logging_config.retention_days
        ),
        Err(e) => warn!("⚠️ Log cleanup failed: {:#}", e),
    }

    let result = match config {
        Ok(config) => run(&cli, &config).await,
        Err(e) => Err(e),
    };

    if let Err(e) = &result {
        error!("❌ {:#}", e);
    }
    info!("⏱️ Finished in {:.2?}", started.elapsed());
    result
}

async fn run(cli: &Cli, config: &AppConfig) -> Result<()> {
    let plan = config.validate()?;
    let timezone = config.timezone()?;
    info!("📋 Configuration Summary:");
    info!("   Timezone: {}", timezone);
    info!("   Input bucket: {}", plan.input_bucket);
    info!("   Output bucket: {}", plan.output_bucket);
    for kind in &plan.kinds {
        info!(
            "     - {} ({}) - {} entities",
            kind.kind,
            kind.version,
            kind.entities.len()
        );
    }

    let settings = InfluxSettings::from_env().context("Cannot connect to InfluxDB")?;

    let session = match InfluxSession::open(&settings, timezone).await {
        Ok(session) => session,
        Err(e) => {
            error!("❌ Could not connect to InfluxDB at {}: {}", settings.url, e);
            return Ok(());
        }
    };

    let span = info_span!("run", stage = %cli.stage);
    let runner = AggregationRunner::build(session.store(), &config.processing, timezone, span)
        .await
        .context("Invalid processing configuration")?;

    let summary = runner.run_all().await;
    if summary.is_success() {
        info!("✅ {}", summary);
    } else {
        warn!("⚠️ {}", summary);
    }

    drop(session);
    Ok(())
}
