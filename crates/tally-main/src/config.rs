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

use crate::cli::Stage;
use anyhow::{Context, Result, bail};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tally_core::time::parse_timezone;
use tally_core::{ProcessingPlan, ProcessingSpec};

/// Application configuration for one stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// IANA zone defining local days (e.g., "Europe/Berlin")
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default)]
    pub processing: ProcessingSpec,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// File this configuration was read from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Log files older than this many days are deleted at startup
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_timezone() -> String {
    "Europe/Berlin".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_retention_days() -> u32 {
    30
}

impl AppConfig {
    /// Load `<config_dir>/<stage>.toml`, falling back to `<stage>.json`
    pub fn load(config_dir: &Path, stage: Stage) -> Result<Self> {
        let toml_path = config_dir.join(format!("{stage}.toml"));
        if let Ok(config_str) = std::fs::read_to_string(&toml_path) {
            let mut config: AppConfig = toml::from_str(&config_str)
                .with_context(|| format!("Failed to parse {}", toml_path.display()))?;
            config.source = Some(toml_path);
            return Ok(config);
        }

        let json_path = config_dir.join(format!("{stage}.json"));
        if let Ok(config_str) = std::fs::read_to_string(&json_path) {
            let mut config: AppConfig = serde_json::from_str(&config_str)
                .with_context(|| format!("Failed to parse {}", json_path.display()))?;
            config.source = Some(json_path);
            return Ok(config);
        }

        bail!(
            "Configuration file not found: tried {} and {}",
            toml_path.display(),
            json_path.display()
        )
    }

    pub fn timezone(&self) -> Result<Tz> {
        parse_timezone(&self.timezone)
            .with_context(|| format!("Invalid timezone '{}'", self.timezone))
    }

    /// Check everything that can be checked without contacting the store
    pub fn validate(&self) -> Result<ProcessingPlan> {
        self.timezone()?;

        if self.logging.retention_days == 0 {
            bail!("logging.retention_days must be at least 1");
        }

        let plan = self
            .processing
            .validate()
            .context("Invalid processing configuration")?;
        Ok(plan)
    }
}
