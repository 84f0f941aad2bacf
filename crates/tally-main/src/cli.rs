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

use clap::{Parser, ValueEnum};
use std::fmt;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(about = "Aggregate raw sensor data into daily values in InfluxDB", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Execution stage, selects the config file and default log level
    #[arg(long, value_enum, default_value_t = Stage::Dev)]
    pub stage: Stage,

    /// Log level (default: DEBUG for dev/test, INFO for prod)
    #[arg(long, value_enum, ignore_case = true)]
    pub log_level: Option<LogLevel>,

    /// Log file path (default: <log_dir>/<YYYYMMDD_HHMMSS>.log)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Directory holding <stage>.toml / <stage>.json
    #[arg(long, default_value = "config")]
    pub config_dir: PathBuf,

    /// Environment file with INFLUX_* credentials
    #[arg(long, default_value = ".env")]
    pub env_file: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Stage {
    Dev,
    Test,
    Prod,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Test => "test",
            Self::Prod => "prod",
        }
    }

    pub fn default_level(self) -> LogLevel {
        match self {
            Self::Dev | Self::Test => LogLevel::Debug,
            Self::Prod => LogLevel::Info,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    #[value(name = "DEBUG")]
    Debug,
    #[value(name = "INFO")]
    Info,
    #[value(name = "WARNING", alias = "WARN")]
    Warning,
    #[value(name = "ERROR")]
    Error,
}

impl LogLevel {
    /// `EnvFilter` directive for this level
    pub fn directive(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error => "error",
        }
    }
}
