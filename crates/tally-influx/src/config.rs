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

//! Connection settings read from the environment

use crate::errors::{InfluxError, InfluxResult};
use std::fmt;
use std::time::Duration;
use tracing::debug;

pub const ENV_URL: &str = "INFLUX_URL";
pub const ENV_TOKEN: &str = "INFLUX_TOKEN";
pub const ENV_ORG: &str = "INFLUX_ORG";
pub const ENV_TIMEOUT_SECS: &str = "INFLUX_TIMEOUT_SECS";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// InfluxDB endpoint and credentials
#[derive(Clone, PartialEq, Eq)]
pub struct InfluxSettings {
    pub url: String,
    pub token: String,
    pub org: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl fmt::Debug for InfluxSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfluxSettings")
            .field("url", &self.url)
            .field("token", &"***")
            .field("org", &self.org)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl InfluxSettings {
    pub fn new(url: impl Into<String>, token: impl Into<String>, org: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            org: org.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Read `INFLUX_URL`, `INFLUX_TOKEN` and `INFLUX_ORG` (plus the optional
    /// `INFLUX_TIMEOUT_SECS`) from the process environment
    pub fn from_env() -> InfluxResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with a custom variable source.
    /// All missing variables are reported together.
    pub fn from_lookup<F>(lookup: F) -> InfluxResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let url = get(ENV_URL);
        let token = get(ENV_TOKEN);
        let org = get(ENV_ORG);

        let (Some(url), Some(token), Some(org)) = (&url, &token, &org) else {
            let missing = [(ENV_URL, &url), (ENV_TOKEN, &token), (ENV_ORG, &org)]
                .into_iter()
                .filter(|(_, value)| value.is_none())
                .map(|(key, _)| key.to_string())
                .collect();
            return Err(InfluxError::MissingCredentials(missing));
        };

        let mut settings = Self::new(url.trim(), token.trim(), org.trim());

        if let Some(raw) = get(ENV_TIMEOUT_SECS) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                InfluxError::ConfigError(format!(
                    "{ENV_TIMEOUT_SECS} must be a whole number of seconds, got '{raw}'"
                ))
            })?;
            settings.timeout = Duration::from_secs(secs);
        }

        debug!(
            "InfluxDB settings loaded: url={}, org={}",
            settings.url, settings.org
        );
        Ok(settings)
    }
}
