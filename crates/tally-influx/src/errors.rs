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

use tally_core::StoreError;
use thiserror::Error;

/// InfluxDB client error types
#[derive(Error, Debug)]
pub enum InfluxError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("InfluxDB returned error status {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Query failed: {0}")]
    QueryError(String),

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("InfluxDB is not healthy: {0}")]
    Unhealthy(String),

    #[error("Missing required InfluxDB credentials: {}", .0.join(", "))]
    MissingCredentials(Vec<String>),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Session is closed")]
    NotConnected,
}

pub type InfluxResult<T> = Result<T, InfluxError>;

impl From<InfluxError> for StoreError {
    fn from(err: InfluxError) -> Self {
        match err {
            InfluxError::HttpError(e) => StoreError::Unreachable(e.to_string()),
            InfluxError::Unhealthy(msg) => StoreError::Unreachable(msg),
            InfluxError::AuthenticationFailed => StoreError::AuthenticationFailed,
            InfluxError::InvalidResponse(msg) => StoreError::Malformed(msg),
            InfluxError::NotConnected => StoreError::NotConnected,
            err @ (InfluxError::ApiError { .. }
            | InfluxError::QueryError(_)
            | InfluxError::MissingCredentials(_)
            | InfluxError::ConfigError(_)) => StoreError::Query(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credentials_message() {
        let err = InfluxError::MissingCredentials(vec![
            "INFLUX_URL".to_string(),
            "INFLUX_ORG".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Missing required InfluxDB credentials: INFLUX_URL, INFLUX_ORG"
        );
    }

    #[test]
    fn test_store_error_mapping() {
        assert_eq!(
            StoreError::from(InfluxError::AuthenticationFailed),
            StoreError::AuthenticationFailed
        );
        assert_eq!(
            StoreError::from(InfluxError::NotConnected),
            StoreError::NotConnected
        );
        assert!(matches!(
            StoreError::from(InfluxError::ApiError {
                status: 400,
                message: "bad flux".to_string()
            }),
            StoreError::Query(msg) if msg.contains("bad flux")
        ));
    }
}
