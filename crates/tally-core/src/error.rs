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

//! Error types shared across the engine

use crate::strategy::AggregationKind;
use thiserror::Error;

/// Problems with the processing configuration, raised before any store I/O
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required config keys: {}", .0.join(", "))]
    MissingKeys(Vec<String>),

    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error(
        "unknown aggregation kind '{0}' (supported: {supported})",
        supported = AggregationKind::supported_list()
    )]
    UnknownKind(String),

    #[error("failed to parse processing config: {0}")]
    Parse(String),
}

/// Failures reported by a time-series store implementation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unreachable(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("write rejected: {0}")]
    WriteRejected(String),

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("store session is not connected")]
    NotConnected,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failures that end an entity's or a strategy's pass early
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregationError {
    #[error("could not determine resume point for {entity_id} (version {version}): {source}")]
    ResumePoint {
        entity_id: String,
        version: String,
        #[source]
        source: StoreError,
    },

    #[error(
        "{kind} finished with {} failed entities: {}",
        .failed_entities.len(),
        .failed_entities.join(", ")
    )]
    Incomplete {
        kind: AggregationKind,
        failed_entities: Vec<String>,
    },
}
