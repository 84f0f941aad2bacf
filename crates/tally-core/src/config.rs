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

//! Processing configuration and its validation
//!
//! The raw [`ProcessingSpec`] mirrors the `processing` section of the config
//! file. [`ProcessingSpec::validate`] turns it into a [`ProcessingPlan`] without
//! touching the store, so every configuration problem surfaces at startup.

use crate::error::ConfigError;
use crate::strategy::AggregationKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

fn default_field() -> String {
    "daily_sum".to_string()
}

fn default_unit() -> String {
    "kWh".to_string()
}

fn default_source_field() -> String {
    "value".to_string()
}

/// Processing section as written in the config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingSpec {
    /// Bucket holding raw sensor samples
    pub input_bucket: Option<String>,

    /// Bucket aggregates are written to
    pub output_bucket: Option<String>,

    /// Aggregation kind name (e.g., "daily_aggregate") -> settings for that kind
    pub entities_to_process: Option<BTreeMap<String, KindSpec>>,
}

/// Settings for one aggregation kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KindSpec {
    /// Version tag written with every output point
    pub version: Option<String>,

    /// Entity IDs to aggregate, processed in this order
    #[serde(default)]
    pub entities: Option<Vec<String>>,

    /// Optional scenario tag
    #[serde(default)]
    pub scenario: Option<String>,

    /// Output field name (default: "daily_sum")
    #[serde(default)]
    pub field: Option<String>,

    /// Unit tag (default: "kWh")
    #[serde(default)]
    pub unit: Option<String>,

    /// Field read from the raw samples (default: "value")
    #[serde(default)]
    pub source_field: Option<String>,
}

/// Validated processing configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingPlan {
    pub input_bucket: String,
    pub output_bucket: String,
    pub kinds: Vec<KindPlan>,
}

/// Validated settings for one aggregation kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindPlan {
    pub kind: AggregationKind,
    pub version: String,
    pub entities: Vec<String>,
    pub scenario: Option<String>,
    pub field: String,
    pub unit: String,
    pub source_field: String,
}

impl ProcessingSpec {
    /// Parse from an already decoded JSON document
    pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        serde_json::from_value(value).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check the settings and build the plan the runner executes
    pub fn validate(&self) -> Result<ProcessingPlan, ConfigError> {
        let mut missing = Vec::new();
        if self.input_bucket.is_none() {
            missing.push("input_bucket".to_string());
        }
        if self.output_bucket.is_none() {
            missing.push("output_bucket".to_string());
        }
        match &self.entities_to_process {
            None => missing.push("entities_to_process".to_string()),
            Some(kinds) => {
                for (name, spec) in kinds {
                    if spec.version.is_none() {
                        missing.push(format!("entities_to_process.{name}.version"));
                    }
                }
            }
        }
        if !missing.is_empty() {
            return Err(ConfigError::MissingKeys(missing));
        }

        let input_bucket = non_blank("input_bucket", self.input_bucket.as_deref())?;
        let output_bucket = non_blank("output_bucket", self.output_bucket.as_deref())?;

        let kinds_spec = match &self.entities_to_process {
            Some(kinds) if !kinds.is_empty() => kinds,
            _ => {
                return Err(ConfigError::InvalidValue {
                    key: "entities_to_process".to_string(),
                    reason: "at least one aggregation kind must be configured".to_string(),
                });
            }
        };

        let mut kinds = Vec::with_capacity(kinds_spec.len());
        for (name, spec) in kinds_spec {
            let kind: AggregationKind = name
                .parse()
                .map_err(|_| ConfigError::UnknownKind(name.clone()))?;
            kinds.push(spec.validate(kind)?);
        }

        debug!(
            "Processing plan: input={}, output={}, kinds={}",
            input_bucket,
            output_bucket,
            kinds.len()
        );

        Ok(ProcessingPlan {
            input_bucket,
            output_bucket,
            kinds,
        })
    }
}

impl KindSpec {
    fn validate(&self, kind: AggregationKind) -> Result<KindPlan, ConfigError> {
        let prefix = format!("entities_to_process.{kind}");
        let version = non_blank(&format!("{prefix}.version"), self.version.as_deref())?;

        let field = optional_non_blank(&format!("{prefix}.field"), self.field.as_deref())?
            .unwrap_or_else(default_field);
        let unit = optional_non_blank(&format!("{prefix}.unit"), self.unit.as_deref())?
            .unwrap_or_else(default_unit);
        let source_field =
            optional_non_blank(&format!("{prefix}.source_field"), self.source_field.as_deref())?
                .unwrap_or_else(default_source_field);
        let scenario = self
            .scenario
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let mut seen = HashSet::new();
        let mut entities = Vec::new();
        for raw in self.entities.iter().flatten() {
            let entity = raw.trim();
            if entity.is_empty() {
                warn!("Ignoring blank entity ID in {prefix}.entities");
                continue;
            }
            if !seen.insert(entity.to_string()) {
                warn!("Ignoring duplicate entity ID '{entity}' in {prefix}.entities");
                continue;
            }
            entities.push(entity.to_string());
        }

        if entities.is_empty() {
            debug!("No entities configured for {kind}, nothing to do for this kind");
        }

        Ok(KindPlan {
            kind,
            version,
            entities,
            scenario,
            field,
            unit,
            source_field,
        })
    }
}

fn non_blank(key: &str, value: Option<&str>) -> Result<String, ConfigError> {
    optional_non_blank(key, value)?.ok_or_else(|| ConfigError::MissingKeys(vec![key.to_string()]))
}

fn optional_non_blank(key: &str, value: Option<&str>) -> Result<Option<String>, ConfigError> {
    match value.map(str::trim) {
        None => Ok(None),
        Some("") => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: "must not be empty".to_string(),
        }),
        Some(v) => Ok(Some(v.to_string())),
    }
}
