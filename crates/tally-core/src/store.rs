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

//! Time-series store contract consumed by the aggregation engine

use crate::error::StoreResult;
use crate::time::{LocalDay, Timestamp};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tags identifying one aggregated series in the output bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeriesTags {
    /// Sensor / data source key (e.g., "sensor.solax_today_s_import_energy")
    pub entity_id: String,

    /// Processing version the series was produced by
    pub version: String,

    /// Optional scenario label for what-if runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
}

impl SeriesTags {
    pub fn new(entity_id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            version: version.into(),
            scenario: None,
        }
    }

    #[must_use]
    pub fn with_scenario(mut self, scenario: Option<String>) -> Self {
        self.scenario = scenario;
        self
    }
}

impl fmt::Display for SeriesTags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.entity_id, self.version)?;
        if let Some(scenario) = &self.scenario {
            write!(f, "[{scenario}]")?;
        }
        Ok(())
    }
}

/// One aggregate value to be written to the output bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatePoint {
    pub tags: SeriesTags,

    /// Field name identifying the aggregate kind (e.g., "daily_sum")
    pub field: String,

    /// Unit tag (e.g., "kWh")
    pub unit: String,

    pub value: f64,

    pub timestamp: Timestamp,
}

/// Read/write access to a bucketed, tag-indexed time-series store.
///
/// Implementations convert between the store's UTC representation and
/// [`LocalDay`]s in their configured zone. Lookups that match nothing return
/// `Ok(None)`, never an error.
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Local day of the most recent point matching `tags` in `bucket`
    async fn read_latest_day(
        &self,
        bucket: &str,
        tags: &SeriesTags,
    ) -> StoreResult<Option<LocalDay>>;

    /// Largest value recorded for `entity_id`/`field` within `day`
    async fn read_latest_value(
        &self,
        bucket: &str,
        entity_id: &str,
        field: &str,
        day: &LocalDay,
    ) -> StoreResult<Option<f64>>;

    /// Local day of the chronologically first point in `bucket`
    async fn read_earliest_day(&self, bucket: &str) -> StoreResult<Option<LocalDay>>;

    /// Upsert one point. Writing the same tags, field and timestamp again
    /// replaces the earlier value.
    async fn write(&self, bucket: &str, point: &AggregatePoint) -> StoreResult<()>;
}
