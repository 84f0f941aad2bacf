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

//! Per-entity aggregation driver

use crate::error::{AggregationError, StoreError};
use crate::store::{AggregatePoint, SeriesTags, TimeSeriesStore};
use crate::time::{LocalDay, Timestamp};
use crate::window::pending_days;
use std::fmt;
use std::sync::Arc;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

/// Bucket and tagging settings shared by every entity of one aggregation kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationSettings {
    pub input_bucket: String,
    pub output_bucket: String,
    pub version: String,
    pub scenario: Option<String>,
    /// Output field (e.g., "daily_sum")
    pub field: String,
    pub unit: String,
    /// Field read from raw samples (e.g., "value")
    pub source_field: String,
}

/// Outcome of one entity's pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayReport {
    pub entity_id: String,
    /// Days an aggregate was written for
    pub written: Vec<LocalDay>,
    /// Days with no raw sample, left as gaps
    pub missing: Vec<LocalDay>,
    /// Days whose fetch or write failed
    pub failed: Vec<LocalDay>,
}

impl DayReport {
    fn new(entity_id: &str) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            ..Default::default()
        }
    }

    /// Number of days that were attempted
    pub fn attempted(&self) -> usize {
        self.written.len() + self.missing.len() + self.failed.len()
    }

    pub fn is_up_to_date(&self) -> bool {
        self.attempted() == 0
    }
}

impl fmt::Display for DayReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} written, {} missing, {} failed",
            self.entity_id,
            self.written.len(),
            self.missing.len(),
            self.failed.len()
        )
    }
}

/// Catches one entity up to yesterday.
///
/// The resume point is read from the output bucket on every call, so a run
/// interrupted partway leaves a consistent prefix that the next run continues
/// from. Days are processed strictly in ascending order.
pub struct EntityAggregator {
    store: Arc<dyn TimeSeriesStore>,
    entity_id: String,
    settings: Arc<AggregationSettings>,
    first_data_day: Option<LocalDay>,
    span: Span,
}

impl fmt::Debug for EntityAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityAggregator")
            .field("store", &self.store.name())
            .field("entity_id", &self.entity_id)
            .field("settings", &self.settings)
            .field("first_data_day", &self.first_data_day)
            .finish_non_exhaustive()
    }
}

impl EntityAggregator {
    /// `parent` is the span this entity's log output is attached to
    pub fn new(
        store: Arc<dyn TimeSeriesStore>,
        entity_id: impl Into<String>,
        settings: Arc<AggregationSettings>,
        first_data_day: Option<LocalDay>,
        parent: &Span,
    ) -> Self {
        let entity_id = entity_id.into();
        let span = info_span!(parent: parent, "entity", entity_id = %entity_id);
        Self {
            store,
            entity_id,
            settings,
            first_data_day,
            span,
        }
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn settings(&self) -> &AggregationSettings {
        &self.settings
    }

    fn series_tags(&self) -> SeriesTags {
        SeriesTags::new(&self.entity_id, &self.settings.version)
            .with_scenario(self.settings.scenario.clone())
    }

    /// Aggregate every pending day strictly before `today`.
    ///
    /// Only a failed resume-point lookup is returned as an error. Per-day
    /// problems are logged and recorded in the report.
    pub async fn process(&self, today: &LocalDay) -> Result<DayReport, AggregationError> {
        self.process_inner(today).instrument(self.span.clone()).await
    }

    async fn process_inner(&self, today: &LocalDay) -> Result<DayReport, AggregationError> {
        let mut report = DayReport::new(&self.entity_id);

        let Some(last_processed) = self.resume_point().await? else {
            warn!(
                "⚠️ No output and no raw data start for {} in '{}', skipping",
                self.entity_id, self.settings.input_bucket
            );
            return Ok(report);
        };

        let days = pending_days(&last_processed, today);
        if days.is_empty() {
            info!(
                "✅ {} up to date (last processed {})",
                self.entity_id, last_processed
            );
            return Ok(report);
        }

        info!(
            "📅 {} pending days for {} ({} to {})",
            days.len(),
            self.entity_id,
            days[0],
            days[days.len() - 1]
        );

        let tags = self.series_tags();
        for day in days {
            match self.fetch_day(&day).await {
                Ok(Some(value)) => match self.write_day(&tags, &day, value).await {
                    Ok(()) => {
                        debug!("💾 {} {} = {}", self.entity_id, day, value);
                        report.written.push(day);
                    }
                    Err(e) => {
                        error!(
                            "❌ Failed to write {} for {} to '{}': {}",
                            day, self.entity_id, self.settings.output_bucket, e
                        );
                        report.failed.push(day);
                    }
                },
                Ok(None) => {
                    warn!(
                        "⚠️ No raw data for {} on {}, leaving gap",
                        self.entity_id, day
                    );
                    report.missing.push(day);
                }
                Err(e) => {
                    error!(
                        "❌ Failed to fetch {} for {} from '{}': {}",
                        day, self.entity_id, self.settings.input_bucket, e
                    );
                    report.failed.push(day);
                }
            }
        }

        info!("📊 {}", report);
        Ok(report)
    }

    /// Last day already written, or the day before raw data starts
    async fn resume_point(&self) -> Result<Option<LocalDay>, AggregationError> {
        let tags = self.series_tags();
        let latest = self
            .store
            .read_latest_day(&self.settings.output_bucket, &tags)
            .await
            .map_err(|source| {
                error!(
                    "❌ Resume point lookup failed for {} in '{}': {}",
                    tags, self.settings.output_bucket, source
                );
                AggregationError::ResumePoint {
                    entity_id: self.entity_id.clone(),
                    version: self.settings.version.clone(),
                    source,
                }
            })?;

        if let Some(day) = latest {
            debug!("Resuming {} after {}", tags, day);
            return Ok(Some(day));
        }

        Ok(self.first_data_day.as_ref().map(|first| {
            debug!("No previous output for {}, starting at {}", tags, first);
            first.pred()
        }))
    }

    async fn fetch_day(&self, day: &LocalDay) -> Result<Option<f64>, StoreError> {
        self.store
            .read_latest_value(
                &self.settings.input_bucket,
                &self.entity_id,
                &self.settings.source_field,
                day,
            )
            .await
    }

    async fn write_day(
        &self,
        tags: &SeriesTags,
        day: &LocalDay,
        value: f64,
    ) -> Result<(), StoreError> {
        let point = AggregatePoint {
            tags: tags.clone(),
            field: self.settings.field.clone(),
            unit: self.settings.unit.clone(),
            value,
            timestamp: Timestamp::from(day.canonical_instant()),
        };
        self.store.write(&self.settings.output_bucket, &point).await
    }
}
