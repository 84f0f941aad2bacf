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

//! [`TimeSeriesStore`] backed by InfluxDB and its scoped session

use crate::annotated::FluxRecord;
use crate::client::InfluxClient;
use crate::config::InfluxSettings;
use crate::errors::{InfluxError, InfluxResult};
use crate::flux::{day_max_query, earliest_point_query, latest_point_query};
use crate::line_protocol::encode_point;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tally_core::{
    AggregatePoint, LocalDay, SeriesTags, StoreError, StoreResult, TimeSeriesStore,
};
use tracing::{debug, info};

/// Measurement aggregates are written to
pub const DEFAULT_MEASUREMENT: &str = "home_assistant";

#[derive(Debug)]
pub struct InfluxStore {
    client: InfluxClient,
    timezone: Tz,
    measurement: String,
    open: AtomicBool,
}

impl InfluxStore {
    pub fn new(client: InfluxClient, timezone: Tz) -> Self {
        Self {
            client,
            timezone,
            measurement: DEFAULT_MEASUREMENT.to_string(),
            open: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn with_measurement(mut self, measurement: impl Into<String>) -> Self {
        self.measurement = measurement.into();
        self
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    fn ensure_open(&self) -> InfluxResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(InfluxError::NotConnected)
        }
    }

    fn times(records: &[FluxRecord]) -> InfluxResult<Vec<DateTime<Utc>>> {
        records
            .iter()
            .filter_map(|r| r.time().transpose())
            .collect()
    }
}

#[async_trait]
impl TimeSeriesStore for InfluxStore {
    fn name(&self) -> &str {
        "influxdb"
    }

    async fn read_latest_day(
        &self,
        bucket: &str,
        tags: &SeriesTags,
    ) -> StoreResult<Option<LocalDay>> {
        self.ensure_open()?;
        let records = self.client.query(&latest_point_query(bucket, tags)).await?;
        let latest = Self::times(&records)?.into_iter().max();

        let day = latest.map(|t| LocalDay::containing(t, self.timezone));
        match &day {
            Some(d) => debug!("Last point for {} in '{}': {}", tags, bucket, d),
            None => debug!("No points for {} in '{}'", tags, bucket),
        }
        Ok(day)
    }

    async fn read_latest_value(
        &self,
        bucket: &str,
        entity_id: &str,
        field: &str,
        day: &LocalDay,
    ) -> StoreResult<Option<f64>> {
        self.ensure_open()?;
        let query = day_max_query(bucket, entity_id, field, day.start_utc(), day.end_utc());
        let records = self.client.query(&query).await?;

        let mut max: Option<f64> = None;
        for record in &records {
            if let Some(value) = record.value_f64()? {
                max = Some(max.map_or(value, |m| m.max(value)));
            }
        }
        Ok(max)
    }

    async fn read_earliest_day(&self, bucket: &str) -> StoreResult<Option<LocalDay>> {
        self.ensure_open()?;
        let records = self.client.query(&earliest_point_query(bucket)).await?;
        let earliest = Self::times(&records)?.into_iter().min();
        Ok(earliest.map(|t| LocalDay::containing(t, self.timezone)))
    }

    async fn write(&self, bucket: &str, point: &AggregatePoint) -> StoreResult<()> {
        self.ensure_open()?;
        let time = point.timestamp.to_utc(self.timezone);
        let line = encode_point(&self.measurement, point, time)
            .map_err(|e| StoreError::WriteRejected(e.to_string()))?;
        self.client.write(bucket, &line).await.map_err(|e| match e {
            InfluxError::ApiError { status, message } => {
                StoreError::WriteRejected(format!("{status}: {message}"))
            }
            other => other.into(),
        })
    }
}

/// An open connection to InfluxDB.
///
/// Created only after a successful health check. Dropping the session closes
/// it on every exit path; stores handed out by [`InfluxSession::store`] then
/// fail with [`StoreError::NotConnected`].
#[derive(Debug)]
pub struct InfluxSession {
    store: Arc<InfluxStore>,
}

impl InfluxSession {
    pub async fn open(settings: &InfluxSettings, timezone: Tz) -> InfluxResult<Self> {
        let client = InfluxClient::new(settings)?;
        Self::with_client(client, timezone).await
    }

    pub async fn with_client(client: InfluxClient, timezone: Tz) -> InfluxResult<Self> {
        client.health().await?;
        info!("🔌 Connected to InfluxDB (org {})", client.org());
        Ok(Self {
            store: Arc::new(InfluxStore::new(client, timezone)),
        })
    }

    pub fn store(&self) -> Arc<dyn TimeSeriesStore> {
        Arc::clone(&self.store) as Arc<dyn TimeSeriesStore>
    }
}

impl Drop for InfluxSession {
    fn drop(&mut self) {
        self.store.close();
        debug!("InfluxDB session closed");
    }
}
