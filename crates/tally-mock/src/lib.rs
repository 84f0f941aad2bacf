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

//! In-memory [`TimeSeriesStore`] for tests.
//!
//! Points are upserted on (bucket, entity, version, scenario, field, time) so
//! repeated writes behave like the real store. Failures can be injected per
//! entity and every call is recorded for later inspection.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use tally_core::time::local_to_utc;
use tally_core::{AggregatePoint, LocalDay, SeriesTags, StoreError, StoreResult, TimeSeriesStore};

/// A stored point, raw sample or written aggregate
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub bucket: String,
    pub entity_id: String,
    pub version: Option<String>,
    pub scenario: Option<String>,
    pub field: String,
    pub unit: Option<String>,
    pub time: DateTime<Utc>,
    pub value: f64,
}

type RecordKey = (
    String,
    String,
    Option<String>,
    Option<String>,
    String,
    DateTime<Utc>,
);

impl Record {
    fn key(&self) -> RecordKey {
        (
            self.bucket.clone(),
            self.entity_id.clone(),
            self.version.clone(),
            self.scenario.clone(),
            self.field.clone(),
            self.time,
        )
    }
}

/// A call made against the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    ReadLatestDay { bucket: String, tags: SeriesTags },
    ReadLatestValue { bucket: String, entity_id: String, field: String, day: LocalDay },
    ReadEarliestDay { bucket: String },
    Write { bucket: String, entity_id: String, day: LocalDay },
}

#[derive(Debug, Default)]
struct State {
    records: BTreeMap<RecordKey, Record>,
    failing_reads: HashSet<String>,
    failing_writes: HashSet<String>,
    failing_resume: HashSet<String>,
    failing_earliest: bool,
    unreachable: bool,
    calls: Vec<StoreCall>,
}

#[derive(Debug)]
pub struct MemoryStore {
    timezone: Tz,
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new(timezone: Tz) -> Self {
        Self {
            timezone,
            state: Mutex::new(State::default()),
        }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Add a raw sample at a UTC instant
    pub fn insert_sample(
        &self,
        bucket: &str,
        entity_id: &str,
        field: &str,
        time: DateTime<Utc>,
        value: f64,
    ) {
        let record = Record {
            bucket: bucket.to_string(),
            entity_id: entity_id.to_string(),
            version: None,
            scenario: None,
            field: field.to_string(),
            unit: None,
            time,
            value,
        };
        let mut state = self.state.lock();
        state.records.insert(record.key(), record);
    }

    /// Add a raw sample at a local wall-clock time
    pub fn insert_local_sample(
        &self,
        bucket: &str,
        entity_id: &str,
        field: &str,
        local: NaiveDateTime,
        value: f64,
    ) {
        let time = local_to_utc(self.timezone, local);
        self.insert_sample(bucket, entity_id, field, time, value);
    }

    /// Make value reads for `entity_id` fail
    pub fn fail_reads_for(&self, entity_id: &str) {
        self.state.lock().failing_reads.insert(entity_id.to_string());
    }

    /// Make writes for `entity_id` fail
    pub fn fail_writes_for(&self, entity_id: &str) {
        self.state.lock().failing_writes.insert(entity_id.to_string());
    }

    /// Make the latest-day lookup for `entity_id` fail
    pub fn fail_resume_for(&self, entity_id: &str) {
        self.state.lock().failing_resume.insert(entity_id.to_string());
    }

    /// Make the earliest-day lookup fail
    pub fn fail_earliest_lookup(&self) {
        self.state.lock().failing_earliest = true;
    }

    /// Fail every call while `unreachable` is set
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// All records in `bucket`, ordered by entity then time
    pub fn records(&self, bucket: &str) -> Vec<Record> {
        let state = self.state.lock();
        let mut records: Vec<Record> = state
            .records
            .values()
            .filter(|r| r.bucket == bucket)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.entity_id.cmp(&b.entity_id).then(a.time.cmp(&b.time)));
        records
    }

    /// Records in `bucket` for one entity, ordered by time
    pub fn records_for(&self, bucket: &str, entity_id: &str) -> Vec<Record> {
        self.records(bucket)
            .into_iter()
            .filter(|r| r.entity_id == entity_id)
            .collect()
    }

    /// Local days of the records in `bucket` for one entity
    pub fn days_for(&self, bucket: &str, entity_id: &str) -> Vec<LocalDay> {
        self.records_for(bucket, entity_id)
            .iter()
            .map(|r| LocalDay::containing(r.time, self.timezone))
            .collect()
    }

    fn offline(state: &State) -> StoreResult<()> {
        if state.unreachable {
            return Err(StoreError::Unreachable("mock store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TimeSeriesStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn read_latest_day(
        &self,
        bucket: &str,
        tags: &SeriesTags,
    ) -> StoreResult<Option<LocalDay>> {
        let mut state = self.state.lock();
        state.calls.push(StoreCall::ReadLatestDay {
            bucket: bucket.to_string(),
            tags: tags.clone(),
        });
        Self::offline(&state)?;
        if state.failing_resume.contains(&tags.entity_id) {
            return Err(StoreError::Query(format!(
                "injected resume failure for {}",
                tags.entity_id
            )));
        }

        let latest = state
            .records
            .values()
            .filter(|r| {
                r.bucket == bucket
                    && r.entity_id == tags.entity_id
                    && r.version.as_deref() == Some(tags.version.as_str())
                    && (tags.scenario.is_none() || r.scenario == tags.scenario)
            })
            .map(|r| r.time)
            .max();

        Ok(latest.map(|t| LocalDay::containing(t, self.timezone)))
    }

    async fn read_latest_value(
        &self,
        bucket: &str,
        entity_id: &str,
        field: &str,
        day: &LocalDay,
    ) -> StoreResult<Option<f64>> {
        let mut state = self.state.lock();
        state.calls.push(StoreCall::ReadLatestValue {
            bucket: bucket.to_string(),
            entity_id: entity_id.to_string(),
            field: field.to_string(),
            day: day.clone(),
        });
        Self::offline(&state)?;
        if state.failing_reads.contains(entity_id) {
            return Err(StoreError::Query(format!(
                "injected read failure for {entity_id}"
            )));
        }

        let (start, end) = (day.start_utc(), day.end_utc());
        let max = state
            .records
            .values()
            .filter(|r| {
                r.bucket == bucket
                    && r.entity_id == entity_id
                    && r.field == field
                    && r.time >= start
                    && r.time < end
            })
            .map(|r| r.value)
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))));

        Ok(max)
    }

    async fn read_earliest_day(&self, bucket: &str) -> StoreResult<Option<LocalDay>> {
        let mut state = self.state.lock();
        state.calls.push(StoreCall::ReadEarliestDay {
            bucket: bucket.to_string(),
        });
        Self::offline(&state)?;
        if state.failing_earliest {
            return Err(StoreError::Query("injected earliest lookup failure".to_string()));
        }

        let earliest = state
            .records
            .values()
            .filter(|r| r.bucket == bucket)
            .map(|r| r.time)
            .min();

        Ok(earliest.map(|t| LocalDay::containing(t, self.timezone)))
    }

    async fn write(&self, bucket: &str, point: &AggregatePoint) -> StoreResult<()> {
        let time = point.timestamp.to_utc(self.timezone);
        let mut state = self.state.lock();
        state.calls.push(StoreCall::Write {
            bucket: bucket.to_string(),
            entity_id: point.tags.entity_id.clone(),
            day: LocalDay::containing(time, self.timezone),
        });
        Self::offline(&state)?;
        if state.failing_writes.contains(&point.tags.entity_id) {
            return Err(StoreError::WriteRejected(format!(
                "injected write failure for {}",
                point.tags.entity_id
            )));
        }

        let record = Record {
            bucket: bucket.to_string(),
            entity_id: point.tags.entity_id.clone(),
            version: Some(point.tags.version.clone()),
            scenario: point.tags.scenario.clone(),
            field: point.field.clone(),
            unit: Some(point.unit.clone()),
            time,
            value: point.value,
        };
        state.records.insert(record.key(), record);
        Ok(())
    }
}
