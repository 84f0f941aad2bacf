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

//! End-to-end runs of the aggregation engine against the in-memory store

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use chrono_tz::Europe::Berlin;
use serde_json::json;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tally_core::{
    AggregationError, AggregationRunner, ConfigError, LocalDay, ProcessingSpec, StrategyOutcome,
    TimeSeriesStore,
};
use tally_mock::MemoryStore;
use tracing::Span;
use tracing_subscriber::fmt::MakeWriter;

const RAW: &str = "HomeAssistant";
const OUT: &str = "HomeAssistant_processed";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn day(y: i32, m: u32, d: u32) -> LocalDay {
    LocalDay::new(date(y, m, d), Berlin)
}

fn at(date: NaiveDate, h: u32, min: u32) -> NaiveDateTime {
    date.and_hms_opt(h, min, 0).unwrap()
}

fn spec(entities: &[&str]) -> ProcessingSpec {
    ProcessingSpec::from_value(json!({
        "input_bucket": RAW,
        "output_bucket": OUT,
        "entities_to_process": {
            "daily_aggregate": { "version": "v1", "entities": entities }
        }
    }))
    .unwrap()
}

/// Morning and evening readings of a cumulative daily counter
fn seed_days(store: &MemoryStore, entity: &str, days: &[NaiveDate]) {
    for (i, d) in days.iter().enumerate() {
        let total = 10.0 + i as f64;
        store.insert_local_sample(RAW, entity, "value", at(*d, 8, 0), total / 4.0);
        store.insert_local_sample(RAW, entity, "value", at(*d, 22, 0), total);
    }
}

async fn build(store: &Arc<MemoryStore>, spec: &ProcessingSpec) -> AggregationRunner {
    let dyn_store: Arc<dyn TimeSeriesStore> = store.clone();
    AggregationRunner::build(dyn_store, spec, Berlin, Span::none())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_fresh_start_writes_every_day_before_today() {
    let store = Arc::new(MemoryStore::new(Berlin));
    seed_days(
        &store,
        "sensor.grid_import",
        &[date(2024, 1, 1), date(2024, 1, 2), date(2024, 1, 3), date(2024, 1, 4), date(2024, 1, 5)],
    );

    let runner = build(&store, &spec(&["sensor.grid_import"])).await;
    let summary = runner.run_all_at(&day(2024, 1, 5)).await;

    assert!(summary.is_success());
    assert_eq!(summary.days_written(), 4);
    assert_eq!(
        store.days_for(OUT, "sensor.grid_import"),
        vec![day(2024, 1, 1), day(2024, 1, 2), day(2024, 1, 3), day(2024, 1, 4)]
    );

    let records = store.records_for(OUT, "sensor.grid_import");
    assert_eq!(records[0].value, 10.0);
    assert_eq!(records[3].value, 13.0);
    assert_eq!(records[0].field, "daily_sum");
    assert_eq!(records[0].unit.as_deref(), Some("kWh"));
    assert_eq!(records[0].version.as_deref(), Some("v1"));

    let local = records[0].time.with_timezone(&Berlin);
    assert_eq!((local.hour(), local.minute(), local.second()), (23, 59, 59));
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let store = Arc::new(MemoryStore::new(Berlin));
    seed_days(
        &store,
        "sensor.grid_import",
        &[date(2024, 1, 1), date(2024, 1, 2), date(2024, 1, 3)],
    );
    let runner = build(&store, &spec(&["sensor.grid_import"])).await;

    runner.run_all_at(&day(2024, 1, 4)).await;
    let first = store.records(OUT);

    store.clear_calls();
    let summary = runner.run_all_at(&day(2024, 1, 4)).await;

    assert_eq!(store.records(OUT), first);
    assert_eq!(summary.days_written(), 0);
    assert!(
        !store
            .calls()
            .iter()
            .any(|c| matches!(c, tally_mock::StoreCall::Write { .. }))
    );
}

#[tokio::test]
async fn test_later_run_continues_from_latest_output() {
    let store = Arc::new(MemoryStore::new(Berlin));
    seed_days(&store, "sensor.pv", &[date(2024, 6, 1), date(2024, 6, 2)]);
    let runner = build(&store, &spec(&["sensor.pv"])).await;

    runner.run_all_at(&day(2024, 6, 2)).await;
    assert_eq!(store.days_for(OUT, "sensor.pv"), vec![day(2024, 6, 1)]);

    seed_days(&store, "sensor.pv", &[date(2024, 6, 3)]);
    runner.run_all_at(&day(2024, 6, 4)).await;
    assert_eq!(
        store.days_for(OUT, "sensor.pv"),
        vec![day(2024, 6, 1), day(2024, 6, 2), day(2024, 6, 3)]
    );
}

#[tokio::test]
async fn test_missing_day_is_left_as_gap() {
    let store = Arc::new(MemoryStore::new(Berlin));
    seed_days(&store, "sensor.pv", &[date(2024, 1, 1), date(2024, 1, 3)]);
    let runner = build(&store, &spec(&["sensor.pv"])).await;

    runner.run_all_at(&day(2024, 1, 4)).await;
    assert_eq!(
        store.days_for(OUT, "sensor.pv"),
        vec![day(2024, 1, 1), day(2024, 1, 3)]
    );

    // Late-arriving data for the gap is not picked up
    seed_days(&store, "sensor.pv", &[date(2024, 1, 2)]);
    runner.run_all_at(&day(2024, 1, 4)).await;
    assert_eq!(
        store.days_for(OUT, "sensor.pv"),
        vec![day(2024, 1, 1), day(2024, 1, 3)]
    );
}

#[tokio::test]
async fn test_failing_entity_does_not_affect_others() {
    let store = Arc::new(MemoryStore::new(Berlin));
    let days = [date(2024, 1, 1), date(2024, 1, 2), date(2024, 1, 3)];
    seed_days(&store, "sensor.a", &days);
    seed_days(&store, "sensor.b", &days);
    store.fail_reads_for("sensor.a");

    let runner = build(&store, &spec(&["sensor.a", "sensor.b"])).await;
    let summary = runner.run_all_at(&day(2024, 1, 4)).await;

    assert!(store.records_for(OUT, "sensor.a").is_empty());
    assert_eq!(store.records_for(OUT, "sensor.b").len(), 3);

    let StrategyOutcome::Completed(report) = &summary.outcomes[0] else {
        panic!("expected completed strategy, got {:?}", summary.outcomes[0]);
    };
    assert_eq!(report.entities[0].failed.len(), 3);
    assert_eq!(report.entities[1].written.len(), 3);
}

#[tokio::test]
async fn test_failing_writes_are_isolated_per_entity() {
    let store = Arc::new(MemoryStore::new(Berlin));
    let days = [date(2024, 1, 1), date(2024, 1, 2)];
    seed_days(&store, "sensor.a", &days);
    seed_days(&store, "sensor.b", &days);
    store.fail_writes_for("sensor.a");

    let runner = build(&store, &spec(&["sensor.a", "sensor.b"])).await;
    let summary = runner.run_all_at(&day(2024, 1, 3)).await;

    assert!(summary.is_success());
    assert!(store.records_for(OUT, "sensor.a").is_empty());
    assert_eq!(store.records_for(OUT, "sensor.b").len(), 2);
}

#[tokio::test]
async fn test_resume_failure_marks_strategy_incomplete() {
    let store = Arc::new(MemoryStore::new(Berlin));
    let days = [date(2024, 1, 1), date(2024, 1, 2)];
    seed_days(&store, "sensor.a", &days);
    seed_days(&store, "sensor.b", &days);
    store.fail_resume_for("sensor.a");

    let runner = build(&store, &spec(&["sensor.a", "sensor.b"])).await;
    let summary = runner.run_all_at(&day(2024, 1, 3)).await;

    assert_eq!(store.records_for(OUT, "sensor.b").len(), 2);
    assert_eq!(summary.failed(), 1);
    assert!(matches!(
        &summary.outcomes[0],
        StrategyOutcome::Failed {
            error: AggregationError::Incomplete { failed_entities, .. },
            ..
        } if failed_entities == &vec!["sensor.a".to_string()]
    ));
}

#[tokio::test]
async fn test_missing_output_bucket_fails_before_any_store_call() {
    let store = Arc::new(MemoryStore::new(Berlin));
    let spec = ProcessingSpec::from_value(json!({
        "input_bucket": RAW,
        "entities_to_process": {
            "daily_aggregate": { "version": "v1", "entities": ["sensor.a"] }
        }
    }))
    .unwrap();

    let dyn_store: Arc<dyn TimeSeriesStore> = store.clone();
    let err = AggregationRunner::build(dyn_store, &spec, Berlin, Span::none())
        .await
        .unwrap_err();

    assert_eq!(err, ConfigError::MissingKeys(vec!["output_bucket".to_string()]));
    assert_eq!(store.call_count(), 0);
}

#[tokio::test]
async fn test_failed_first_day_lookup_skips_fresh_entities() {
    let store = Arc::new(MemoryStore::new(Berlin));
    seed_days(&store, "sensor.a", &[date(2024, 1, 1)]);
    store.fail_earliest_lookup();

    let runner = build(&store, &spec(&["sensor.a"])).await;
    let summary = runner.run_all_at(&day(2024, 1, 3)).await;

    assert!(summary.is_success());
    assert!(store.records(OUT).is_empty());
}

#[tokio::test]
async fn test_days_across_dst_transitions() {
    let store = Arc::new(MemoryStore::new(Berlin));
    let spring = [date(2024, 3, 30), date(2024, 3, 31), date(2024, 4, 1)];
    let autumn = [date(2024, 10, 26), date(2024, 10, 27), date(2024, 10, 28)];

    for (i, d) in spring.iter().chain(autumn.iter()).enumerate() {
        let total = 100.0 + i as f64;
        // First and last minutes of the local day belong to that day only
        store.insert_local_sample(RAW, "sensor.pv", "value", at(*d, 0, 1), total / 2.0);
        store.insert_local_sample(RAW, "sensor.pv", "value", at(*d, 23, 59), total);
    }

    let runner = build(&store, &spec(&["sensor.pv"])).await;
    runner.run_all_at(&day(2024, 10, 29)).await;

    let records = store.records_for(OUT, "sensor.pv");
    let written: Vec<(NaiveDate, f64)> = records
        .iter()
        .map(|r| (r.time.with_timezone(&Berlin).date_naive(), r.value))
        .collect();

    for (i, d) in spring.iter().chain(autumn.iter()).enumerate() {
        assert!(
            written.contains(&(*d, 100.0 + i as f64)),
            "missing or wrong value for {d}"
        );
    }

    // Every day between the two seeded ranges has no data and stays empty
    assert_eq!(records.len(), 6);
    for r in &records {
        let local = r.time.with_timezone(&Berlin);
        assert_eq!((local.hour(), local.minute(), local.second()), (23, 59, 59));
    }
}

#[tokio::test]
async fn test_processing_spec_from_toml() {
    let doc = r#"
        input_bucket = "HomeAssistant"
        output_bucket = "HomeAssistant_processed"

        [entities_to_process.daily_aggregate]
        version = "v1"
        entities = ["sensor.a", "sensor.b"]
    "#;

    let spec: ProcessingSpec = toml::from_str(doc).unwrap();
    let plan = spec.validate().unwrap();
    assert_eq!(plan.kinds[0].entities.len(), 2);
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[tokio::test]
async fn test_logs_are_attributed_to_entity() {
    let logs = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let store = Arc::new(MemoryStore::new(Berlin));
    seed_days(&store, "sensor.a", &[date(2024, 1, 1), date(2024, 1, 3)]);

    let dyn_store: Arc<dyn TimeSeriesStore> = store.clone();
    let runner = AggregationRunner::build(
        dyn_store,
        &spec(&["sensor.a"]),
        Berlin,
        tracing::info_span!("run"),
    )
    .await
    .unwrap();
    runner.run_all_at(&day(2024, 1, 4)).await;

    let output = logs.contents();
    assert!(output.contains("entity_id=sensor.a"), "{output}");
    assert!(output.contains("No raw data for sensor.a on 2024-01-02"), "{output}");
}
