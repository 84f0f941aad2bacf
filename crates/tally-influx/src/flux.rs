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

//! Flux query builders

use chrono::{DateTime, SecondsFormat, Utc};
use tally_core::SeriesTags;

/// Escape a value for use inside a Flux string literal
pub fn escape_string(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '$' if chars.peek() == Some(&'{') => escaped.push_str("\\$"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn time_literal(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn tag_filter(column: &str, value: &str) -> String {
    format!(
        "|> filter(fn: (r) => r[\"{}\"] == \"{}\")",
        escape_string(column),
        escape_string(value)
    )
}

/// Largest `field` value of `entity_id` in `[start, stop)`
pub fn day_max_query(
    bucket: &str,
    entity_id: &str,
    field: &str,
    start: DateTime<Utc>,
    stop: DateTime<Utc>,
) -> String {
    [
        format!("from(bucket: \"{}\")", escape_string(bucket)),
        format!(
            "|> range(start: {}, stop: {})",
            time_literal(start),
            time_literal(stop)
        ),
        tag_filter("entity_id", entity_id),
        tag_filter("_field", field),
        "|> keep(columns: [\"_time\", \"_value\"])".to_string(),
        "|> max()".to_string(),
        "|> limit(n: 1)".to_string(),
    ]
    .join("\n    ")
}

/// Last point of every series matching `tags`.
/// The scenario filter is only applied when a scenario is set.
pub fn latest_point_query(bucket: &str, tags: &SeriesTags) -> String {
    let mut lines = vec![
        format!("from(bucket: \"{}\")", escape_string(bucket)),
        "|> range(start: 0)".to_string(),
        tag_filter("version", &tags.version),
    ];
    if let Some(scenario) = &tags.scenario {
        lines.push(tag_filter("scenario", scenario));
    }
    lines.push(tag_filter("entity_id", &tags.entity_id));
    lines.push("|> last()".to_string());
    lines.join("\n    ")
}

/// First point of every series in the bucket
pub fn earliest_point_query(bucket: &str) -> String {
    [
        format!("from(bucket: \"{}\")", escape_string(bucket)),
        "|> range(start: 0)".to_string(),
        "|> first()".to_string(),
    ]
    .join("\n    ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string("sensor.a"), "sensor.a");
        assert_eq!(escape_string(r#"a"b"#), r#"a\"b"#);
        assert_eq!(escape_string(r"a\b"), r"a\\b");
        assert_eq!(escape_string("${x}"), "\\${x}");
        assert_eq!(escape_string("$5"), "$5");
    }

    #[test]
    fn test_day_max_query() {
        let start = Utc.with_ymd_and_hms(2024, 3, 30, 23, 0, 0).unwrap();
        let stop = Utc.with_ymd_and_hms(2024, 3, 31, 22, 0, 0).unwrap();
        let query = day_max_query("HomeAssistant", "sensor.pv", "value", start, stop);

        assert!(query.starts_with("from(bucket: \"HomeAssistant\")"));
        assert!(
            query.contains("|> range(start: 2024-03-30T23:00:00Z, stop: 2024-03-31T22:00:00Z)")
        );
        assert!(query.contains("r[\"entity_id\"] == \"sensor.pv\""));
        assert!(query.contains("r[\"_field\"] == \"value\""));
        assert!(query.contains("|> max()"));
    }

    #[test]
    fn test_latest_point_query_scenario_optional() {
        let tags = SeriesTags::new("sensor.pv", "v1");
        let query = latest_point_query("processed", &tags);
        assert!(query.contains("r[\"version\"] == \"v1\""));
        assert!(!query.contains("scenario"));
        assert!(query.ends_with("|> last()"));

        let tags = tags.with_scenario(Some("8_modules".to_string()));
        let query = latest_point_query("processed", &tags);
        assert!(query.contains("r[\"scenario\"] == \"8_modules\""));
    }

    #[test]
    fn test_bucket_name_is_escaped() {
        let query = earliest_point_query("raw\") |> drop(");
        assert!(query.starts_with("from(bucket: \"raw\\\") |> drop(\")"));
    }
}
