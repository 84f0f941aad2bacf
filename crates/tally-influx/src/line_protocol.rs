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

//! Line protocol encoding for aggregate writes

use crate::errors::{InfluxError, InfluxResult};
use chrono::{DateTime, Utc};
use tally_core::AggregatePoint;

fn escape(value: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub fn escape_measurement(value: &str) -> String {
    escape(value, &[',', ' '])
}

/// Escaping for tag keys, tag values and field keys
pub fn escape_key(value: &str) -> String {
    escape(value, &[',', '=', ' '])
}

/// Encode one point with second precision.
///
/// Tags are written sorted by key; empty tags are left out.
pub fn encode_point(
    measurement: &str,
    point: &AggregatePoint,
    time: DateTime<Utc>,
) -> InfluxResult<String> {
    if !point.value.is_finite() {
        return Err(InfluxError::ConfigError(format!(
            "cannot write non-finite value {} for {}",
            point.value, point.tags
        )));
    }

    let mut tags: Vec<(&str, &str)> = vec![
        ("entity_id", point.tags.entity_id.as_str()),
        ("unit", point.unit.as_str()),
        ("version", point.tags.version.as_str()),
    ];
    if let Some(scenario) = &point.tags.scenario {
        tags.push(("scenario", scenario.as_str()));
    }
    tags.retain(|(_, v)| !v.is_empty());
    tags.sort_by_key(|(k, _)| *k);

    let mut line = escape_measurement(measurement);
    for (key, value) in tags {
        line.push(',');
        line.push_str(&escape_key(key));
        line.push('=');
        line.push_str(&escape_key(value));
    }

    Ok(format!(
        "{line} {}={:?} {}",
        escape_key(&point.field),
        point.value,
        time.timestamp()
    ))
}
