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

//! Annotated CSV responses of the Flux query endpoint
//!
//! A response holds one or more tables. Each table starts with annotation
//! rows (`#datatype`, `#group`, `#default`) followed by a header row and data
//! rows. The first column is reserved for annotations and is empty on data
//! rows.

use crate::errors::{InfluxError, InfluxResult};
use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord};
use std::collections::HashMap;

/// One data row with its column values keyed by header name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FluxRecord {
    values: HashMap<String, String>,
}

impl FluxRecord {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values
            .get(column)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn time(&self) -> InfluxResult<Option<DateTime<Utc>>> {
        self.get("_time")
            .map(|raw| {
                DateTime::parse_from_rfc3339(raw)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| InfluxError::InvalidResponse(format!("bad _time '{raw}': {e}")))
            })
            .transpose()
    }

    pub fn value_f64(&self) -> InfluxResult<Option<f64>> {
        self.get("_value")
            .map(|raw| {
                raw.parse::<f64>().map_err(|_| {
                    InfluxError::InvalidResponse(format!("non-numeric _value '{raw}'"))
                })
            })
            .transpose()
    }
}

fn is_header(record: &StringRecord) -> bool {
    record.iter().any(|f| f == "result") && record.iter().any(|f| f == "table")
}

fn is_error_header(record: &StringRecord) -> bool {
    record.get(1) == Some("error")
}

/// Parse every data row of every table in the response body
pub fn parse_records(body: &str) -> InfluxResult<Vec<FluxRecord>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(body.as_bytes());

    let mut header: Option<StringRecord> = None;
    let mut in_error_table = false;
    let mut records = Vec::new();

    for row in reader.records() {
        let row = row.map_err(|e| InfluxError::InvalidResponse(format!("invalid CSV: {e}")))?;

        if row.iter().all(str::is_empty) {
            continue;
        }
        if is_error_header(&row) {
            in_error_table = true;
            continue;
        }
        if in_error_table {
            let message = row.get(1).unwrap_or("unknown error").to_string();
            return Err(InfluxError::QueryError(message));
        }
        if is_header(&row) {
            header = Some(row);
            continue;
        }

        let Some(columns) = &header else {
            return Err(InfluxError::InvalidResponse(
                "data row before header row".to_string(),
            ));
        };

        let values = columns
            .iter()
            .zip(row.iter())
            .filter(|(name, _)| !name.is_empty())
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        records.push(FluxRecord { values });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const TWO_TABLES: &str = "\
#datatype,string,long,dateTime:RFC3339,double,string
#group,false,false,false,false,true
#default,_result,,,,
,result,table,_time,_value,entity_id
,,0,2024-01-01T22:59:59Z,12.5,sensor.a

#datatype,string,long,dateTime:RFC3339,double,string
#group,false,false,false,false,true
#default,_result,,,,
,result,table,_time,_value,entity_id
,,1,2024-01-02T22:59:59Z,3,sensor.b
";

    #[test]
    fn test_parse_multiple_tables() {
        let records = parse_records(TWO_TABLES).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].get("entity_id"), Some("sensor.a"));
        assert_eq!(records[0].value_f64().unwrap(), Some(12.5));
        assert_eq!(
            records[0].time().unwrap(),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 22, 59, 59).unwrap())
        );
        assert_eq!(records[1].get("table"), Some("1"));
        assert_eq!(records[1].value_f64().unwrap(), Some(3.0));
    }

    #[test]
    fn test_parse_empty_body() {
        assert!(parse_records("").unwrap().is_empty());
        assert!(parse_records("\r\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_crlf() {
        let body = ",result,table,_time,_value\r\n,_result,0,2024-05-01T10:00:00Z,1.5\r\n\r\n";
        let records = parse_records(body).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value_f64().unwrap(), Some(1.5));
    }

    #[test]
    fn test_error_table() {
        let body = "\
#datatype,string,string
#group,true,true
#default,,
,error,reference
,\"panic: runtime error\",
";
        let err = parse_records(body).unwrap_err();
        assert!(matches!(err, InfluxError::QueryError(ref msg) if msg == "panic: runtime error"));
    }

    #[test]
    fn test_non_numeric_value() {
        let body = ",result,table,_time,_value\n,,0,2024-05-01T10:00:00Z,unavailable\n";
        let records = parse_records(body).unwrap();
        assert!(matches!(
            records[0].value_f64(),
            Err(InfluxError::InvalidResponse(_))
        ));
    }
}
