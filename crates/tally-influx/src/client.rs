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

use crate::annotated::{FluxRecord, parse_records};
use crate::config::InfluxSettings;
use crate::errors::{InfluxError, InfluxResult};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, error, trace, warn};

/// InfluxDB 2.x HTTP API client
#[derive(Clone)]
pub struct InfluxClient {
    base_url: String,
    token: String,
    org: String,
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl std::fmt::Debug for InfluxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfluxClient")
            .field("base_url", &self.base_url)
            .field("org", &self.org)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}

impl InfluxClient {
    pub fn new(settings: &InfluxSettings) -> InfluxResult<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| InfluxError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: settings.url.clone(),
            token: settings.token.clone(),
            org: settings.org.clone(),
            client,
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
        })
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.token)
    }

    /// Check `/health`; anything but status "pass" is an error
    pub async fn health(&self) -> InfluxResult<()> {
        let url = format!("{}/health", self.base_url);
        debug!("🩺 [INFLUX HEALTH] Checking {}", url);

        let response = self
            .retry_request(|| async { self.client.get(&url).send().await })
            .await?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let reported = body.get("status").and_then(Value::as_str).unwrap_or("unknown");
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if status.is_success() && reported == "pass" {
            debug!("✅ [INFLUX HEALTH] {} ({})", reported, message);
            Ok(())
        } else {
            warn!("⚠️ [INFLUX HEALTH] Status {}: {} {}", status, reported, message);
            Err(InfluxError::Unhealthy(format!("{status}: {reported} {message}")))
        }
    }

    /// Run a Flux query and return all data rows of all result tables
    pub async fn query(&self, flux: &str) -> InfluxResult<Vec<FluxRecord>> {
        let url = format!("{}/api/v2/query", self.base_url);
        debug!("🔍 [INFLUX QUERY] Executing query");
        trace!("   Flux:\n{}", flux);

        let body = json!({
            "query": flux,
            "type": "flux",
            "dialect": {
                "header": true,
                "annotations": ["datatype", "group", "default"],
                "delimiter": ",",
            }
        });

        let response = self
            .retry_request(|| async {
                self.client
                    .post(&url)
                    .query(&[("org", self.org.as_str())])
                    .header("Authorization", self.auth_header())
                    .header("Accept", "application/csv")
                    .json(&body)
                    .send()
                    .await
            })
            .await?;

        match response.status() {
            StatusCode::OK => {
                let text = response.text().await?;
                let records = parse_records(&text)?;
                debug!("✅ [INFLUX QUERY] {} rows", records.len());
                Ok(records)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                error!("❌ [INFLUX QUERY] Authentication failed");
                Err(InfluxError::AuthenticationFailed)
            }
            status => {
                let error_text = response.text().await.unwrap_or_default();
                error!("❌ [INFLUX QUERY] Status {}: {}", status, error_text);
                Err(InfluxError::ApiError {
                    status: status.as_u16(),
                    message: error_text,
                })
            }
        }
    }

    /// Write line protocol with second precision
    pub async fn write(&self, bucket: &str, lines: &str) -> InfluxResult<()> {
        let url = format!("{}/api/v2/write", self.base_url);
        debug!("💾 [INFLUX WRITE] {} -> '{}'", lines, bucket);

        let response = self
            .retry_request(|| async {
                self.client
                    .post(&url)
                    .query(&[
                        ("org", self.org.as_str()),
                        ("bucket", bucket),
                        ("precision", "s"),
                    ])
                    .header("Authorization", self.auth_header())
                    .header("Content-Type", "text/plain; charset=utf-8")
                    .body(lines.to_string())
                    .send()
                    .await
            })
            .await?;

        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::OK => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                error!("❌ [INFLUX WRITE] Authentication failed for bucket '{}'", bucket);
                Err(InfluxError::AuthenticationFailed)
            }
            status => {
                let error_text = response.text().await.unwrap_or_default();
                error!("❌ [INFLUX WRITE] Status {}: {}", status, error_text);
                Err(InfluxError::ApiError {
                    status: status.as_u16(),
                    message: error_text,
                })
            }
        }
    }

    /// Retry a request with exponential backoff
    async fn retry_request<F, Fut>(&self, mut request_fn: F) -> InfluxResult<reqwest::Response>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let mut attempts = 0;
        let mut delay = self.retry_delay;

        loop {
            attempts += 1;
            match request_fn().await {
                Ok(response) => return Ok(response),
                Err(e) if attempts >= self.max_retries => {
                    error!("Request failed after {} attempts: {}", attempts, e);
                    return Err(InfluxError::HttpError(e));
                }
                Err(e) => {
                    warn!(
                        "Request failed (attempt {}/{}): {}. Retrying in {:?}",
                        attempts, self.max_retries, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }

    /// Set custom retry configuration
    #[must_use]
    pub fn with_retry_config(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.retry_delay = retry_delay;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn client(url: &str) -> InfluxClient {
        InfluxClient::new(&InfluxSettings::new(url, "test_token", "home"))
            .unwrap()
            .with_retry_config(2, Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_health_pass() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/health")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"name":"influxdb","message":"ready for queries and writes","status":"pass"}"#,
            )
            .create_async()
            .await;

        assert!(client(&server.url()).health().await.is_ok());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_health_fail() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/health")
            .with_status(503)
            .with_body(r#"{"status":"fail","message":"starting"}"#)
            .create_async()
            .await;

        let err = client(&server.url()).health().await.unwrap_err();
        assert!(matches!(err, InfluxError::Unhealthy(_)));
    }

    #[tokio::test]
    async fn test_query_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v2/query")
            .match_query(Matcher::UrlEncoded("org".into(), "home".into()))
            .match_header("authorization", "Token test_token")
            .match_body(Matcher::PartialJson(serde_json::json!({"type": "flux"})))
            .with_status(200)
            .with_header("content-type", "text/csv")
            .with_body(",result,table,_time,_value\n,_result,0,2024-01-01T21:00:00Z,4.2\n")
            .create_async()
            .await;

        let records = client(&server.url()).query("from(bucket: \"raw\")").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value_f64().unwrap(), Some(4.2));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_query_unauthorized() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v2/query")
            .match_query(Matcher::Any)
            .with_status(401)
            .create_async()
            .await;

        let err = client(&server.url()).query("buckets()").await.unwrap_err();
        assert!(matches!(err, InfluxError::AuthenticationFailed));
    }

    #[tokio::test]
    async fn test_write_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v2/write")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("org".into(), "home".into()),
                Matcher::UrlEncoded("bucket".into(), "processed".into()),
                Matcher::UrlEncoded("precision".into(), "s".into()),
            ]))
            .match_header("authorization", "Token test_token")
            .match_body("m,entity_id=a f=1.0 1")
            .with_status(204)
            .create_async()
            .await;

        client(&server.url())
            .write("processed", "m,entity_id=a f=1.0 1")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_write_rejected() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v2/write")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"code":"invalid","message":"field type conflict"}"#)
            .create_async()
            .await;

        let err = client(&server.url()).write("processed", "m f=1.0 1").await.unwrap_err();
        assert!(matches!(
            err,
            InfluxError::ApiError { status: 400, ref message } if message.contains("conflict")
        ));
    }

    #[tokio::test]
    async fn test_unreachable_after_retries() {
        // Nothing listens on port 9 (discard) in test environments
        let err = client("http://127.0.0.1:9").health().await.unwrap_err();
        assert!(matches!(err, InfluxError::HttpError(_)));
    }
}
