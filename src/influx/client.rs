use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

use super::response::{self, FluxTable};
use super::{StoredPoint, TimeSeriesStore};
use crate::config::Config;
use crate::error::{AppError, AppResult};

pub struct InfluxClient {
    http_client: Client,
    base_url: String,
    token: String,
    org: String,
    bucket: String,
}

impl InfluxClient {
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the HTTP client cannot be built.
    pub fn new(config: &Config) -> AppResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {e}")))?;

        tracing::info!(
            url = %config.influxdb_url,
            org = %config.influxdb_org,
            bucket = %config.influxdb_bucket,
            "InfluxDB client configured"
        );

        Ok(Self {
            http_client,
            base_url: config.influxdb_url.trim_end_matches('/').to_string(),
            token: config.influxdb_token.clone(),
            org: config.influxdb_org.clone(),
            bucket: config.influxdb_bucket.clone(),
        })
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.token)
    }

    async fn error_from(response: reqwest::Response) -> AppError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        // InfluxDB reports errors as {"code": ..., "message": ...}
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or(body);
        AppError::Store(format!("HTTP {status}: {message}"))
    }
}

impl TimeSeriesStore for InfluxClient {
    async fn write_points(&self, points: &[StoredPoint]) -> AppResult<()> {
        let body = points
            .iter()
            .filter_map(StoredPoint::to_line_protocol)
            .collect::<Vec<_>>()
            .join("\n");

        if body.is_empty() {
            tracing::debug!("No points to write");
            return Ok(());
        }

        let response = self
            .http_client
            .post(format!("{}/api/v2/write", self.base_url))
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "ns"),
            ])
            .header(AUTHORIZATION, self.auth_header())
            .header(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            )
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::Store(format!("Write request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        Ok(())
    }

    async fn query(&self, flux: &str) -> AppResult<Vec<FluxTable>> {
        tracing::debug!(query = %flux, "Sending Flux query");

        let response = self
            .http_client
            .post(format!("{}/api/v2/query", self.base_url))
            .query(&[("org", self.org.as_str())])
            .header(AUTHORIZATION, self.auth_header())
            .header(ACCEPT, HeaderValue::from_static("application/csv"))
            .json(&json!({
                "query": flux,
                "type": "flux",
                "dialect": {
                    "header": true,
                    "delimiter": ",",
                    "annotations": [],
                },
            }))
            .send()
            .await
            .map_err(|e| AppError::Store(format!("Query request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::Store(format!("Failed to read query response: {e}")))?;

        response::parse_flux_csv(&body)
    }
}
