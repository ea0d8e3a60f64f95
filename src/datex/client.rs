use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{FeedDocument, FeedSource};
use crate::config::{Config, FeedMode};
use crate::error::{AppError, AppResult};

/// Client for the DATEX II SOAP pull service, or for cached sample documents
/// when running in file mode.
pub struct DatexClient {
    http_client: Client,
    mode: FeedMode,
    pull_url: String,
    auth_token: Option<String>,
    mst_payload_path: PathBuf,
    msr_payload_path: PathBuf,
    mst_sample_path: PathBuf,
    msr_sample_path: PathBuf,
}

impl DatexClient {
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the HTTP client cannot be built.
    pub fn new(config: &Config) -> AppResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            mode: config.feed_mode,
            pull_url: config.datex_pull_url.clone(),
            auth_token: config.datex_auth_token.clone(),
            mst_payload_path: config.mst_payload_path.clone(),
            msr_payload_path: config.msr_payload_path.clone(),
            mst_sample_path: config.mst_sample_path.clone(),
            msr_sample_path: config.msr_sample_path.clone(),
        })
    }

    async fn read_file(path: &Path) -> AppResult<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to read {}: {e}", path.display())))
    }

    /// Pull a document from the upstream SOAP endpoint.
    ///
    /// Returns `Ok(None)` without any request when no token is configured.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Upstream` if the payload cannot be read, the request
    /// fails, or the service answers with an error status.
    pub async fn pull(&self, document: FeedDocument) -> AppResult<Option<Vec<u8>>> {
        let Some(token) = self.auth_token.as_deref() else {
            tracing::warn!(
                operation = document.soap_operation(),
                "No OPEN_TRANSPORT_DATA_AUTH_TOKEN configured, skipping upstream pull"
            );
            return Ok(None);
        };

        let payload_path = match document {
            FeedDocument::SiteTable => &self.mst_payload_path,
            FeedDocument::MeasuredData => &self.msr_payload_path,
        };
        let payload = Self::read_file(payload_path).await?;

        let soap_action = format!(
            "http://opentransportdata.swiss/TDP/Soap_Datex2/Pull/v1/{}",
            document.soap_operation()
        );

        let response = self
            .http_client
            .post(&self.pull_url)
            .bearer_auth(token)
            .header(
                CONTENT_TYPE,
                HeaderValue::from_static("text/xml; charset=utf-8"),
            )
            .header("SOAPAction", soap_action)
            .body(payload)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Request failed: {e}")))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::Upstream("Rate limited (429)".to_string()));
        }

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to read response body: {e}")))?;

        tracing::debug!(
            operation = document.soap_operation(),
            bytes = body.len(),
            "Pulled DATEX II document"
        );
        Ok(Some(body.to_vec()))
    }
}

impl FeedSource for DatexClient {
    async fn fetch(&self, document: FeedDocument) -> AppResult<Option<Vec<u8>>> {
        match self.mode {
            FeedMode::Live => self.pull(document).await,
            FeedMode::File => {
                let path = match document {
                    FeedDocument::SiteTable => &self.mst_sample_path,
                    FeedDocument::MeasuredData => &self.msr_sample_path,
                };
                Self::read_file(path).await.map(Some)
            }
        }
    }
}
