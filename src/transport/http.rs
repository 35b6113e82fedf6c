use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::header::CACHE_CONTROL;
use serde::de::DeserializeOwned;
use url::Url;

use super::TelemetrySource;
use crate::config::MonitorConfig;
use crate::error::FetchError;
use crate::snapshot::RunHandle;
use crate::wire::{MetricsPayload, StatusPayload};

/// Pull endpoints over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    config: Arc<MonitorConfig>,
}

impl HttpSource {
    pub fn new(config: Arc<MonitorConfig>) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { client, config })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        endpoint: &'static str,
    ) -> Result<T, FetchError> {
        let response = self
            .client
            .get(url)
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

impl TelemetrySource for HttpSource {
    async fn live_metrics(&self, run: &RunHandle) -> Result<MetricsPayload, FetchError> {
        let url = self.config.live_metrics_endpoint(run, cache_buster())?;
        self.get_json(url, "live metrics").await
    }

    async fn training_status(&self) -> Result<StatusPayload, FetchError> {
        let url = self.config.status_endpoint()?;
        self.get_json(url, "training status").await
    }
}

/// Milliseconds since the epoch; defeats intermediary caches.
fn cache_buster() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
