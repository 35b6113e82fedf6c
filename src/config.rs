use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::error::ConfigError;
use crate::paths::AppPaths;
use crate::snapshot::RunHandle;

/// Fixed pull period. Trades responsiveness against server load; not configurable.
pub const POLL_PERIOD: Duration = Duration::from_millis(2000);

/// Connection settings for the training backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Origin of the training backend, e.g. `http://127.0.0.1:8000`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Full push channel URL. Derived from `base_url` when absent.
    #[serde(default)]
    pub push_url: Option<String>,
    /// How long the push channel stays open after `training_complete`.
    #[serde(default = "default_completion_grace_ms")]
    pub completion_grace_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_completion_grace_ms() -> u64 {
    1000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            push_url: None,
            completion_grace_ms: default_completion_grace_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl MonitorConfig {
    /// Defaults plus environment overrides.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_overrides(|key| std::env::var(key).ok());
        cfg
    }

    /// Reads `config.json` from the app data directory when it exists, then
    /// applies environment overrides.
    pub fn load(paths: &AppPaths) -> Result<Self, ConfigError> {
        let path = paths.config_file();
        let mut cfg = if path.exists() {
            Self::from_file(&path)?
        } else {
            debug!("No config file at {:?}, using defaults", path);
            Self::default()
        };
        cfg.apply_overrides(|key| std::env::var(key).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies `TRAINWATCH_*` overrides from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // TRAINWATCH_BASE_URL=https://train.example.com
        if let Some(v) = lookup("TRAINWATCH_BASE_URL") {
            let v = v.trim();
            if !v.is_empty() {
                self.base_url = v.to_string();
            }
        }

        // TRAINWATCH_PUSH_URL=wss://train.example.com/ws/training
        if let Some(v) = lookup("TRAINWATCH_PUSH_URL") {
            let v = v.trim();
            self.push_url = (!v.is_empty()).then(|| v.to_string());
        }

        // TRAINWATCH_GRACE_MS=1000
        if let Some(v) = lookup("TRAINWATCH_GRACE_MS") {
            match v.trim().parse::<u64>() {
                Ok(ms) => self.completion_grace_ms = ms,
                Err(_) => warn!("Ignoring TRAINWATCH_GRACE_MS={v:?}"),
            }
        }

        // TRAINWATCH_TIMEOUT_MS=10000
        if let Some(v) = lookup("TRAINWATCH_TIMEOUT_MS") {
            match v.trim().parse::<u64>() {
                Ok(ms) => self.request_timeout_ms = ms.max(1),
                Err(_) => warn!("Ignoring TRAINWATCH_TIMEOUT_MS={v:?}"),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for url in std::iter::once(&self.base_url).chain(self.push_url.as_ref()) {
            Url::parse(url).map_err(|source| ConfigError::BaseUrl {
                url: url.clone(),
                source,
            })?;
        }
        Ok(())
    }

    pub fn completion_grace(&self) -> Duration {
        Duration::from_millis(self.completion_grace_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// `ws(s)://<host>/ws/training?runId=<id>`
    pub fn push_endpoint(&self, run: &RunHandle) -> Result<Url, url::ParseError> {
        let mut url = match &self.push_url {
            Some(explicit) => Url::parse(explicit)?,
            None => {
                let mut url = with_segments(Url::parse(&self.base_url)?, &["ws", "training"])?;
                let scheme = match url.scheme() {
                    "https" | "wss" => "wss",
                    _ => "ws",
                };
                url.set_scheme(scheme)
                    .map_err(|_| url::ParseError::EmptyHost)?;
                url
            }
        };
        url.query_pairs_mut().append_pair("runId", run.as_str());
        Ok(url)
    }

    /// `GET <base>/models/oneseek-certified/<runId>/live_metrics.json?t=<cache_buster>`
    pub fn live_metrics_endpoint(
        &self,
        run: &RunHandle,
        cache_buster: u64,
    ) -> Result<Url, url::ParseError> {
        let mut url = with_segments(
            Url::parse(&self.base_url)?,
            &["models", "oneseek-certified", run.as_str(), "live_metrics.json"],
        )?;
        url.query_pairs_mut()
            .append_pair("t", &cache_buster.to_string());
        Ok(url)
    }

    /// `GET <base>/api/admin/training/status`
    pub fn status_endpoint(&self) -> Result<Url, url::ParseError> {
        with_segments(
            Url::parse(&self.base_url)?,
            &["api", "admin", "training", "status"],
        )
    }
}

fn with_segments(mut url: Url, segments: &[&str]) -> Result<Url, url::ParseError> {
    url.set_query(None);
    url.path_segments_mut()
        .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
