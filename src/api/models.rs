use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::AppError;

const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;
const DEFAULT_QUALITY: &str = "best";

/// Body of `POST /download_video`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StartRequest {
    #[serde(rename = "videoUrl")]
    pub video_url: String,
    pub resolution: String,
}

/// Response from `POST /download_video`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StartResponse {
    #[serde(default)]
    pub video_id: Option<String>,
    #[serde(default)]
    pub video_name: Option<String>,
}

/// Response from `GET /history`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub history: BTreeMap<String, String>,
}

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Single origin serving initiation, progress and history.
    pub base_url: Url,
    /// `None` keeps a silent progress stream open forever.
    pub idle_timeout: Option<Duration>,
    pub default_quality: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BACKEND_URL).expect("default backend url is valid"),
            idle_timeout: Some(Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS)),
            default_quality: DEFAULT_QUALITY.to_string(),
        }
    }
}

impl ApiConfig {
    /// Reads `DOWNLOADER_*` variables. Invalid values fall back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup("DOWNLOADER_BACKEND_URL") {
            match parse_base_url(&raw) {
                Ok(url) => config.base_url = url,
                Err(e) => tracing::warn!("{}, using {}", e, config.base_url),
            }
        }

        if let Some(raw) = lookup("DOWNLOADER_IDLE_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(0) => config.idle_timeout = None,
                Ok(secs) => config.idle_timeout = Some(Duration::from_secs(secs)),
                Err(_) => tracing::warn!(
                    "DOWNLOADER_IDLE_TIMEOUT_SECS={:?} is not a number, using {}s",
                    raw,
                    DEFAULT_IDLE_TIMEOUT_SECS
                ),
            }
        }

        if let Some(raw) = lookup("DOWNLOADER_DEFAULT_QUALITY") {
            if !raw.trim().is_empty() {
                config.default_quality = raw.trim().to_string();
            }
        }

        config
    }
}

fn parse_base_url(raw: &str) -> Result<Url, AppError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| AppError::Config(format!("invalid backend url {:?}: {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" if !url.cannot_be_a_base() => Ok(url),
        _ => Err(AppError::Config(format!(
            "backend url {:?} must be an http(s) base url",
            raw
        ))),
    }
}
