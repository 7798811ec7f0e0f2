use std::collections::VecDeque;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Client;
use thiserror::Error;
use url::Url;

use super::models::{ApiConfig, HistoryResponse, StartRequest, StartResponse};
use super::sse::{SseDecoder, SseEvent};
use crate::application::MessageSource;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Backend url cannot carry a path: {0}")]
    InvalidBaseUrl(Url),

    #[error("Event stream failed: {0}")]
    Stream(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Clone)]
pub struct ApiClient {
    config: ApiConfig,
    http: Client,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.config.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidBaseUrl(self.config.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Ask the backend to start a download. Returns the job id.
    pub async fn start_download(&self, video_url: &str, resolution: &str) -> Result<String> {
        let url = self.endpoint(&["download_video"])?;
        let body = StartRequest {
            video_url: video_url.to_string(),
            resolution: resolution.to_string(),
        };

        tracing::debug!("POST {} ({})", url, resolution);
        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| ApiError::ApiError(format!("Start request failed: {}", e)))?;

        let json: StartResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("JSON decode error: {}", e)))?;

        if let Some(name) = &json.video_name {
            tracing::debug!("Backend named the job {:?}", name);
        }

        json.video_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ApiError::InvalidResponse("missing video_id".to_string()))
    }

    /// Open the progress event stream for a job.
    pub async fn subscribe_progress(&self, job_id: &str) -> Result<ProgressSubscription> {
        let url = self.endpoint(&["progress", job_id])?;

        tracing::debug!("GET {} (event stream)", url);
        let response = self
            .http
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?
            .error_for_status()
            .map_err(|e| ApiError::ApiError(format!("Progress request failed: {}", e)))?;

        let stream = response
            .bytes_stream()
            .map_err(|e| ApiError::Stream(e.to_string()))
            .boxed();

        Ok(ProgressSubscription::new(stream))
    }

    /// Fetch the backend's download history, sorted by job id.
    pub async fn fetch_history(&self) -> Result<Vec<(String, String)>> {
        let url = self.endpoint(&["history"])?;

        let response = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| ApiError::ApiError(format!("History request failed: {}", e)))?;

        let json: HistoryResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("JSON decode error: {}", e)))?;

        Ok(json.history.into_iter().collect())
    }
}

/// An open `text/event-stream` response, decoded into message payloads.
pub struct ProgressSubscription {
    stream: Option<BoxStream<'static, Result<bytes::Bytes>>>,
    decoder: SseDecoder,
    pending: VecDeque<SseEvent>,
}

impl ProgressSubscription {
    fn new(stream: BoxStream<'static, Result<bytes::Bytes>>) -> Self {
        Self {
            stream: Some(stream),
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
        }
    }
}

impl MessageSource for ProgressSubscription {
    fn next_message(&mut self) -> BoxFuture<'_, Option<Result<String>>> {
        Box::pin(async move {
            loop {
                if let Some(event) = self.pending.pop_front() {
                    if event.is_message() {
                        tracing::trace!("SSE message (id {:?})", event.id);
                        return Some(Ok(event.data));
                    }
                    tracing::debug!("Skipping {:?} event", event.event);
                    continue;
                }

                let next = match self.stream.as_mut() {
                    Some(stream) => stream.next().await,
                    None => return None,
                };

                match next {
                    Some(Ok(chunk)) => match self.decoder.feed(&chunk) {
                        Ok(events) => self.pending.extend(events),
                        Err(e) => {
                            self.stream = None;
                            return Some(Err(ApiError::Stream(e.to_string())));
                        }
                    },
                    Some(Err(e)) => return Some(Err(e)),
                    None => {
                        if let Some(ms) = self.decoder.retry_ms() {
                            tracing::debug!("Server suggested a {}ms retry, not reconnecting", ms);
                        }
                        self.stream = None;
                        return None;
                    }
                }
            }
        })
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("Progress stream closed");
        }
        self.pending.clear();
    }
}
