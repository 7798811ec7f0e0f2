use std::future::Future;
use std::time::Duration;

use futures::{stream::BoxStream, StreamExt};
use tokio_util::sync::CancellationToken;

use super::progress_tracker;
use crate::{
    api::{ApiClient, ApiError},
    domain::{AppError, DownloadRequest, HistoryEntry, JobHandle, StatusEvent},
};

#[derive(Clone)]
pub struct DownloadCoordinator {
    api_client: ApiClient,
    idle_timeout: Option<Duration>,
}

impl DownloadCoordinator {
    pub fn new(api_client: ApiClient) -> Self {
        let idle_timeout = api_client.config().idle_timeout;
        Self {
            api_client,
            idle_timeout,
        }
    }

    pub fn default_quality(&self) -> &str {
        &self.api_client.config().default_quality
    }

    pub async fn initiate(&self, request: DownloadRequest) -> Result<JobHandle, AppError> {
        tracing::info!(
            "Starting download of {} ({})",
            request.target(),
            request.quality()
        );

        let job_id = self
            .api_client
            .start_download(request.target(), request.quality())
            .await
            .map_err(|e| {
                tracing::error!("Fetch error: {}", e);
                request_error(e)
            })?;

        tracing::info!("Download started with id {}", job_id);
        Ok(JobHandle::new(job_id))
    }

    /// Subscribe to a job's progress. The stream ends after its terminal event.
    ///
    /// Opening the subscription is bounded by the idle timeout and gives way
    /// to the token, like every later read.
    pub fn track(
        &self,
        job: JobHandle,
        token: CancellationToken,
    ) -> BoxStream<'static, StatusEvent> {
        let client = self.api_client.clone();
        let idle_timeout = self.idle_timeout;

        futures::stream::once(async move {
            let opening = client.subscribe_progress(&job.job_id);
            match guarded(opening, idle_timeout, &token).await {
                Guarded::Done(Ok(subscription)) => {
                    progress_tracker::track(subscription, job, idle_timeout, token)
                }
                Guarded::Done(Err(e)) => {
                    tracing::error!("EventSource error for {}: {}", job.job_id, e);
                    single(StatusEvent::Failed(AppError::Transport(e.to_string())))
                }
                Guarded::TimedOut(idle) => {
                    tracing::error!(
                        "Progress stream for {} did not open within {:?}",
                        job.job_id,
                        idle
                    );
                    single(StatusEvent::Failed(AppError::IdleTimeout(idle)))
                }
                Guarded::Cancelled => {
                    tracing::info!("Tracking of {} cancelled before it opened", job.job_id);
                    single(StatusEvent::Cancelled)
                }
            }
        })
        .flatten()
        .boxed()
    }

    /// Initiate then track, as one stream of status events.
    ///
    /// A failed initiation yields a single `Failed` event and never opens a
    /// progress subscription.
    pub fn run(
        &self,
        request: DownloadRequest,
        token: CancellationToken,
    ) -> BoxStream<'static, StatusEvent> {
        let coordinator = self.clone();

        futures::stream::once(async move {
            let starting = coordinator.initiate(request);
            let job = match guarded(starting, coordinator.idle_timeout, &token).await {
                Guarded::Done(Ok(job)) => job,
                Guarded::Done(Err(e)) => return single(StatusEvent::Failed(e)),
                Guarded::TimedOut(idle) => {
                    tracing::error!("Backend did not answer the start request within {:?}", idle);
                    return single(StatusEvent::Failed(AppError::IdleTimeout(idle)));
                }
                Guarded::Cancelled => {
                    tracing::info!("Download cancelled before the backend answered");
                    return single(StatusEvent::Cancelled);
                }
            };

            futures::stream::iter([StatusEvent::Started(job.clone())])
                .chain(coordinator.track(job, token))
                .boxed()
        })
        .flatten()
        .boxed()
    }

    pub async fn history(&self) -> Result<Vec<HistoryEntry>, AppError> {
        let entries = self
            .api_client
            .fetch_history()
            .await
            .map_err(|e| AppError::Request(e.to_string()))?;

        Ok(entries
            .into_iter()
            .map(|(job_id, status)| HistoryEntry { job_id, status })
            .collect())
    }
}

enum Guarded<T> {
    Done(T),
    TimedOut(Duration),
    Cancelled,
}

/// Race a request against the job's token and idle timeout.
async fn guarded<F: Future>(
    request: F,
    idle_timeout: Option<Duration>,
    token: &CancellationToken,
) -> Guarded<F::Output> {
    let bounded = async move {
        match idle_timeout {
            Some(idle) => tokio::time::timeout(idle, request).await.map_err(|_| idle),
            None => Ok(request.await),
        }
    };

    tokio::select! {
        biased;
        _ = token.cancelled() => Guarded::Cancelled,
        result = bounded => match result {
            Ok(output) => Guarded::Done(output),
            Err(idle) => Guarded::TimedOut(idle),
        },
    }
}

fn single(event: StatusEvent) -> BoxStream<'static, StatusEvent> {
    futures::stream::iter([event]).boxed()
}

fn request_error(error: ApiError) -> AppError {
    match error {
        ApiError::ApiError(msg) | ApiError::InvalidResponse(msg) => AppError::Request(msg),
        other => AppError::Request(other.to_string()),
    }
}
