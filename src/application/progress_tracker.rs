use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::{
    api,
    domain::{AppError, JobHandle, ParseError, ProgressSnapshot, StatusEvent, TrackerPhase},
};

const COMPLETE: &str = "complete";
const REMOTE_ERROR_PREFIX: &str = "Error occurred:";

/// A one-way push channel delivering text messages until closed.
pub trait MessageSource: Send {
    /// `None` once the channel has ended.
    fn next_message(&mut self) -> BoxFuture<'_, Option<api::Result<String>>>;

    fn close(&mut self);
}

/// Progress state machine for a single job.
///
/// Pure: it never touches the network, the caller feeds it inputs and
/// closes the channel once [`ProgressTracker::phase`] reports `Closed`.
#[derive(Debug)]
pub struct ProgressTracker {
    job: JobHandle,
    phase: TrackerPhase,
    started_at: Instant,
}

impl ProgressTracker {
    pub fn new(job: JobHandle, started_at: Instant) -> Self {
        Self {
            job,
            phase: TrackerPhase::Active,
            started_at,
        }
    }

    pub fn phase(&self) -> TrackerPhase {
        self.phase
    }

    pub fn on_message(&mut self, data: &str, now: Instant) -> Option<StatusEvent> {
        if self.phase == TrackerPhase::Closed {
            return None;
        }

        if data == COMPLETE {
            let elapsed = now.saturating_duration_since(self.started_at);
            tracing::info!(
                "Download {} complete after {:.2}s",
                self.job.job_id,
                elapsed.as_secs_f64()
            );
            return Some(self.close_with(StatusEvent::Completed { elapsed }));
        }

        if let Some(message) = data.strip_prefix(REMOTE_ERROR_PREFIX) {
            return self.on_failure(AppError::Remote(message.trim().to_string()));
        }

        match data.parse::<ProgressSnapshot>() {
            Ok(snapshot) => {
                tracing::debug!(
                    "Progress for {}: {}% - {:.2} MB",
                    self.job.job_id,
                    snapshot.percent,
                    snapshot.downloaded_mb
                );
                Some(StatusEvent::Progress(snapshot))
            }
            Err(e) => Some(self.on_malformed(data, e)),
        }
    }

    pub fn on_transport_error(&mut self, error: api::ApiError) -> Option<StatusEvent> {
        self.on_failure(AppError::Transport(error.to_string()))
    }

    pub fn on_stream_end(&mut self) -> Option<StatusEvent> {
        self.on_failure(AppError::Transport(
            "event stream ended before completion".to_string(),
        ))
    }

    pub fn on_idle_timeout(&mut self, idle: Duration) -> Option<StatusEvent> {
        self.on_failure(AppError::IdleTimeout(idle))
    }

    pub fn on_cancel(&mut self) -> Option<StatusEvent> {
        if self.phase == TrackerPhase::Closed {
            return None;
        }
        tracing::info!("Tracking of {} cancelled", self.job.job_id);
        Some(self.close_with(StatusEvent::Cancelled))
    }

    fn on_failure(&mut self, error: AppError) -> Option<StatusEvent> {
        if self.phase == TrackerPhase::Closed {
            return None;
        }
        tracing::error!("Download {} failed: {}", self.job.job_id, error);
        Some(self.close_with(StatusEvent::Failed(error)))
    }

    fn on_malformed(&self, data: &str, error: ParseError) -> StatusEvent {
        tracing::warn!(
            "Ignoring malformed progress for {}: {:?} ({})",
            self.job.job_id,
            data,
            error
        );
        StatusEvent::Malformed {
            payload: data.to_string(),
            reason: error.to_string(),
        }
    }

    fn close_with(&mut self, event: StatusEvent) -> StatusEvent {
        self.phase = TrackerPhase::Closed;
        event
    }
}

enum Step {
    Message(api::Result<String>),
    Ended,
    IdleTimeout(Duration),
    Cancelled,
}

enum TrackState<S> {
    Running {
        source: S,
        tracker: ProgressTracker,
        idle_timeout: Option<Duration>,
        token: CancellationToken,
    },
    Finished,
}

/// Drive a tracker from `source` until it closes.
///
/// The source is closed exactly once, right after the terminal event.
pub fn track<S>(
    source: S,
    job: JobHandle,
    idle_timeout: Option<Duration>,
    token: CancellationToken,
) -> BoxStream<'static, StatusEvent>
where
    S: MessageSource + 'static,
{
    futures::stream::unfold(
        TrackState::Running {
            source,
            tracker: ProgressTracker::new(job, Instant::now()),
            idle_timeout,
            token,
        },
        |state| async move {
            match state {
                TrackState::Running {
                    mut source,
                    mut tracker,
                    idle_timeout,
                    token,
                } => {
                    let step = tokio::select! {
                        biased;
                        _ = token.cancelled() => Step::Cancelled,
                        step = next_step(&mut source, idle_timeout) => step,
                    };

                    let event = match step {
                        Step::Message(Ok(data)) => tracker.on_message(&data, Instant::now()),
                        Step::Message(Err(e)) => tracker.on_transport_error(e),
                        Step::Ended => tracker.on_stream_end(),
                        Step::IdleTimeout(idle) => tracker.on_idle_timeout(idle),
                        Step::Cancelled => tracker.on_cancel(),
                    }?;

                    if tracker.phase() == TrackerPhase::Closed {
                        source.close();
                        return Some((event, TrackState::Finished));
                    }

                    Some((
                        event,
                        TrackState::Running {
                            source,
                            tracker,
                            idle_timeout,
                            token,
                        },
                    ))
                }
                TrackState::Finished => None,
            }
        },
    )
    .boxed()
}

async fn next_step<S: MessageSource>(source: &mut S, idle_timeout: Option<Duration>) -> Step {
    let next = match idle_timeout {
        Some(idle) => match tokio::time::timeout(idle, source.next_message()).await {
            Ok(next) => next,
            Err(_) => return Step::IdleTimeout(idle),
        },
        None => source.next_message().await,
    };

    match next {
        Some(result) => Step::Message(result),
        None => Step::Ended,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Replays scripted messages, then either ends or hangs.
    struct ScriptedSource {
        messages: VecDeque<api::Result<String>>,
        hang_when_drained: bool,
        closes: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn new(
            messages: Vec<api::Result<String>>,
            hang_when_drained: bool,
        ) -> (Self, Arc<AtomicUsize>) {
            let closes = Arc::new(AtomicUsize::new(0));
            let source = Self {
                messages: messages.into(),
                hang_when_drained,
                closes: closes.clone(),
            };
            (source, closes)
        }
    }

    impl MessageSource for ScriptedSource {
        fn next_message(&mut self) -> BoxFuture<'_, Option<api::Result<String>>> {
            Box::pin(async move {
                match self.messages.pop_front() {
                    Some(message) => Some(message),
                    None if self.hang_when_drained => futures::future::pending().await,
                    None => None,
                }
            })
        }

        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn ok(data: &str) -> api::Result<String> {
        Ok(data.to_string())
    }

    #[tokio::test]
    async fn test_progress_then_complete() {
        let (source, closes) = ScriptedSource::new(
            vec![ok("10,5.2,1.0MB/s,120"), ok("complete"), ok("20,6.0,1.0MB/s,100")],
            false,
        );

        let events: Vec<_> = track(source, JobHandle::new("job-1"), None, CancellationToken::new())
            .collect()
            .await;

        assert_eq!(events.len(), 2);
        match &events[0] {
            StatusEvent::Progress(snapshot) => assert_eq!(snapshot.percent, 10),
            other => panic!("expected progress, got {:?}", other),
        }
        assert!(matches!(events[1], StatusEvent::Completed { .. }));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transport_error_without_progress() {
        let (source, closes) = ScriptedSource::new(
            vec![Err(api::ApiError::Stream("connection reset".into()))],
            false,
        );

        let events: Vec<_> = track(source, JobHandle::new("job-1"), None, CancellationToken::new())
            .collect()
            .await;

        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            StatusEvent::Failed(AppError::Transport(msg)) if msg.contains("connection reset")
        ));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stream_end_is_a_failure() {
        let (source, closes) = ScriptedSource::new(vec![ok("50,10.0")], false);

        let events: Vec<_> = track(source, JobHandle::new("job-1"), None, CancellationToken::new())
            .collect()
            .await;

        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], StatusEvent::Failed(AppError::Transport(_))));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_malformed_progress_keeps_tracking() {
        let (source, closes) =
            ScriptedSource::new(vec![ok("abc,xyz,fast,soon"), ok("complete")], false);

        let events: Vec<_> = track(source, JobHandle::new("job-1"), None, CancellationToken::new())
            .collect()
            .await;

        assert!(matches!(
            &events[0],
            StatusEvent::Malformed { payload, .. } if payload == "abc,xyz,fast,soon"
        ));
        assert!(matches!(events[1], StatusEvent::Completed { .. }));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_remote_error_closes() {
        let (source, closes) =
            ScriptedSource::new(vec![ok("Error occurred: format not available")], false);

        let events: Vec<_> = track(source, JobHandle::new("job-1"), None, CancellationToken::new())
            .collect()
            .await;

        assert_eq!(
            events,
            vec![StatusEvent::Failed(AppError::Remote(
                "format not available".into()
            ))]
        );
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_idle_timeout_closes() {
        let (source, closes) = ScriptedSource::new(vec![ok("5,1.0")], true);

        let events: Vec<_> = track(
            source,
            JobHandle::new("job-1"),
            Some(Duration::from_millis(50)),
            CancellationToken::new(),
        )
        .collect()
        .await;

        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            StatusEvent::Failed(AppError::IdleTimeout(Duration::from_millis(50)))
        );
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancellation_closes() {
        let (source, closes) = ScriptedSource::new(vec![], true);
        let token = CancellationToken::new();
        let mut events = track(source, JobHandle::new("job-1"), None, token.clone());

        token.cancel();

        assert_eq!(events.next().await, Some(StatusEvent::Cancelled));
        assert_eq!(events.next().await, None);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_closed_tracker_ignores_input() {
        let start = Instant::now();
        let mut tracker = ProgressTracker::new(JobHandle::new("job-1"), start);

        let done = tracker.on_message("complete", start + Duration::from_millis(1500));
        assert_eq!(
            done,
            Some(StatusEvent::Completed {
                elapsed: Duration::from_millis(1500)
            })
        );
        assert_eq!(tracker.phase(), TrackerPhase::Closed);

        assert_eq!(tracker.on_message("10,5.2,1.0MB/s,120", Instant::now()), None);
        assert_eq!(tracker.on_message("complete", Instant::now()), None);
        assert_eq!(tracker.on_stream_end(), None);
        assert_eq!(tracker.on_cancel(), None);
        assert_eq!(tracker.phase(), TrackerPhase::Closed);
    }
}
