use std::time::Duration;

use super::{AppError, ProgressSnapshot};

/// A validated download request built from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    target: String,
    quality: String,
}

impl DownloadRequest {
    /// Fails with [`AppError::Validation`] when the target is blank.
    pub fn new(target: &str, quality: &str) -> Result<Self, AppError> {
        let target = target.trim();
        if target.is_empty() {
            return Err(AppError::Validation);
        }

        Ok(Self {
            target: target.to_string(),
            quality: quality.trim().to_string(),
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn quality(&self) -> &str {
        &self.quality
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle {
    pub job_id: String,
}

impl JobHandle {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerPhase {
    Active,
    Closed,
}

/// Everything the initiator and the tracker report to the display.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    Rejected(AppError),
    Preparing,
    Started(JobHandle),
    Progress(ProgressSnapshot),
    Malformed { payload: String, reason: String },
    Completed { elapsed: Duration },
    Failed(AppError),
    Cancelled,
}

impl StatusEvent {
    /// True for events after which no more events arrive for the job.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StatusEvent::Rejected(_)
                | StatusEvent::Completed { .. }
                | StatusEvent::Failed(_)
                | StatusEvent::Cancelled
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub job_id: String,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_targets_are_rejected() {
        for target in ["", " ", "\t\n  "] {
            assert_eq!(
                DownloadRequest::new(target, "best"),
                Err(AppError::Validation)
            );
        }
    }

    #[test]
    fn test_request_is_trimmed() {
        let request = DownloadRequest::new("  https://youtu.be/abc \n", " 22 ").unwrap();
        assert_eq!(request.target(), "https://youtu.be/abc");
        assert_eq!(request.quality(), "22");
    }

    #[test]
    fn test_terminal_events() {
        assert!(StatusEvent::Cancelled.is_terminal());
        assert!(StatusEvent::Failed(AppError::Transport("reset".into())).is_terminal());
        assert!(!StatusEvent::Preparing.is_terminal());
        assert!(!StatusEvent::Started(JobHandle::new("a")).is_terminal());
    }
}
