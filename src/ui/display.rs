use crate::{
    domain::{HistoryEntry, StatusEvent},
    utils::{format_seconds, or_placeholder, placeholder},
};

const PREPARING: &str = "Preparing to start download... Please wait a few seconds.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Non-blocking replacement for a modal alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    fn new(level: NoticeLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

/// Everything the status area shows. Only changed through [`DisplayState::apply`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayState {
    pub details: Vec<String>,
    /// Progress bar fill, 0 to 100.
    pub progress: f32,
    pub notice: Option<Notice>,
    pub history: Vec<HistoryEntry>,
}

impl DisplayState {
    pub fn apply(&mut self, event: &StatusEvent) {
        match event {
            StatusEvent::Rejected(error) => {
                self.notice = Some(Notice::new(NoticeLevel::Warning, error.notice()));
            }
            StatusEvent::Preparing => {
                self.details = vec![PREPARING.to_string()];
                self.progress = 0.0;
                self.notice = None;
            }
            StatusEvent::Started(job) => {
                self.details = vec![
                    "Download started! Tracking progress...".to_string(),
                    format!("Video ID: {}", job.job_id),
                ];
            }
            StatusEvent::Progress(snapshot) => {
                self.progress = f32::from(snapshot.percent);
                self.details = vec![
                    format!("Download Progress: {}%", snapshot.percent),
                    format!("Downloaded: {:.2} MB", snapshot.downloaded_mb),
                    format!("Speed: {}", or_placeholder(snapshot.speed.as_deref())),
                    format!("ETA: {} seconds", or_placeholder(snapshot.eta.as_deref())),
                ];
            }
            StatusEvent::Malformed { payload, reason } => {
                self.details = vec![
                    format!("Download Progress: {}%", placeholder()),
                    format!("Downloaded: {} MB", placeholder()),
                    format!("Speed: {}", placeholder()),
                    format!("ETA: {} seconds", placeholder()),
                ];
                self.notice = Some(Notice::new(
                    NoticeLevel::Warning,
                    format!("Unreadable progress update {:?} ({})", payload, reason),
                ));
            }
            StatusEvent::Completed { elapsed } => {
                self.details.push(format!(
                    "Download complete! Total time: {} seconds.",
                    format_seconds(*elapsed)
                ));
                self.notice = Some(Notice::new(NoticeLevel::Info, "Download complete!"));
            }
            StatusEvent::Failed(error) => {
                self.notice = Some(Notice::new(
                    NoticeLevel::Error,
                    format!("{} {}", error.notice(), error),
                ));
            }
            StatusEvent::Cancelled => {}
        }
    }

    pub fn set_history(&mut self, history: Vec<HistoryEntry>) {
        self.history = history;
    }

    pub fn warn(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice::new(NoticeLevel::Warning, text));
    }
}
