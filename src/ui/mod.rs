pub mod display;

pub use display::{DisplayState, Notice, NoticeLevel};

use iced::{
    widget::{button, column, progress_bar, row, text, text_input, Column, Space},
    Element, Length,
};

/// Input form state
pub struct DownloadView {
    pub video_url: String,
    pub quality: String,
}

impl DownloadView {
    pub fn new(default_quality: &str) -> Self {
        Self {
            video_url: String::new(),
            quality: default_quality.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum DownloadMessage {
    VideoUrlChanged(String),
    QualityChanged(String),
    DownloadPressed,
    RefreshHistoryPressed,
}

impl DownloadView {
    pub fn update(&mut self, message: DownloadMessage) {
        match message {
            DownloadMessage::VideoUrlChanged(url) => {
                self.video_url = url;
            }
            DownloadMessage::QualityChanged(quality) => {
                self.quality = quality;
            }
            DownloadMessage::DownloadPressed | DownloadMessage::RefreshHistoryPressed => {
                // Will be handled by the app
            }
        }
    }

    pub fn view(&self) -> Element<'_, DownloadMessage> {
        column![
            text("Video Downloader").size(32),
            Space::new().height(Length::Fixed(20.0)),
            text("Video URL:").size(16),
            text_input("Enter a video URL...", &self.video_url)
                .on_input(DownloadMessage::VideoUrlChanged)
                .on_submit(DownloadMessage::DownloadPressed)
                .padding(10),
            text("Quality:").size(16),
            text_input("best", &self.quality)
                .on_input(DownloadMessage::QualityChanged)
                .padding(10),
            Space::new().height(Length::Fixed(10.0)),
            row![
                button("Download")
                    .on_press(DownloadMessage::DownloadPressed)
                    .padding([10, 20]),
                button("History")
                    .on_press(DownloadMessage::RefreshHistoryPressed)
                    .padding([10, 20]),
            ]
            .spacing(10),
        ]
        .padding(20)
        .spacing(10)
        .into()
    }
}

/// Project the status area onto widgets.
pub fn render<'a, Message: 'a>(state: &'a DisplayState) -> Element<'a, Message> {
    let details: Column<'a, Message> = Column::with_children(
        state
            .details
            .iter()
            .map(|line| text(line).size(14).into()),
    )
    .spacing(4);

    let mut content: Column<'a, Message> =
        column![progress_bar(0.0..=100.0, state.progress), details]
            .padding(20)
            .spacing(10);

    if let Some(notice) = &state.notice {
        content = content.push(text(notice_text(notice)).size(14));
    }

    if !state.history.is_empty() {
        let history: Column<'a, Message> = Column::with_children(
            state
                .history
                .iter()
                .map(|entry| text(format!("{}: {}", entry.job_id, entry.status)).size(12).into()),
        )
        .spacing(2);

        content = content.push(text("History").size(18)).push(history);
    }

    content.into()
}

fn notice_text(notice: &Notice) -> String {
    match notice.level {
        NoticeLevel::Info => notice.text.clone(),
        NoticeLevel::Warning => format!("Warning: {}", notice.text),
        NoticeLevel::Error => format!("Error: {}", notice.text),
    }
}
