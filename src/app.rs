use futures::StreamExt;
use iced::widget::column;
use iced::Task;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiClient, ApiConfig};
use crate::application::DownloadCoordinator;
use crate::domain::{AppError, DownloadRequest, HistoryEntry, StatusEvent};
use crate::ui::{self, DisplayState, DownloadMessage, DownloadView};

pub struct DownloadApp {
    view: DownloadView,
    display: DisplayState,
    coordinator: DownloadCoordinator,
    // Subscription of the job currently on screen
    active: Option<ActiveJob>,
    generation: u64,
}

struct ActiveJob {
    generation: u64,
    token: CancellationToken,
}

impl Default for DownloadApp {
    fn default() -> Self {
        Self::new(ApiConfig::from_env())
    }
}

impl DownloadApp {
    pub fn new(config: ApiConfig) -> Self {
        tracing::info!("Using download backend at {}", config.base_url);
        let coordinator = DownloadCoordinator::new(ApiClient::new(config));
        let view = DownloadView::new(coordinator.default_quality());

        Self {
            view,
            display: DisplayState::default(),
            coordinator,
            active: None,
            generation: 0,
        }
    }

    /// Cancel the current subscription, if any, and hand out a fresh token.
    fn replace_active(&mut self) -> (u64, CancellationToken) {
        if let Some(previous) = self.active.take() {
            tracing::debug!("Closing subscription of job #{}", previous.generation);
            previous.token.cancel();
        }

        self.generation += 1;
        let token = CancellationToken::new();
        self.active = Some(ActiveJob {
            generation: self.generation,
            token: token.clone(),
        });
        (self.generation, token)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.generation == generation)
    }
}

impl Drop for DownloadApp {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.token.cancel();
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    UiMessage(DownloadMessage),
    /// Status of the job with the given generation
    Status(u64, StatusEvent),
    HistoryLoaded(Result<Vec<HistoryEntry>, AppError>),
}

pub fn update(app: &mut DownloadApp, message: Message) -> Task<Message> {
    match message {
        Message::UiMessage(ui_msg) => {
            app.view.update(ui_msg.clone());

            match ui_msg {
                DownloadMessage::DownloadPressed => {
                    match DownloadRequest::new(&app.view.video_url, &app.view.quality) {
                        Ok(request) => {
                            let (generation, token) = app.replace_active();
                            app.display.apply(&StatusEvent::Preparing);

                            // Initiate and track in the background tokio executor
                            return Task::stream(
                                app.coordinator
                                    .run(request, token)
                                    .map(move |event| Message::Status(generation, event)),
                            );
                        }
                        Err(e) => {
                            tracing::warn!("Rejected download request: {}", e);
                            app.display.apply(&StatusEvent::Rejected(e));
                        }
                    }
                }
                DownloadMessage::RefreshHistoryPressed => {
                    let coordinator = app.coordinator.clone();
                    return Task::perform(
                        async move { coordinator.history().await },
                        Message::HistoryLoaded,
                    );
                }
                DownloadMessage::VideoUrlChanged(_) | DownloadMessage::QualityChanged(_) => {}
            }
        }
        Message::Status(generation, event) => {
            if !app.is_current(generation) {
                tracing::debug!("Dropping {:?} from superseded job #{}", event, generation);
                return Task::none();
            }

            app.display.apply(&event);
            if event.is_terminal() {
                app.active = None;
            }
        }
        Message::HistoryLoaded(result) => match result {
            Ok(history) => {
                tracing::debug!("Loaded {} history entries", history.len());
                app.display.set_history(history);
            }
            Err(e) => {
                tracing::error!("History request failed: {}", e);
                app.display.warn(format!("Could not load history: {}", e));
            }
        },
    }
    Task::none()
}

pub fn view(app: &DownloadApp) -> iced::Element<'_, Message> {
    column![
        app.view.view().map(Message::UiMessage),
        ui::render(&app.display),
    ]
    .into()
}
