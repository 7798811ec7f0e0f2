mod api;
mod app;
mod application;
mod domain;
mod ui;
mod utils;

use iced::{window, Size};

fn main() -> iced::Result {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "video_downloader=info".into()),
        )
        .init();

    iced::application(app::DownloadApp::default, app::update, app::view)
        .title("Video Downloader")
        .window(window::Settings {
            size: Size::new(520.0, 640.0),
            ..Default::default()
        })
        .run()
}
