use std::time::Duration;

use thiserror::Error;

use crate::utils::format_seconds;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AppError {
    #[error("Please enter a video URL")]
    Validation,

    #[error("Failed to start download: {0}")]
    Request(String),

    #[error("Progress stream error: {0}")]
    Transport(String),

    #[error("Backend reported an error: {0}")]
    Remote(String),

    #[error("No progress received for {} seconds", format_seconds(*.0))]
    IdleTimeout(Duration),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Short message shown to the user in place of a modal alert.
    pub fn notice(&self) -> &'static str {
        match self {
            AppError::Validation => "Please enter a video URL",
            AppError::Request(_) | AppError::Config(_) => "Error starting download.",
            AppError::Transport(_) | AppError::Remote(_) | AppError::IdleTimeout(_) => {
                "Error occurred during download."
            }
        }
    }
}
