use thiserror::Error;

use super::model::FailureKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter a video URL.")]
    EmptyUrl,

    #[error("Please select a save location.")]
    EmptyDestination,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("A download is already in progress")]
    AlreadyRunning,

    #[error("Failed to launch {program}: {reason}")]
    Launch { program: String, reason: String },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Download tool exited with status {exit_code} ({kind:?})")]
    ToolFailure { exit_code: i32, kind: FailureKind },

    #[error("Background download task panicked: {0}")]
    Panicked(String),
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}
