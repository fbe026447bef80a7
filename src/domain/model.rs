use std::path::PathBuf;

use super::error::AppError;

/// What the user asked for. Frozen once the download starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub destination: PathBuf,
    pub high_quality: bool,
}

/// Controller-owned state for the one download that may be in flight.
#[derive(Debug, Clone)]
pub struct DownloadSession {
    pub request: DownloadRequest,
    pub is_running: bool,
}

/// Exit code and buffered stderr of a finished child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub exit_code: i32,
    pub stderr_text: String,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    DependencyMissing,
    InvalidUrl,
    Unclassified,
}

impl FailureKind {
    const MUXER_MISSING: &'static str = "ffmpeg or avconv not found";
    const INVALID_URL: &'static str = "is not a valid url";

    /// Case-insensitive scan of the tool's stderr; the first match wins.
    pub fn classify(stderr_text: &str) -> Self {
        let haystack = stderr_text.to_lowercase();
        if haystack.contains(Self::MUXER_MISSING) {
            FailureKind::DependencyMissing
        } else if haystack.contains(Self::INVALID_URL) {
            FailureKind::InvalidUrl
        } else {
            FailureKind::Unclassified
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPhase {
    Idle,
    Validating,
    Running,
    Succeeded,
    Failed,
    Errored,
}

/// Terminal state of one background session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionResult {
    Succeeded,
    /// The tool ran and exited non-zero. Always carries `AppError::ToolFailure`.
    Failed(AppError),
    Errored(AppError),
}

impl SessionResult {
    pub fn phase(&self) -> DownloadPhase {
        match self {
            SessionResult::Succeeded => DownloadPhase::Succeeded,
            SessionResult::Failed(_) => DownloadPhase::Failed,
            SessionResult::Errored(_) => DownloadPhase::Errored,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Content of a blocking acknowledgment dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
}

impl Notice {
    fn error(title: &str, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.to_string(),
            description: description.into(),
        }
    }

    pub fn success() -> Self {
        Self {
            level: NoticeLevel::Info,
            title: "Success".to_string(),
            description: "Video downloaded successfully!".to_string(),
        }
    }

    pub fn invalid_input(error: &AppError) -> Self {
        Self::error("Error", error.to_string())
    }

    pub fn for_failure(kind: FailureKind) -> Self {
        match kind {
            FailureKind::DependencyMissing => Self::error(
                "Dependency Error",
                "FFmpeg was not found.\n\n\
                 To download in best quality, you must install FFmpeg.\n\n\
                 You can download it from ffmpeg.org.",
            ),
            FailureKind::InvalidUrl => Self::error(
                "Download Failed",
                "The URL is not valid or is unsupported.\n\n\
                 Please check the URL and try again.",
            ),
            FailureKind::Unclassified => Self::error(
                "Download Failed",
                "An error occurred during download.\n\
                 Check the status window for details.",
            ),
        }
    }

    pub fn unexpected(error: &AppError) -> Self {
        Self::error("Error", format!("An unexpected error occurred: {}", error))
    }
}
