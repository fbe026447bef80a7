pub mod error;
pub mod model;

pub use error::{AppError, ValidationError};
pub use model::{
    DownloadPhase, DownloadRequest, DownloadSession, FailureKind, Notice, NoticeLevel,
    ProcessOutcome, SessionResult,
};
