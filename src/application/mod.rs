pub mod download_controller;
pub mod status_relay;

pub use download_controller::{session_stream, DownloadController};
pub use status_relay::{SessionEvent, StatusRelay};
