mod app;
mod application;
mod domain;
mod process;
mod ui;
mod utils;

use iced::{window, Size};
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,simple_video_downloader=info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .compact()
        .try_init()
        .ok(); // Ignore error if already initialized
}

fn main() -> iced::Result {
    init_logging();

    iced::application(app::DownloadApp::default, app::update, app::view)
        .title("Simple Video Downloader")
        .window(window::Settings {
            size: Size::new(600.0, 450.0),
            resizable: false,
            ..Default::default()
        })
        .run()
}
