use iced::{
    widget::{button, checkbox, column, row, scrollable, text, text_input, Space},
    Element, Font, Length,
};

use crate::utils::default_download_dir;

const IDLE_LABEL: &str = "Download Video";
const BUSY_LABEL: &str = "Downloading...";

/// Main view state
pub struct DownloadView {
    pub url: String,
    pub destination: String,
    pub high_quality: bool,
    /// Append-only; rendered newest at the bottom
    pub status_log: Vec<String>,
}

impl Default for DownloadView {
    fn default() -> Self {
        Self {
            url: String::new(),
            destination: default_download_dir().to_string_lossy().into_owned(),
            high_quality: true,
            status_log: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum DownloadMessage {
    UrlChanged(String),
    QualityToggled(bool),
    BrowsePressed,
    DownloadPressed,
}

impl DownloadView {
    pub fn update(&mut self, message: DownloadMessage) {
        match message {
            DownloadMessage::UrlChanged(url) => {
                self.url = url;
            }
            DownloadMessage::QualityToggled(enabled) => {
                self.high_quality = enabled;
            }
            // Folder picker and session start need the controller, see `app::update`
            DownloadMessage::BrowsePressed | DownloadMessage::DownloadPressed => {}
        }
    }

    pub fn push_status(&mut self, line: String) {
        self.status_log.push(line);
    }

    /// Inputs and the download button are only live while no download runs.
    pub fn view(&self, is_running: bool) -> Element<'_, DownloadMessage> {
        let url_input = text_input("Paste a video URL...", &self.url)
            .on_input_maybe((!is_running).then_some(DownloadMessage::UrlChanged))
            .padding(10);

        let path_row = row![
            text_input("", &self.destination)
                .padding(8)
                .width(Length::Fill),
            button("Browse...")
                .on_press_maybe((!is_running).then_some(DownloadMessage::BrowsePressed))
                .padding([8, 12]),
        ]
        .spacing(5);

        let quality_row = row![
            checkbox(self.high_quality).on_toggle(DownloadMessage::QualityToggled),
            text("Download Best Quality").size(14),
        ]
        .spacing(8);

        let download_button = button(text(if is_running { BUSY_LABEL } else { IDLE_LABEL }).size(18))
            .on_press_maybe((!is_running).then_some(DownloadMessage::DownloadPressed))
            .padding([10, 20])
            .width(Length::Fill);

        let status_pane = scrollable(
            text(self.status_log.join("\n"))
                .font(Font::MONOSPACE)
                .size(13),
        )
        .anchor_bottom()
        .height(Length::Fill)
        .width(Length::Fill);

        column![
            text("Video URL:").size(16),
            url_input,
            Space::new().height(Length::Fixed(10.0)),
            text("Save to:").size(16),
            path_row,
            quality_row,
            download_button,
            text("Status:").size(16),
            status_pane,
        ]
        .padding(20)
        .spacing(10)
        .into()
    }
}
