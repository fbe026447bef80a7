use crate::application::{session_stream, DownloadController, SessionEvent};
use crate::domain::{AppError, Notice, NoticeLevel};
use crate::process::{SystemLauncher, ToolConfig, ToolLauncher};
use crate::ui::{DownloadMessage, DownloadView};
use futures::StreamExt;
use iced::Task;
use std::path::PathBuf;
use std::sync::Arc;

pub struct DownloadApp {
    view: DownloadView,
    controller: DownloadController,
    config: ToolConfig,
    launcher: Arc<dyn ToolLauncher>,
}

impl Default for DownloadApp {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadApp {
    pub fn new() -> Self {
        Self {
            view: DownloadView::default(),
            controller: DownloadController::new(),
            config: ToolConfig::from_env(),
            launcher: Arc::new(SystemLauncher),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    UiMessage(DownloadMessage),
    /// Result of the native folder picker
    FolderSelected(Option<PathBuf>),
    /// Forwarded from the background download session
    Session(SessionEvent),
    NoticeDismissed,
}

pub fn update(app: &mut DownloadApp, message: Message) -> Task<Message> {
    match message {
        Message::UiMessage(ui_msg) => {
            app.view.update(ui_msg.clone());

            match ui_msg {
                DownloadMessage::BrowsePressed if !app.controller.is_running() => {
                    return Task::perform(pick_folder(), Message::FolderSelected);
                }
                DownloadMessage::DownloadPressed => return start_download(app),
                _ => {}
            }
        }
        Message::FolderSelected(Some(path)) => {
            app.view.destination = path.to_string_lossy().into_owned();
        }
        Message::FolderSelected(None) => {}
        Message::Session(SessionEvent::Status(line)) => {
            app.view.push_status(line);
        }
        Message::Session(SessionEvent::Alert(notice)) => {
            return show_notice(notice);
        }
        Message::Session(SessionEvent::Finished(result)) => {
            app.controller.complete(result);
            tracing::debug!(phase = ?app.controller.phase(), "controls re-enabled");
        }
        Message::NoticeDismissed => {}
    }
    Task::none()
}

pub fn view(app: &DownloadApp) -> iced::Element<'_, Message> {
    app.view
        .view(app.controller.is_running())
        .map(Message::UiMessage)
}

fn start_download(app: &mut DownloadApp) -> Task<Message> {
    match app.controller.begin(
        &app.view.url,
        &app.view.destination,
        app.view.high_quality,
    ) {
        Ok(request) => {
            // iced drives the stream on its tokio executor; only `update` touches view state
            let events = session_stream(request, app.config.clone(), app.launcher.clone());
            Task::stream(events.map(Message::Session))
        }
        Err(AppError::AlreadyRunning) => Task::none(),
        Err(e) => show_notice(Notice::invalid_input(&e)),
    }
}

async fn pick_folder() -> Option<PathBuf> {
    rfd::AsyncFileDialog::new()
        .set_title("Select a Folder to Save the Video")
        .pick_folder()
        .await
        .map(|handle| handle.path().to_path_buf())
}

fn show_notice(notice: Notice) -> Task<Message> {
    Task::perform(
        async move {
            let level = match notice.level {
                NoticeLevel::Info => rfd::MessageLevel::Info,
                NoticeLevel::Error => rfd::MessageLevel::Error,
            };
            rfd::AsyncMessageDialog::new()
                .set_level(level)
                .set_title(notice.title)
                .set_description(notice.description)
                .set_buttons(rfd::MessageButtons::Ok)
                .show()
                .await;
        },
        |()| Message::NoticeDismissed,
    )
}
