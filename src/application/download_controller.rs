use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use futures::{future, stream::BoxStream, FutureExt, StreamExt};

use super::status_relay::{SessionEvent, StatusRelay};
use crate::{
    domain::{
        AppError, DownloadPhase, DownloadRequest, DownloadSession, FailureKind, Notice,
        ProcessOutcome, SessionResult, ValidationError,
    },
    process::{ToolConfig, ToolLauncher},
    utils::trim_line_ending,
};

const HIGH_QUALITY_ADVISORY: &str = "High quality selected. This may require FFmpeg.";
const SUCCESS_BANNER: &str = "--- Download completed successfully! ---";
const FAILURE_BANNER: &str = "--- Download failed ---";
const MUXER_REMEDIATION: [&str; 2] = [
    "ERROR: FFmpeg is required for merging high quality video and audio.",
    "Please install FFmpeg and ensure it's in your system's PATH.",
];
const DETAILS_HEADER: &str = "Error details:";

/// Single-flight state machine for download attempts.
///
/// `begin` moves Idle -> Validating -> Running, `complete` moves the
/// terminal state back to Idle. Only the event loop calls either.
#[derive(Debug)]
pub struct DownloadController {
    phase: DownloadPhase,
    session: Option<DownloadSession>,
}

impl Default for DownloadController {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadController {
    pub fn new() -> Self {
        Self {
            phase: DownloadPhase::Idle,
            session: None,
        }
    }

    pub fn phase(&self) -> DownloadPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_running)
    }

    pub fn begin(
        &mut self,
        url: &str,
        destination: &str,
        high_quality: bool,
    ) -> Result<DownloadRequest, AppError> {
        if self.is_running() {
            tracing::warn!("download already in progress, ignoring start request");
            return Err(AppError::AlreadyRunning);
        }

        self.phase = DownloadPhase::Validating;
        let request = match validate(url, destination, high_quality) {
            Ok(request) => request,
            Err(e) => {
                self.phase = DownloadPhase::Idle;
                return Err(e.into());
            }
        };

        tracing::info!(
            url = %request.url,
            destination = %request.destination.display(),
            high_quality = request.high_quality,
            "starting download"
        );

        self.session = Some(DownloadSession {
            request: request.clone(),
            is_running: true,
        });
        self.phase = DownloadPhase::Running;
        Ok(request)
    }

    pub fn complete(&mut self, result: SessionResult) {
        let Some(session) = self.session.take() else {
            tracing::debug!(?result, "completion without an active session");
            return;
        };

        self.phase = result.phase();
        match &result {
            SessionResult::Succeeded => {
                tracing::info!(url = %session.request.url, "download finished")
            }
            SessionResult::Failed(e) | SessionResult::Errored(e) => {
                tracing::warn!(url = %session.request.url, phase = ?self.phase, error = %e, "download did not succeed")
            }
        }
        self.phase = DownloadPhase::Idle;
    }
}

fn validate(
    url: &str,
    destination: &str,
    high_quality: bool,
) -> Result<DownloadRequest, ValidationError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ValidationError::EmptyUrl);
    }
    if destination.trim().is_empty() {
        return Err(ValidationError::EmptyDestination);
    }

    Ok(DownloadRequest {
        url: url.to_string(),
        destination: PathBuf::from(destination),
        high_quality,
    })
}

/// Runs one session in the background and yields its events in order.
///
/// The stream always ends with exactly one `SessionEvent::Finished`, even when
/// the session panics.
pub fn session_stream(
    request: DownloadRequest,
    config: ToolConfig,
    launcher: Arc<dyn ToolLauncher>,
) -> BoxStream<'static, SessionEvent> {
    let (relay, events) = StatusRelay::channel();

    let driver = async move {
        let result = AssertUnwindSafe(run_session(&request, &config, launcher.as_ref(), &relay))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let error = AppError::Panicked(panic_reason(&*panic));
                tracing::error!(error = %error, "download session panicked");
                report_error(error, &relay)
            });
        relay.finish(result);
        // relay drops here, which closes `events`
    };

    // The driver yields nothing itself; it only has to be polled alongside the receiver.
    let driver = futures::stream::once(driver).filter_map(|()| future::ready(None));
    futures::stream::select(events, driver).boxed()
}

async fn run_session(
    request: &DownloadRequest,
    config: &ToolConfig,
    launcher: &dyn ToolLauncher,
    relay: &StatusRelay,
) -> SessionResult {
    relay.post(format!("Starting download for: {}", request.url));
    relay.post(format!("Saving to: {}", request.destination.display()));

    match execute(request, config, launcher, relay).await {
        Ok(outcome) => report_outcome(outcome, relay),
        Err(e) => {
            tracing::error!(error = %e, "download session errored");
            report_error(e, relay)
        }
    }
}

/// Drains stdout to the relay, then waits for the exit status.
async fn execute(
    request: &DownloadRequest,
    config: &ToolConfig,
    launcher: &dyn ToolLauncher,
    relay: &StatusRelay,
) -> Result<ProcessOutcome, AppError> {
    if request.high_quality {
        relay.post(HIGH_QUALITY_ADVISORY);
    }

    tokio::fs::create_dir_all(&request.destination).await?;

    let argv = config.command_line(request);
    let mut process = launcher.launch(&argv)?;
    while let Some(line) = process.next_line().await? {
        relay.post(line);
    }
    process.finish().await
}

fn report_outcome(outcome: ProcessOutcome, relay: &StatusRelay) -> SessionResult {
    if outcome.success() {
        relay.post("");
        relay.post(SUCCESS_BANNER);
        relay.alert(Notice::success());
        return SessionResult::Succeeded;
    }

    relay.post("");
    relay.post(FAILURE_BANNER);

    let kind = FailureKind::classify(&outcome.stderr_text);
    tracing::warn!(exit_code = outcome.exit_code, ?kind, "download tool failed");

    match kind {
        FailureKind::DependencyMissing => {
            for line in MUXER_REMEDIATION {
                relay.post(line);
            }
            // Raw stderr is relayed here as well, so part of the diagnosis shows twice.
            relay_details(&outcome.stderr_text, relay);
        }
        FailureKind::InvalidUrl => {}
        FailureKind::Unclassified => relay_details(&outcome.stderr_text, relay),
    }
    relay.alert(Notice::for_failure(kind));

    SessionResult::Failed(AppError::ToolFailure {
        exit_code: outcome.exit_code,
        kind,
    })
}

fn relay_details(stderr_text: &str, relay: &StatusRelay) {
    relay.post(DETAILS_HEADER);
    relay.post(trim_line_ending(stderr_text));
}

fn report_error(error: AppError, relay: &StatusRelay) -> SessionResult {
    relay.post(format!("An unexpected error occurred: {}", error));
    relay.alert(Notice::unexpected(&error));
    SessionResult::Errored(error)
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ToolProcess;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// What the simulated child does.
    #[derive(Clone)]
    enum Script {
        Run {
            lines: Vec<&'static str>,
            read_error: Option<AppError>,
            exit_code: i32,
            stderr: &'static str,
        },
        LaunchFails,
        Panics,
    }

    fn exits(lines: Vec<&'static str>, exit_code: i32, stderr: &'static str) -> Script {
        Script::Run {
            lines,
            read_error: None,
            exit_code,
            stderr,
        }
    }

    struct ScriptedLauncher {
        script: Script,
        launched: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedLauncher {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script,
                launched: Mutex::new(Vec::new()),
            })
        }
    }

    impl ToolLauncher for ScriptedLauncher {
        fn launch(&self, argv: &[String]) -> Result<Box<dyn ToolProcess>, AppError> {
            self.launched.lock().unwrap().push(argv.to_vec());
            match self.script.clone() {
                Script::Run {
                    lines,
                    read_error,
                    exit_code,
                    stderr,
                } => Ok(Box::new(ScriptedProcess {
                    lines: lines.into_iter().map(String::from).collect(),
                    read_error,
                    outcome: ProcessOutcome {
                        exit_code,
                        stderr_text: stderr.to_string(),
                    },
                })),
                Script::LaunchFails => Err(AppError::Launch {
                    program: argv[0].clone(),
                    reason: "No such file or directory (os error 2)".to_string(),
                }),
                Script::Panics => panic!("launcher exploded"),
            }
        }
    }

    struct ScriptedProcess {
        lines: VecDeque<String>,
        read_error: Option<AppError>,
        outcome: ProcessOutcome,
    }

    #[async_trait]
    impl ToolProcess for ScriptedProcess {
        async fn next_line(&mut self) -> Result<Option<String>, AppError> {
            match self.lines.pop_front() {
                Some(line) => Ok(Some(line)),
                None => match self.read_error.take() {
                    Some(e) => Err(e),
                    None => Ok(None),
                },
            }
        }

        async fn finish(self: Box<Self>) -> Result<ProcessOutcome, AppError> {
            Ok(self.outcome)
        }
    }

    struct Run {
        events: Vec<SessionEvent>,
        launched: Vec<Vec<String>>,
        destination: tempfile::TempDir,
    }

    impl Run {
        fn statuses(&self) -> Vec<&str> {
            self.events
                .iter()
                .filter_map(|e| match e {
                    SessionEvent::Status(line) => Some(line.as_str()),
                    _ => None,
                })
                .collect()
        }

        fn alerts(&self) -> Vec<&Notice> {
            self.events
                .iter()
                .filter_map(|e| match e {
                    SessionEvent::Alert(notice) => Some(notice),
                    _ => None,
                })
                .collect()
        }

        fn result(&self) -> &SessionResult {
            match self.events.last() {
                Some(SessionEvent::Finished(result)) => result,
                other => panic!("stream did not end with Finished: {other:?}"),
            }
        }
    }

    const URL: &str = "https://example.com/watch?v=abc";

    async fn run(script: Script, high_quality: bool) -> Run {
        let destination = tempfile::tempdir().unwrap();
        let request = DownloadRequest {
            url: URL.to_string(),
            destination: destination.path().to_path_buf(),
            high_quality,
        };
        let launcher = ScriptedLauncher::new(script);
        let events = session_stream(request, ToolConfig::default(), launcher.clone())
            .collect::<Vec<_>>()
            .await;
        let launched = launcher.launched.lock().unwrap().clone();
        Run {
            events,
            launched,
            destination,
        }
    }

    #[tokio::test]
    async fn test_success_relays_lines_in_order() {
        let run = run(exits(vec!["A", "B", "C"], 0, ""), false).await;
        let saving = format!("Saving to: {}", run.destination.path().display());

        assert_eq!(
            run.statuses(),
            vec![
                "Starting download for: https://example.com/watch?v=abc",
                saving.as_str(),
                "A",
                "B",
                "C",
                "",
                SUCCESS_BANNER,
            ]
        );
        assert_eq!(run.alerts(), vec![&Notice::success()]);
        assert_eq!(run.result(), &SessionResult::Succeeded);
        assert_eq!(run.launched.len(), 1);
    }

    #[tokio::test]
    async fn test_high_quality_adds_advisory_and_format_args() {
        let run = run(exits(vec![], 0, ""), true).await;

        assert_eq!(run.statuses()[2], HIGH_QUALITY_ADVISORY);
        let argv = &run.launched[0];
        assert!(argv.iter().any(|a| a == "--merge-output-format"));
        assert_eq!(argv.last().map(String::as_str), Some(URL));
    }

    #[tokio::test]
    async fn test_missing_muxer_relays_remediation_and_details() {
        let stderr = "ERROR: Postprocessing: ffmpeg or avconv not found. Please install one.";
        let run = run(exits(vec!["[download] 100%"], 1, stderr), true).await;
        let statuses = run.statuses();

        let banner = statuses.iter().position(|s| *s == FAILURE_BANNER).unwrap();
        assert_eq!(
            statuses[banner + 1..],
            [MUXER_REMEDIATION[0], MUXER_REMEDIATION[1], DETAILS_HEADER, stderr]
        );
        assert_eq!(
            run.alerts(),
            vec![&Notice::for_failure(FailureKind::DependencyMissing)]
        );
        assert_eq!(
            run.result(),
            &SessionResult::Failed(AppError::ToolFailure {
                exit_code: 1,
                kind: FailureKind::DependencyMissing,
            })
        );
    }

    #[tokio::test]
    async fn test_invalid_url_does_not_dump_stderr() {
        let stderr = "ERROR: 'abc' Is Not A Valid URL. Set --default-search";
        let run = run(exits(vec![], 1, stderr), false).await;
        let statuses = run.statuses();

        assert!(!statuses.contains(&stderr));
        assert!(!statuses.contains(&DETAILS_HEADER));
        assert_eq!(statuses.last(), Some(&FAILURE_BANNER));
        assert_eq!(
            run.alerts(),
            vec![&Notice::for_failure(FailureKind::InvalidUrl)]
        );
    }

    #[tokio::test]
    async fn test_unclassified_failure_relays_raw_stderr() {
        let run = run(exits(vec![], 2, "unknown option --xyz"), false).await;
        let statuses = run.statuses();

        assert!(statuses.contains(&"unknown option --xyz"));
        assert_eq!(
            run.alerts(),
            vec![&Notice::for_failure(FailureKind::Unclassified)]
        );
        assert!(matches!(
            run.result(),
            SessionResult::Failed(AppError::ToolFailure { exit_code: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_details_drop_trailing_newline_only() {
        let stderr = "WARNING: first\nERROR: second\n";
        let run = run(exits(vec![], 1, stderr), false).await;

        assert_eq!(
            run.statuses().last(),
            Some(&"WARNING: first\nERROR: second")
        );
    }

    #[tokio::test]
    async fn test_launch_error_is_reported_not_propagated() {
        let run = run(Script::LaunchFails, false).await;
        let SessionResult::Errored(error) = run.result() else {
            panic!("expected Errored, got {:?}", run.result());
        };

        assert!(matches!(error, AppError::Launch { .. }));
        let expected = format!("An unexpected error occurred: {}", error);
        assert_eq!(run.statuses().last(), Some(&expected.as_str()));
        assert_eq!(run.alerts(), vec![&Notice::unexpected(error)]);
    }

    #[tokio::test]
    async fn test_read_error_mid_stream_ends_errored() {
        let script = Script::Run {
            lines: vec!["partial"],
            read_error: Some(AppError::Io("broken pipe".to_string())),
            exit_code: 0,
            stderr: "",
        };
        let run = run(script, false).await;

        assert!(run.statuses().contains(&"partial"));
        assert!(!run.statuses().contains(&SUCCESS_BANNER));
        assert_eq!(
            run.result(),
            &SessionResult::Errored(AppError::Io("broken pipe".to_string()))
        );
    }

    #[tokio::test]
    async fn test_panic_still_finishes_session() {
        let run = run(Script::Panics, false).await;

        assert_eq!(
            run.result(),
            &SessionResult::Errored(AppError::Panicked("launcher exploded".to_string()))
        );
        let finished = run
            .events
            .iter()
            .filter(|e| matches!(e, SessionEvent::Finished(_)))
            .count();
        assert_eq!(finished, 1);
    }

    #[tokio::test]
    async fn test_missing_destination_is_created() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("videos").join("new");
        let request = DownloadRequest {
            url: URL.to_string(),
            destination: nested.clone(),
            high_quality: false,
        };
        let events = session_stream(
            request,
            ToolConfig::default(),
            ScriptedLauncher::new(exits(vec![], 0, "")),
        )
        .collect::<Vec<_>>()
        .await;

        assert!(nested.is_dir());
        assert_eq!(
            events.last(),
            Some(&SessionEvent::Finished(SessionResult::Succeeded))
        );
    }

    #[test]
    fn test_begin_and_complete_toggle_running_once() {
        let mut controller = DownloadController::new();
        assert!(!controller.is_running());

        let request = controller.begin(URL, "/tmp/videos", true).unwrap();
        assert_eq!(request.url, URL);
        assert!(controller.is_running());
        assert_eq!(controller.phase(), DownloadPhase::Running);

        controller.complete(SessionResult::Errored(AppError::Io("x".to_string())));
        assert!(!controller.is_running());
        assert_eq!(controller.phase(), DownloadPhase::Idle);
    }

    #[test]
    fn test_empty_inputs_are_rejected() {
        let mut controller = DownloadController::new();

        assert_eq!(
            controller.begin("   ", "/tmp/videos", true),
            Err(AppError::Validation(ValidationError::EmptyUrl))
        );
        assert_eq!(
            controller.begin(URL, "", true),
            Err(AppError::Validation(ValidationError::EmptyDestination))
        );
        assert!(!controller.is_running());
        assert_eq!(controller.phase(), DownloadPhase::Idle);
    }

    #[test]
    fn test_url_is_trimmed() {
        let mut controller = DownloadController::new();
        let request = controller
            .begin("  https://example.com/v  ", "/tmp", false)
            .unwrap();
        assert_eq!(request.url, "https://example.com/v");
    }

    #[test]
    fn test_second_start_is_rejected_while_running() {
        let mut controller = DownloadController::new();
        controller.begin(URL, "/tmp/videos", false).unwrap();

        assert_eq!(
            controller.begin("https://example.com/other", "/tmp", false),
            Err(AppError::AlreadyRunning)
        );
        assert!(controller.is_running());

        controller.complete(SessionResult::Succeeded);
        assert!(controller.begin(URL, "/tmp/videos", false).is_ok());
    }
}
