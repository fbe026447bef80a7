use std::ffi::OsStr;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;

use crate::domain::{AppError, ProcessOutcome};

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Starts the external tool. Split out so the controller can be driven by a scripted child in tests.
pub trait ToolLauncher: Send + Sync {
    fn launch(&self, argv: &[String]) -> Result<Box<dyn ToolProcess>, AppError>;
}

/// A running child, consumed in two phases: drain stdout, then `finish`.
#[async_trait]
pub trait ToolProcess: Send {
    /// Next stdout line without its terminator, or `None` once the child closes stdout.
    async fn next_line(&mut self) -> Result<Option<String>, AppError>;

    /// Waits for exit and collects the buffered stderr text.
    async fn finish(self: Box<Self>) -> Result<ProcessOutcome, AppError>;
}

/// Spawns real child processes through tokio.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl ToolLauncher for SystemLauncher {
    fn launch(&self, argv: &[String]) -> Result<Box<dyn ToolProcess>, AppError> {
        let (program, args) = argv.split_first().ok_or_else(|| AppError::Launch {
            program: String::new(),
            reason: "empty command line".to_string(),
        })?;

        let mut child = hidden_command(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AppError::Launch {
                program: program.clone(),
                reason: e.to_string(),
            })?;

        tracing::info!(program = %program, args = args.len(), pid = ?child.id(), "spawned download tool");

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Io("child stdout was not captured".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| AppError::Io("child stderr was not captured".to_string()))?;

        // Drained in the background so a full stderr pipe can never stall the child.
        let stderr_reader = tokio::spawn(async move {
            let mut buf = Vec::new();
            stderr.read_to_end(&mut buf).await?;
            Ok::<_, std::io::Error>(String::from_utf8_lossy(&buf).into_owned())
        });

        Ok(Box::new(SystemProcess {
            child,
            stdout: BufReader::new(stdout),
            stderr_reader,
            buf: Vec::new(),
            after_cr: false,
        }))
    }
}

fn hidden_command(program: impl AsRef<OsStr>) -> Command {
    let mut command = Command::new(program);
    #[cfg(target_os = "windows")]
    {
        command.creation_flags(CREATE_NO_WINDOW);
    }
    command
}

struct SystemProcess {
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr_reader: JoinHandle<std::io::Result<String>>,
    buf: Vec<u8>,
    /// Last line ended on `\r`; a `\n` right after it belongs to the same terminator.
    after_cr: bool,
}

#[async_trait]
impl ToolProcess for SystemProcess {
    async fn next_line(&mut self) -> Result<Option<String>, AppError> {
        // Progress updates are separated by bare `\r`, so `\r`, `\n` and `\r\n` all end a line.
        self.buf.clear();
        loop {
            let available = self.stdout.fill_buf().await?;
            if available.is_empty() {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                break;
            }

            if self.after_cr && available[0] == b'\n' {
                self.after_cr = false;
                self.stdout.consume(1);
                continue;
            }
            self.after_cr = false;

            match available.iter().position(|b| *b == b'\n' || *b == b'\r') {
                Some(end) => {
                    self.after_cr = available[end] == b'\r';
                    self.buf.extend_from_slice(&available[..end]);
                    self.stdout.consume(end + 1);
                    break;
                }
                None => {
                    let len = available.len();
                    self.buf.extend_from_slice(available);
                    self.stdout.consume(len);
                }
            }
        }
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }

    async fn finish(self: Box<Self>) -> Result<ProcessOutcome, AppError> {
        let SystemProcess {
            mut child,
            stdout,
            stderr_reader,
            ..
        } = *self;
        drop(stdout);

        let status = child.wait().await?;
        let stderr_text = stderr_reader
            .await
            .map_err(|e| AppError::Io(format!("stderr reader failed: {}", e)))??;

        // Killed by a signal leaves no code.
        let exit_code = status.code().unwrap_or(-1);
        tracing::info!(exit_code, "download tool exited");

        Ok(ProcessOutcome {
            exit_code,
            stderr_text,
        })
    }
}
