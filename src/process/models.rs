use std::path::Path;

use crate::domain::DownloadRequest;

/// Overrides the interpreter used to run the download tool.
pub const INTERPRETER_ENV: &str = "VIDEO_DOWNLOADER_PYTHON";

/// How the external download tool is invoked
#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub interpreter: String,
    pub tool_module: String,
    pub filename_template: String,
    pub format_selector: String,
    pub merge_format: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        let interpreter = if cfg!(windows) { "python" } else { "python3" };
        Self {
            interpreter: interpreter.to_string(),
            tool_module: "yt_dlp".to_string(),
            filename_template: "%(title)s.%(ext)s".to_string(),
            format_selector: "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best"
                .to_string(),
            merge_format: "mp4".to_string(),
        }
    }
}

impl ToolConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(interpreter) = std::env::var(INTERPRETER_ENV) {
            if !interpreter.trim().is_empty() {
                config.interpreter = interpreter;
            }
        }
        config
    }

    /// `<interpreter> -m <module> [-f <selector> --merge-output-format <fmt>] -o <dest>/<template> <url>`
    pub fn command_line(&self, request: &DownloadRequest) -> Vec<String> {
        let mut argv = vec![
            self.interpreter.clone(),
            "-m".to_string(),
            self.tool_module.clone(),
        ];

        if request.high_quality {
            argv.extend([
                "-f".to_string(),
                self.format_selector.clone(),
                "--merge-output-format".to_string(),
                self.merge_format.clone(),
            ]);
        }

        argv.push("-o".to_string());
        argv.push(self.output_template(&request.destination));
        argv.push(request.url.clone());
        argv
    }

    fn output_template(&self, destination: &Path) -> String {
        destination
            .join(&self.filename_template)
            .to_string_lossy()
            .into_owned()
    }
}
