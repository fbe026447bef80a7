use std::path::PathBuf;

/// Strip trailing `\n` / `\r\n` (and stray `\r`) from a line read off a pipe
pub fn trim_line_ending(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

/// Where downloads go until the user picks a folder
pub fn default_download_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}
