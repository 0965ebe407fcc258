use std::ffi::{OsStr, OsString};
use std::path::Path;

use reel_core::DEFAULT_EPISODE_PATTERN;
use tokio::process::Command;

/// `Command` for an external tool that must not pop up a console window.
pub fn background_command(program: impl AsRef<OsStr>) -> Command {
    let mut cmd = Command::new(program);
    configure_for_background(&mut cmd);
    cmd
}

#[cfg(windows)]
fn configure_for_background(cmd: &mut Command) {
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    cmd.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
fn configure_for_background(_cmd: &mut Command) {}

/// The per-item downloader (yt-dlp compatible command line).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchToolConfig {
    pub program: OsString,
    /// Flags placed between the output options and the URL.
    pub extra_args: Vec<String>,
    pub output_extension: String,
    /// Trailing non-progress lines quoted in a failure message.
    pub diagnostic_lines: usize,
}

impl Default for FetchToolConfig {
    fn default() -> Self {
        Self {
            program: OsString::from("yt-dlp"),
            extra_args: ["--newline", "--progress", "--no-warnings", "--force-overwrites"]
                .into_iter()
                .map(String::from)
                .collect(),
            output_extension: "mp4".to_string(),
            diagnostic_lines: 20,
        }
    }
}

impl FetchToolConfig {
    /// `-P <dir> -o <file> <extra args...> <url>`
    pub fn args(&self, out_dir: &Path, file_name: &str, url: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-P".into(),
            out_dir.as_os_str().to_os_string(),
            "-o".into(),
            file_name.into(),
        ];
        args.extend(self.extra_args.iter().map(OsString::from));
        args.push(url.into());
        args
    }
}

/// The stream-copy concatenator (ffmpeg compatible command line).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcatToolConfig {
    pub program: OsString,
    pub output_extension: String,
    /// Regex with one capture group holding the episode number.
    pub episode_pattern: String,
}

impl Default for ConcatToolConfig {
    fn default() -> Self {
        Self {
            program: OsString::from("ffmpeg"),
            output_extension: "mp4".to_string(),
            episode_pattern: DEFAULT_EPISODE_PATTERN.to_string(),
        }
    }
}

impl ConcatToolConfig {
    pub fn args(&self, list_file: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "-y",
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "concat",
            "-safe",
            "0",
            "-i",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.push(list_file.as_os_str().to_os_string());
        args.extend(["-c", "copy"].map(OsString::from));
        args.push(output.as_os_str().to_os_string());
        args
    }
}
