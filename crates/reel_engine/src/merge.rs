use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use reel_core::{concat_list, plan_merge, EpisodePattern};
use reel_logging::{reel_info, reel_warn};
use thiserror::Error;

use crate::persist::{ensure_output_dir, promote_file, PersistError};
use crate::tool::{background_command, ConcatToolConfig};

/// Lines of tool stderr kept in a failure.
const STDERR_TAIL_LINES: usize = 5;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("need at least two files to merge, got {count}")]
    NotEnoughInputs { count: usize },
    #[error("input file missing: {}", .0.display())]
    MissingInput(PathBuf),
    #[error("invalid episode pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("could not start {0}")]
    ToolMissing(String),
    #[error("concat tool failed (code {code:?}): {stderr}")]
    ToolFailed { code: Option<i32>, stderr: String },
    #[error("concat tool produced no output")]
    MissingOutput,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Concatenates downloaded episodes into one file without re-encoding.
#[derive(Debug, Clone)]
pub struct Merger {
    tool: ConcatToolConfig,
    pattern: EpisodePattern,
}

impl Merger {
    pub fn new(tool: ConcatToolConfig) -> Result<Self, MergeError> {
        let pattern = EpisodePattern::new(&tool.episode_pattern)?;
        Ok(Self { tool, pattern })
    }

    /// Merges `files` into a new file in `out_dir` and returns its path.
    ///
    /// The output is written under a temporary name and only renamed once
    /// the tool succeeds; the list file and any partial output are removed
    /// on every path.
    pub async fn merge(&self, files: &[PathBuf], out_dir: &Path) -> Result<PathBuf, MergeError> {
        // The tool runs inside `out_dir`, so every path handed to it is absolute.
        let out_dir = std::path::absolute(out_dir)?;
        let mut inputs: Vec<PathBuf> = Vec::with_capacity(files.len());
        for file in files {
            let file = std::path::absolute(file)?;
            if !inputs.contains(&file) {
                inputs.push(file);
            }
        }
        if inputs.len() < 2 {
            return Err(MergeError::NotEnoughInputs {
                count: inputs.len(),
            });
        }
        if let Some(missing) = inputs.iter().find(|path| !path.is_file()) {
            return Err(MergeError::MissingInput(missing.clone()));
        }
        ensure_output_dir(&out_dir)?;

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
        let job = plan_merge(&inputs, &self.pattern, &self.tool.output_extension, &timestamp);
        let target = out_dir.join(&job.output_file_name);
        reel_info!(
            "Merging {} files into {}",
            job.inputs.len(),
            target.display()
        );

        let mut list = tempfile::Builder::new()
            .prefix("concat_list_")
            .suffix(".txt")
            .tempfile_in(&out_dir)?;
        list.write_all(concat_list(&job.inputs, &out_dir).as_bytes())?;
        list.flush()?;

        let partial = PartialOutput::new(partial_path(&target, &self.tool.output_extension));
        let output = background_command(&self.tool.program)
            .args(self.tool.args(list.path(), partial.path()))
            .current_dir(&out_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| {
                reel_warn!("Failed to start concat tool: {}", err);
                MergeError::ToolMissing(self.tool.program.to_string_lossy().into_owned())
            })?;

        if !output.status.success() {
            return Err(MergeError::ToolFailed {
                code: output.status.code(),
                stderr: stderr_tail(&output.stderr),
            });
        }
        if !partial.path().is_file() {
            return Err(MergeError::MissingOutput);
        }

        promote_file(partial.path(), &target)?;
        partial.disarm();
        Ok(target)
    }
}

/// `Full_x 1-3_ts.mp4` -> `Full_x 1-3_ts.part.mp4`, keeping the extension
/// so the concat tool still picks the right container.
fn partial_path(target: &Path, extension: &str) -> PathBuf {
    let extension = extension.trim_start_matches('.');
    let stem = target
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!("{stem}.part.{extension}"))
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join(" | ")
}

/// Removes the partial output on drop unless disarmed.
struct PartialOutput {
    path: PathBuf,
    armed: bool,
}

impl PartialOutput {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PartialOutput {
    fn drop(&mut self) {
        if self.armed && self.path.exists() {
            if let Err(err) = std::fs::remove_file(&self.path) {
                reel_warn!("Could not remove {}: {}", self.path.display(), err);
            }
        }
    }
}
