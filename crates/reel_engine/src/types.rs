use std::path::PathBuf;

use reel_core::DownloadTask;
use thiserror::Error;

/// Why a single download ended without a file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskFailure {
    #[error("could not start {program}: {message}")]
    Spawn { program: String, message: String },
    #[error("{}", exit_message(*code, diagnostics))]
    ExitStatus {
        code: Option<i32>,
        diagnostics: Vec<String>,
    },
    #[error("tool reported success but {} is missing", path.display())]
    MissingOutput { path: PathBuf },
    #[error("io error: {0}")]
    Io(String),
    #[error("cancelled")]
    Cancelled,
}

/// Diagnostic lines quoted in a failure message.
const FAILURE_TAIL_LINES: usize = 3;

fn exit_message(code: Option<i32>, diagnostics: &[String]) -> String {
    let status = match code {
        Some(code) => format!("fetch tool exited with code {code}"),
        None => "fetch tool was terminated by a signal".to_string(),
    };
    let tail = &diagnostics[diagnostics.len().saturating_sub(FAILURE_TAIL_LINES)..];
    if tail.is_empty() {
        status
    } else {
        format!("{status}: {}", tail.join(" | "))
    }
}

/// Result of one sequential batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Output files of succeeded tasks, in task order.
    pub completed: Vec<PathBuf>,
    /// Every task in its final state.
    pub tasks: Vec<DownloadTask>,
}

impl BatchOutcome {
    pub fn cancelled(&self) -> bool {
        self.tasks
            .iter()
            .any(|task| task.state() == reel_core::TaskState::Cancelled)
    }
}
