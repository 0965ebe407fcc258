use std::path::PathBuf;

use crate::{SessionState, TaskId, TaskState};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LastPasteStats {
    pub added: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppViewModel {
    pub session: SessionState,
    pub seed_url: Option<String>,
    pub items: Vec<LinkRowView>,
    pub selected_count: usize,
    pub merge_enabled: bool,
    pub merge_available: bool,
    pub tasks: Vec<TaskRowView>,
    pub status_line: String,
    pub last_paste_stats: Option<LastPasteStats>,
    pub last_merge: Option<PathBuf>,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRowView {
    pub id: String,
    pub title: String,
    pub url: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskRowView {
    pub task_id: TaskId,
    pub title: String,
    pub state: TaskState,
    pub percent: f64,
    pub details: String,
    pub message: Option<String>,
    pub output: Option<PathBuf>,
}
