use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::{LinkItem, TaskId};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed | TaskState::Cancelled
        )
    }
}

/// One attempt at downloading one item.
///
/// Only the download controller moves a task between states; terminal
/// states are sticky and further transitions are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub id: TaskId,
    pub item: LinkItem,
    pub attempt: u32,
    pub max_attempts: u32,
    state: TaskState,
    output_path: Option<PathBuf>,
}

impl DownloadTask {
    pub fn new(id: TaskId, item: LinkItem) -> Self {
        Self {
            id,
            item,
            attempt: 1,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            state: TaskState::Pending,
            output_path: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// A fresh `Pending` task for the same item when this attempt failed and
    /// the attempt budget allows another.
    pub fn next_attempt(&self, id: TaskId) -> Option<DownloadTask> {
        if self.state != TaskState::Failed || self.attempt >= self.max_attempts {
            return None;
        }
        Some(DownloadTask {
            id,
            item: self.item.clone(),
            attempt: self.attempt + 1,
            max_attempts: self.max_attempts,
            state: TaskState::Pending,
            output_path: None,
        })
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    pub fn start(&mut self) {
        if self.state == TaskState::Pending {
            self.state = TaskState::Running;
        }
    }

    pub fn succeed(&mut self, output_path: PathBuf) {
        if self.state == TaskState::Running {
            self.state = TaskState::Succeeded;
            self.output_path = Some(output_path);
        }
    }

    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = TaskState::Failed;
        }
    }

    pub fn cancel(&mut self) {
        if !self.state.is_terminal() {
            self.state = TaskState::Cancelled;
        }
    }
}
