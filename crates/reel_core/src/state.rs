use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::PathBuf;

use serde::Serialize;

use crate::view_model::{AppViewModel, LastPasteStats, LinkRowView, TaskRowView};
use crate::{DownloadTask, LinkItem, TaskId, TaskState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SessionState {
    #[default]
    Idle,
    Discovering,
    Downloading,
    Merging,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TaskRow {
    title: String,
    state: TaskState,
    percent: f64,
    details: String,
    message: Option<String>,
    output: Option<PathBuf>,
}

/// Presentation state: the link list, the selection and the rows of the
/// current batch. Mutated only through [`crate::update`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    session: SessionState,
    seed_url: Option<String>,
    items: Vec<LinkItem>,
    seen_ids: HashSet<String>,
    selected: BTreeSet<String>,
    merge_enabled: bool,
    tasks: BTreeMap<TaskId, TaskRow>,
    next_task_id: TaskId,
    cancel_requested: bool,
    status_line: String,
    last_paste_stats: Option<LastPasteStats>,
    last_merge: Option<PathBuf>,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> SessionState {
        self.session
    }

    pub fn seed_url(&self) -> Option<&str> {
        self.seed_url.as_deref()
    }

    pub fn items(&self) -> &[LinkItem] {
        &self.items
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            session: self.session,
            seed_url: self.seed_url.clone(),
            items: self
                .items
                .iter()
                .map(|item| LinkRowView {
                    id: item.id().to_string(),
                    title: item.title().to_string(),
                    url: item.url().to_string(),
                    selected: self.selected.contains(item.id()),
                })
                .collect(),
            selected_count: self.selected.len(),
            merge_enabled: self.merge_enabled,
            merge_available: self.selected.len() >= 2,
            tasks: self
                .tasks
                .iter()
                .map(|(task_id, row)| TaskRowView {
                    task_id: *task_id,
                    title: row.title.clone(),
                    state: row.state,
                    percent: row.percent,
                    details: row.details.clone(),
                    message: row.message.clone(),
                    output: row.output.clone(),
                })
                .collect(),
            status_line: self.status_line.clone(),
            last_paste_stats: self.last_paste_stats.clone(),
            last_merge: self.last_merge.clone(),
            dirty: self.dirty,
        }
    }

    /// Returns whether the state changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn set_status(&mut self, status: impl Into<String>) {
        self.status_line = status.into();
        self.dirty = true;
    }

    pub(crate) fn set_session(&mut self, session: SessionState) {
        self.session = session;
        self.dirty = true;
    }

    pub(crate) fn begin_discovery(&mut self, seed_url: &str) {
        self.clear_items();
        self.seed_url = Some(seed_url.to_string());
        self.session = SessionState::Discovering;
        self.dirty = true;
    }

    /// Appends `item` unless its id is already listed.
    pub(crate) fn add_item(&mut self, item: LinkItem) -> bool {
        if !self.seen_ids.insert(item.id().to_string()) {
            return false;
        }
        self.items.push(item);
        self.dirty = true;
        true
    }

    pub(crate) fn set_last_paste_stats(&mut self, added: usize, skipped: usize) {
        self.last_paste_stats = Some(LastPasteStats { added, skipped });
        self.dirty = true;
    }

    pub(crate) fn set_selection(&mut self, ids: impl IntoIterator<Item = String>) {
        let known = &self.seen_ids;
        self.selected = ids.into_iter().filter(|id| known.contains(id)).collect();
        if self.selected.len() < 2 {
            self.merge_enabled = false;
        }
        self.dirty = true;
    }

    pub(crate) fn select_all(&mut self) {
        let ids: Vec<String> = self.items.iter().map(|i| i.id().to_string()).collect();
        self.set_selection(ids);
    }

    pub(crate) fn delete_selected(&mut self) {
        let selected = std::mem::take(&mut self.selected);
        self.items.retain(|item| !selected.contains(item.id()));
        self.seen_ids.retain(|id| !selected.contains(id));
        self.merge_enabled = false;
        self.dirty = true;
    }

    pub(crate) fn clear_items(&mut self) {
        self.items.clear();
        self.seen_ids.clear();
        self.selected.clear();
        self.merge_enabled = false;
        self.dirty = true;
    }

    /// Merge is only offered for two or more selected items.
    pub(crate) fn set_merge_enabled(&mut self, enabled: bool) {
        self.merge_enabled = enabled && self.selected.len() >= 2;
        self.dirty = true;
    }

    pub(crate) fn merge_enabled(&self) -> bool {
        self.merge_enabled
    }

    pub(crate) fn cancel_requested(&self) -> bool {
        self.cancel_requested
    }

    pub(crate) fn request_cancel(&mut self) {
        self.cancel_requested = true;
        self.dirty = true;
    }

    /// Builds one task per selected item, in list order, and starts the batch.
    pub(crate) fn begin_batch(&mut self) -> Vec<DownloadTask> {
        let selected_items: Vec<LinkItem> = self
            .items
            .iter()
            .filter(|item| self.selected.contains(item.id()))
            .cloned()
            .collect();

        self.tasks.clear();
        self.cancel_requested = false;
        let mut tasks = Vec::with_capacity(selected_items.len());
        for item in selected_items {
            self.next_task_id += 1;
            let task_id = self.next_task_id;
            self.tasks.insert(
                task_id,
                TaskRow {
                    title: item.title().to_string(),
                    state: TaskState::Pending,
                    percent: 0.0,
                    details: String::new(),
                    message: None,
                    output: None,
                },
            );
            tasks.push(DownloadTask::new(task_id, item));
        }
        self.session = SessionState::Downloading;
        self.dirty = true;
        tasks
    }

    pub(crate) fn apply_progress(&mut self, task_id: TaskId, percent: f64, details: String) {
        if let Some(row) = self.tasks.get_mut(&task_id) {
            if !row.state.is_terminal() {
                row.state = TaskState::Running;
            }
            row.percent = percent;
            row.details = details;
            self.dirty = true;
        }
    }

    pub(crate) fn apply_task_complete(&mut self, task_id: TaskId, path: PathBuf) {
        if let Some(row) = self.tasks.get_mut(&task_id) {
            row.state = TaskState::Succeeded;
            row.percent = 100.0;
            row.output = Some(path);
            self.dirty = true;
        }
    }

    pub(crate) fn apply_task_failed(&mut self, task_id: TaskId, message: String) {
        if let Some(row) = self.tasks.get_mut(&task_id) {
            row.state = TaskState::Failed;
            row.message = Some(message);
            self.dirty = true;
        }
    }

    /// Rows still open when the batch ends were stopped by cancellation.
    pub(crate) fn finish_batch(&mut self) {
        for row in self.tasks.values_mut() {
            if !row.state.is_terminal() {
                row.state = TaskState::Cancelled;
            }
        }
        self.cancel_requested = false;
        self.dirty = true;
    }

    pub(crate) fn set_last_merge(&mut self, path: PathBuf) {
        self.last_merge = Some(path);
        self.dirty = true;
    }
}
