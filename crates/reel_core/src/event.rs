use std::path::PathBuf;

use serde::Serialize;

use crate::{LinkItem, TaskId};

/// Events posted from pipeline workers to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StatusEvent {
    LinkFound {
        item: LinkItem,
    },
    DiscoveryComplete {
        count: usize,
    },
    DiscoveryFailed {
        reason: String,
    },
    Progress {
        task_id: TaskId,
        percent: f64,
        details: String,
    },
    /// One task produced its output file.
    TaskComplete {
        task_id: TaskId,
        path: PathBuf,
    },
    TaskFailed {
        task_id: TaskId,
        message: String,
    },
    BatchComplete {
        succeeded_paths: Vec<PathBuf>,
    },
    MergeComplete {
        path: PathBuf,
    },
    MergeFailed {
        reason: String,
    },
}
