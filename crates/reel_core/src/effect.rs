use std::path::PathBuf;

use crate::DownloadTask;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartDiscovery { seed_url: String },
    LoadMoreDiscovery,
    CancelDiscovery,
    StartDownload { tasks: Vec<DownloadTask> },
    CancelDownload,
    Merge { files: Vec<PathBuf> },
}
