use std::io::{self, Write};

use reel_core::{AppViewModel, StatusEvent, TaskState};
use reel_logging::reel_warn;

/// Writes pipeline events and the link list to stdout.
pub struct Renderer {
    json: bool,
}

impl Renderer {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn event(&self, event: &StatusEvent, view: &AppViewModel) {
        let line = if self.json {
            match serde_json::to_string(event) {
                Ok(line) => line,
                Err(err) => {
                    reel_warn!("Failed to serialize status event: {}", err);
                    return;
                }
            }
        } else {
            match event_line(event, view) {
                Some(line) => line,
                None => return,
            }
        };
        print_line(&line);
    }

    /// Numbered listing, 1-based to match `--select`.
    pub fn items(&self, view: &AppViewModel) {
        if self.json {
            return;
        }
        for (index, row) in view.items.iter().enumerate() {
            print_line(&format!("{:>4}. {}  {}", index + 1, row.title, row.url));
        }
    }

    pub fn status(&self, view: &AppViewModel) {
        if !self.json && !view.status_line.is_empty() {
            print_line(&view.status_line);
        }
    }

    pub fn summary(&self, view: &AppViewModel) {
        if self.json {
            return;
        }
        for row in &view.tasks {
            let outcome = match row.state {
                TaskState::Succeeded => "ok",
                TaskState::Failed => "failed",
                TaskState::Cancelled => "cancelled",
                TaskState::Pending | TaskState::Running => "unfinished",
            };
            let note = row
                .message
                .as_deref()
                .map(|message| format!(" ({message})"))
                .or_else(|| row.output.as_ref().map(|path| format!(" -> {}", path.display())))
                .unwrap_or_default();
            print_line(&format!("  [{outcome}] {}{note}", row.title));
        }
        if let Some(path) = &view.last_merge {
            print_line(&format!("Merged file: {}", path.display()));
        }
    }
}

fn event_line(event: &StatusEvent, view: &AppViewModel) -> Option<String> {
    let title = |task_id| {
        view.tasks
            .iter()
            .find(|row| row.task_id == task_id)
            .map(|row| row.title.clone())
            .unwrap_or_else(|| format!("task {task_id}"))
    };
    let line = match event {
        StatusEvent::LinkFound { item } => format!("+ {}  {}", item.title(), item.url()),
        StatusEvent::DiscoveryComplete { count } => format!("Discovery finished: {count} links"),
        StatusEvent::DiscoveryFailed { reason } => format!("Discovery failed: {reason}"),
        StatusEvent::Progress {
            task_id,
            percent,
            details,
        } => format!("{} {percent:5.1}% {details}", title(*task_id)),
        StatusEvent::TaskComplete { task_id, path } => {
            format!("{} done: {}", title(*task_id), path.display())
        }
        StatusEvent::TaskFailed { task_id, message } => {
            format!("{} failed: {message}", title(*task_id))
        }
        // The status line announces batch and merge outcomes.
        StatusEvent::BatchComplete { .. }
        | StatusEvent::MergeComplete { .. }
        | StatusEvent::MergeFailed { .. } => return None,
    };
    Some(line)
}

fn print_line(line: &str) {
    let mut stdout = io::stdout().lock();
    // Closed pipes are not worth failing the batch over.
    let _ = writeln!(stdout, "{line}");
}
