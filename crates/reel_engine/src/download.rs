use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use futures_util::StreamExt;
use reel_core::{progress, sanitize_title, DownloadTask, StatusEvent, TaskId};
use reel_logging::{reel_debug, reel_error, reel_info, reel_warn};
use tokio::process::Child;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;

use crate::lines::OutputLineCodec;
use crate::persist::ensure_output_dir;
use crate::status::StatusSink;
use crate::tool::{background_command, FetchToolConfig};
use crate::types::{BatchOutcome, TaskFailure};

/// Runs download tasks one at a time through the external fetch tool.
///
/// A failed task is reported and the batch moves on. Cancellation kills the
/// running child, marks it and every remaining task cancelled and ends the
/// batch. `BatchComplete` is emitted exactly once per [`run`](Self::run).
#[derive(Debug, Clone, Default)]
pub struct DownloadController {
    tool: FetchToolConfig,
}

impl DownloadController {
    pub fn new(tool: FetchToolConfig) -> Self {
        Self { tool }
    }

    pub async fn run(
        &self,
        mut tasks: Vec<DownloadTask>,
        out_dir: &Path,
        cancel: &CancellationToken,
        sink: &dyn StatusSink,
    ) -> BatchOutcome {
        let mut completed = Vec::new();

        if let Err(err) = ensure_output_dir(out_dir) {
            reel_error!("Cannot use output directory {}: {}", out_dir.display(), err);
            for task in &mut tasks {
                task.fail();
                sink.emit(StatusEvent::TaskFailed {
                    task_id: task.id,
                    message: err.to_string(),
                });
            }
            sink.emit(StatusEvent::BatchComplete {
                succeeded_paths: completed.clone(),
            });
            return BatchOutcome { completed, tasks };
        }

        reel_info!("Starting batch of {} downloads into {}", tasks.len(), out_dir.display());
        let mut taken = HashSet::new();
        for task in &mut tasks {
            if cancel.is_cancelled() {
                task.cancel();
                continue;
            }

            let file_name = claim_file_name(&mut taken, task, &self.tool.output_extension);
            task.start();
            match self.run_one(task, &file_name, out_dir, cancel, sink).await {
                Ok(path) => {
                    reel_info!("Task {} saved {}", task.id, path.display());
                    sink.emit(StatusEvent::TaskComplete {
                        task_id: task.id,
                        path: path.clone(),
                    });
                    completed.push(path.clone());
                    task.succeed(path);
                }
                Err(TaskFailure::Cancelled) => {
                    reel_info!("Task {} cancelled", task.id);
                    task.cancel();
                }
                Err(failure) => {
                    reel_warn!("Task {} ({}) failed: {}", task.id, task.item.url(), failure);
                    task.fail();
                    sink.emit(StatusEvent::TaskFailed {
                        task_id: task.id,
                        message: failure.to_string(),
                    });
                }
            }
        }

        sink.emit(StatusEvent::BatchComplete {
            succeeded_paths: completed.clone(),
        });
        BatchOutcome { completed, tasks }
    }

    async fn run_one(
        &self,
        task: &DownloadTask,
        file_name: &str,
        out_dir: &Path,
        cancel: &CancellationToken,
        sink: &dyn StatusSink,
    ) -> Result<PathBuf, TaskFailure> {
        let target = out_dir.join(file_name);

        let mut child = background_command(&self.tool.program)
            .args(self.tool.args(out_dir, file_name, task.item.url()))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| TaskFailure::Spawn {
                program: self.tool.program.to_string_lossy().into_owned(),
                message: err.to_string(),
            })?;
        reel_debug!("Task {} spawned fetch tool for {}", task.id, task.item.url());

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TaskFailure::Io("stdout not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| TaskFailure::Io("stderr not captured".into()))?;
        let mut lines = futures_util::stream::select(
            FramedRead::new(stdout, OutputLineCodec::new()),
            FramedRead::new(stderr, OutputLineCodec::new()),
        );

        let mut diagnostics = VecDeque::with_capacity(self.tool.diagnostic_lines);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    stop_child(&mut child).await;
                    remove_partial(out_dir, file_name);
                    return Err(TaskFailure::Cancelled);
                }
                next = lines.next() => match next {
                    Some(Ok(line)) => self.observe(task.id, line, sink, &mut diagnostics),
                    Some(Err(err)) => {
                        stop_child(&mut child).await;
                        return Err(TaskFailure::Io(err.to_string()));
                    }
                    None => break,
                },
            }
        }

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                stop_child(&mut child).await;
                remove_partial(out_dir, file_name);
                return Err(TaskFailure::Cancelled);
            }
            status = child.wait() => status.map_err(|err| TaskFailure::Io(err.to_string()))?,
        };

        if !status.success() {
            return Err(TaskFailure::ExitStatus {
                code: status.code(),
                diagnostics: diagnostics.into(),
            });
        }
        if !target.is_file() {
            return Err(TaskFailure::MissingOutput { path: target });
        }
        Ok(target)
    }

    fn observe(
        &self,
        task_id: TaskId,
        line: String,
        sink: &dyn StatusSink,
        diagnostics: &mut VecDeque<String>,
    ) {
        match progress::parse(&line) {
            Some(record) => sink.emit(StatusEvent::Progress {
                task_id,
                percent: record.percent,
                details: record.details(),
            }),
            None => {
                if self.tool.diagnostic_lines == 0 {
                    return;
                }
                if diagnostics.len() == self.tool.diagnostic_lines {
                    diagnostics.pop_front();
                }
                diagnostics.push_back(line);
            }
        }
    }
}

/// `{title}.{ext}`, or `{title} [{id}].{ext}` when an earlier task of the
/// batch already uses that name. Compared case-insensitively.
fn claim_file_name(taken: &mut HashSet<String>, task: &DownloadTask, extension: &str) -> String {
    let extension = extension.trim_start_matches('.');
    let title = sanitize_title(task.item.title());
    let mut name = format!("{title}.{extension}");
    if taken.contains(&name.to_lowercase()) {
        let tagged = format!("{title} [{}]", sanitize_title(task.item.id()));
        name = format!("{tagged}.{extension}");
        let mut counter = 2;
        while taken.contains(&name.to_lowercase()) {
            name = format!("{tagged} ({counter}).{extension}");
            counter += 1;
        }
    }
    taken.insert(name.to_lowercase());
    name
}

async fn stop_child(child: &mut Child) {
    if let Err(err) = child.kill().await {
        reel_debug!("Fetch tool already gone: {}", err);
    }
}

/// The fetch tool leaves `<name>.part` behind when interrupted.
fn remove_partial(out_dir: &Path, file_name: &str) {
    let partial = out_dir.join(format!("{file_name}.part"));
    if partial.exists() {
        if let Err(err) = std::fs::remove_file(&partial) {
            reel_warn!("Could not remove {}: {}", partial.display(), err);
        }
    }
}
