use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use reel_core::{DiscoveryError, DownloadTask, Normalizer, NormalizerConfig, StatusEvent};
use reel_logging::{reel_debug, reel_error, reel_info, reel_warn};
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::discovery::{DiscoveryConfig, DiscoveryEngine};
use crate::download::DownloadController;
use crate::merge::Merger;
use crate::provider::PageSnapshotProvider;
use crate::status::{ChannelStatusSink, StatusSink};
use crate::tool::{ConcatToolConfig, FetchToolConfig};

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub normalizer: NormalizerConfig,
    pub discovery: DiscoveryConfig,
    pub fetch_tool: FetchToolConfig,
    pub concat_tool: ConcatToolConfig,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error("a download batch is already running")]
    BatchRunning,
    #[error("engine worker has stopped")]
    WorkerGone,
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to start engine worker: {0}")]
    Runtime(#[from] io::Error),
}

enum EngineCommand {
    Discover {
        seed_url: String,
        engine: OwnedMutexGuard<DiscoveryEngine>,
        cancel: CancellationToken,
    },
    LoadMore {
        engine: OwnedMutexGuard<DiscoveryEngine>,
        cancel: CancellationToken,
    },
    WatchInterrupts {
        interrupts: Interrupts,
        cancel: CancellationToken,
    },
    Download {
        tasks: Vec<DownloadTask>,
        out_dir: PathBuf,
        cancel: CancellationToken,
    },
    Merge {
        files: Vec<PathBuf>,
        out_dir: PathBuf,
    },
}

type BatchSlot = Arc<Mutex<Option<CancellationToken>>>;

/// Number of Ctrl-C presses seen since [`EngineHandle::watch_interrupts`].
#[derive(Debug, Clone, Default)]
pub struct Interrupts(Arc<AtomicUsize>);

impl Interrupts {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Control-side handle to the pipeline worker.
///
/// Every call returns immediately; results arrive as [`StatusEvent`]s drained
/// with [`EngineHandle::try_recv`].
pub struct EngineHandle {
    cmd_tx: Option<mpsc::Sender<EngineCommand>>,
    event_rx: mpsc::Receiver<StatusEvent>,
    discovery: Arc<tokio::sync::Mutex<DiscoveryEngine>>,
    discovery_cancel: Mutex<Option<CancellationToken>>,
    batch: BatchSlot,
    root: CancellationToken,
    worker: Option<thread::JoinHandle<()>>,
}

impl EngineHandle {
    pub fn new(
        config: EngineConfig,
        provider: Box<dyn PageSnapshotProvider>,
    ) -> Result<Self, EngineError> {
        let normalizer =
            Normalizer::new(config.normalizer).map_err(|err| EngineError::Config(err.to_string()))?;
        let merger =
            Merger::new(config.concat_tool).map_err(|err| EngineError::Config(err.to_string()))?;
        let downloader = DownloadController::new(config.fetch_tool);
        let discovery = DiscoveryEngine::new(provider, Arc::new(normalizer), config.discovery);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("reel-engine-rt")
            .build()?;

        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let batch: BatchSlot = Arc::new(Mutex::new(None));
        let worker_batch = batch.clone();

        let worker = thread::Builder::new()
            .name("reel-engine".to_string())
            .spawn(move || {
                let tracker = TaskTracker::new();
                let worker = Worker {
                    downloader,
                    merger: Arc::new(merger),
                    batch: worker_batch,
                    event_tx,
                };
                while let Ok(command) = cmd_rx.recv() {
                    tracker.spawn_on(worker.handle(command), runtime.handle());
                }
                tracker.close();
                runtime.block_on(tracker.wait());
                reel_debug!("Engine worker stopped");
            })?;

        Ok(Self {
            cmd_tx: Some(cmd_tx),
            event_rx,
            discovery: Arc::new(tokio::sync::Mutex::new(discovery)),
            discovery_cancel: Mutex::new(None),
            batch,
            root: CancellationToken::new(),
            worker: Some(worker),
        })
    }

    /// Starts discovering links below `seed_url`.
    ///
    /// Rejected with [`DiscoveryError::AlreadyRunning`] while a discovery is
    /// in flight.
    pub fn start_discovery(&self, seed_url: impl Into<String>) -> Result<(), EngineError> {
        let engine = self
            .discovery
            .clone()
            .try_lock_owned()
            .map_err(|_| DiscoveryError::AlreadyRunning)?;
        let cancel = self.root.child_token();
        *lock(&self.discovery_cancel) = Some(cancel.clone());
        self.send(EngineCommand::Discover {
            seed_url: seed_url.into(),
            engine,
            cancel,
        })
    }

    /// Continues the last discovery on its open browsing session.
    ///
    /// Reports through the same events as [`EngineHandle::start_discovery`];
    /// without an open session that is a `DiscoveryFailed`.
    pub fn load_more(&self) -> Result<(), EngineError> {
        let engine = self
            .discovery
            .clone()
            .try_lock_owned()
            .map_err(|_| DiscoveryError::AlreadyRunning)?;
        let cancel = self.root.child_token();
        *lock(&self.discovery_cancel) = Some(cancel.clone());
        self.send(EngineCommand::LoadMore { engine, cancel })
    }

    /// Tears down a browsing session a capped discovery left open.
    pub fn release_discovery(&self) -> Result<(), EngineError> {
        let mut engine = self
            .discovery
            .clone()
            .try_lock_owned()
            .map_err(|_| DiscoveryError::AlreadyRunning)?;
        engine.release_session();
        Ok(())
    }

    /// Counts Ctrl-C presses on the engine runtime from now until shutdown.
    /// The default process exit on Ctrl-C is replaced while this runs.
    pub fn watch_interrupts(&self) -> Result<Interrupts, EngineError> {
        let interrupts = Interrupts::default();
        self.send(EngineCommand::WatchInterrupts {
            interrupts: interrupts.clone(),
            cancel: self.root.child_token(),
        })?;
        Ok(interrupts)
    }

    pub fn cancel_discovery(&self) {
        if let Some(token) = lock(&self.discovery_cancel).take() {
            reel_info!("Cancelling discovery");
            token.cancel();
        }
    }

    pub fn start_download(
        &self,
        tasks: Vec<DownloadTask>,
        out_dir: impl Into<PathBuf>,
    ) -> Result<(), EngineError> {
        let cancel = {
            let mut slot = lock(&self.batch);
            if slot.is_some() {
                return Err(EngineError::BatchRunning);
            }
            let cancel = self.root.child_token();
            *slot = Some(cancel.clone());
            cancel
        };
        let sent = self.send(EngineCommand::Download {
            tasks,
            out_dir: out_dir.into(),
            cancel,
        });
        if sent.is_err() {
            lock(&self.batch).take();
        }
        sent
    }

    pub fn cancel_download(&self) {
        if let Some(token) = lock(&self.batch).as_ref() {
            reel_info!("Cancelling download batch");
            token.cancel();
        }
    }

    pub fn merge(&self, files: Vec<PathBuf>, out_dir: impl Into<PathBuf>) -> Result<(), EngineError> {
        self.send(EngineCommand::Merge {
            files,
            out_dir: out_dir.into(),
        })
    }

    pub fn try_recv(&self) -> Option<StatusEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<StatusEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    /// Cancels running work, waits for it to wind down and stops the worker.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn send(&self, command: EngineCommand) -> Result<(), EngineError> {
        self.cmd_tx
            .as_ref()
            .ok_or(EngineError::WorkerGone)?
            .send(command)
            .map_err(|_| EngineError::WorkerGone)
    }

    fn stop(&mut self) {
        self.root.cancel();
        self.cmd_tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                reel_error!("Engine worker panicked");
            }
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Worker {
    downloader: DownloadController,
    merger: Arc<Merger>,
    batch: BatchSlot,
    event_tx: mpsc::Sender<StatusEvent>,
}

impl Worker {
    fn handle(&self, command: EngineCommand) -> impl std::future::Future<Output = ()> + Send + 'static {
        let sink = ChannelStatusSink::new(self.event_tx.clone());
        let downloader = self.downloader.clone();
        let merger = self.merger.clone();
        let batch = self.batch.clone();
        async move {
            match command {
                EngineCommand::Discover {
                    seed_url,
                    mut engine,
                    cancel,
                } => {
                    let held = HoldOutcome::new(&sink);
                    // Outcome already reported through the sink.
                    let _ = engine.start(&seed_url, &held, &cancel).await;
                    drop(engine);
                    held.flush();
                }
                EngineCommand::LoadMore { mut engine, cancel } => {
                    let held = HoldOutcome::new(&sink);
                    let _ = engine.load_more(&held, &cancel).await;
                    drop(engine);
                    held.flush();
                }
                EngineCommand::WatchInterrupts { interrupts, cancel } => loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        signal = tokio::signal::ctrl_c() => match signal {
                            Ok(()) => {
                                reel_info!("Interrupt received");
                                interrupts.record();
                            }
                            Err(err) => {
                                reel_warn!("Cannot listen for Ctrl-C: {}", err);
                                break;
                            }
                        },
                    }
                },
                EngineCommand::Download {
                    tasks,
                    out_dir,
                    cancel,
                } => {
                    let outcome = downloader.run(tasks, &out_dir, &cancel, &sink).await;
                    reel_info!(
                        "Batch finished: {} of {} downloaded",
                        outcome.completed.len(),
                        outcome.tasks.len()
                    );
                    lock(&batch).take();
                }
                EngineCommand::Merge { files, out_dir } => {
                    let event = match merger.merge(&files, &out_dir).await {
                        Ok(path) => StatusEvent::MergeComplete { path },
                        Err(err) => {
                            reel_error!("Merge failed: {}", err);
                            StatusEvent::MergeFailed {
                                reason: err.to_string(),
                            }
                        }
                    };
                    sink.emit(event);
                }
            }
        }
    }
}

/// Keeps the closing discovery event until the discovery lock is released,
/// so a caller reacting to it can immediately start the next discovery.
struct HoldOutcome<'a> {
    inner: &'a dyn StatusSink,
    outcome: Mutex<Option<StatusEvent>>,
}

impl<'a> HoldOutcome<'a> {
    fn new(inner: &'a dyn StatusSink) -> Self {
        Self {
            inner,
            outcome: Mutex::new(None),
        }
    }

    fn flush(self) {
        let outcome = self
            .outcome
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(event) = outcome {
            self.inner.emit(event);
        }
    }
}

impl StatusSink for HoldOutcome<'_> {
    fn emit(&self, event: StatusEvent) {
        match event {
            StatusEvent::DiscoveryComplete { .. } | StatusEvent::DiscoveryFailed { .. } => {
                *lock(&self.outcome) = Some(event);
            }
            event => self.inner.emit(event),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
