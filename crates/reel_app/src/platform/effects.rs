use std::path::PathBuf;
use std::time::Duration;

use reel_core::{Effect, Msg, StatusEvent};
use reel_engine::{EngineError, EngineHandle, Interrupts};
use reel_logging::{reel_info, reel_warn};

/// Executes core effects against the engine.
pub struct EffectRunner {
    engine: EngineHandle,
    out_dir: PathBuf,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle, out_dir: PathBuf) -> Self {
        Self { engine, out_dir }
    }

    /// Starts each effect. Rejected effects come back as the status message
    /// that closes the corresponding phase, so the state machine never waits
    /// on work that was not started.
    pub fn run(&self, effects: Vec<Effect>) -> Vec<Msg> {
        let mut follow_up = Vec::new();
        for effect in effects {
            match effect {
                Effect::StartDiscovery { seed_url } => {
                    reel_info!("StartDiscovery url={}", seed_url);
                    if let Err(err) = self.engine.start_discovery(seed_url) {
                        follow_up.push(rejected(&err, |reason| StatusEvent::DiscoveryFailed {
                            reason,
                        }));
                    }
                }
                Effect::LoadMoreDiscovery => {
                    reel_info!("LoadMoreDiscovery");
                    if let Err(err) = self.engine.load_more() {
                        follow_up.push(rejected(&err, |reason| StatusEvent::DiscoveryFailed {
                            reason,
                        }));
                    }
                }
                Effect::CancelDiscovery => self.engine.cancel_discovery(),
                Effect::StartDownload { tasks } => {
                    reel_info!("StartDownload tasks={} out={:?}", tasks.len(), self.out_dir);
                    if let Err(err) = self.engine.start_download(tasks, self.out_dir.clone()) {
                        follow_up.push(rejected(&err, |_| StatusEvent::BatchComplete {
                            succeeded_paths: Vec::new(),
                        }));
                    }
                }
                Effect::CancelDownload => self.engine.cancel_download(),
                Effect::Merge { files } => {
                    reel_info!("Merge files={}", files.len());
                    if let Err(err) = self.engine.merge(files, self.out_dir.clone()) {
                        follow_up.push(rejected(&err, |reason| StatusEvent::MergeFailed { reason }));
                    }
                }
            }
        }
        follow_up
    }

    pub fn next_event(&self, timeout: Duration) -> Option<StatusEvent> {
        self.engine.recv_timeout(timeout)
    }

    pub fn watch_interrupts(&self) -> Result<Interrupts, EngineError> {
        self.engine.watch_interrupts()
    }

    /// Drops a browsing session kept open for loading more links.
    pub fn release_discovery(&self) {
        if let Err(err) = self.engine.release_discovery() {
            reel_warn!("Could not release the browsing session: {}", err);
        }
    }

    pub fn shutdown(self) {
        self.engine.shutdown();
    }
}

fn rejected(err: &EngineError, event: impl FnOnce(String) -> StatusEvent) -> Msg {
    reel_warn!("Engine rejected effect: {}", err);
    Msg::Status(event(err.to_string()))
}
