use std::sync::Arc;
use std::time::{Duration, Instant};

use reel_core::{
    DiscoveryError, DiscoverySession, DiscoveryState, LinkItem, Normalizer, StatusEvent,
    DEFAULT_MAX_STABLE_ROUNDS,
};
use reel_logging::{reel_debug, reel_info, reel_warn};
use tokio_util::sync::CancellationToken;

use crate::provider::{PageSnapshotProvider, ProviderError};
use crate::status::StatusSink;

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Consecutive rounds without new items before the listing counts as complete.
    pub max_stable_rounds: u32,
    /// Pause after each scroll so lazily loaded content can appear.
    pub settle_delay: Duration,
    pub max_rounds: u32,
    pub max_duration: Duration,
    /// Stop as soon as this many items are known.
    pub max_items: Option<usize>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_stable_rounds: DEFAULT_MAX_STABLE_ROUNDS,
            settle_delay: Duration::from_millis(1200),
            max_rounds: 500,
            max_duration: Duration::from_secs(15 * 60),
            max_items: None,
        }
    }
}

/// Drives a [`PageSnapshotProvider`] until the listing stops growing.
///
/// Owns the browsing session. [`DiscoveryEngine::start`] opens it and the
/// session is torn down exactly once: at the end of the run, unless the run
/// stopped at the item limit, in which case it stays open for
/// [`DiscoveryEngine::load_more`] until [`DiscoveryEngine::release_session`],
/// the next `start` or drop.
pub struct DiscoveryEngine {
    provider: Box<dyn PageSnapshotProvider>,
    normalizer: Arc<Normalizer>,
    config: DiscoveryConfig,
    session: DiscoverySession,
    session_open: bool,
}

impl DiscoveryEngine {
    pub fn new(
        provider: Box<dyn PageSnapshotProvider>,
        normalizer: Arc<Normalizer>,
        config: DiscoveryConfig,
    ) -> Self {
        let session =
            DiscoverySession::new(config.max_stable_rounds).with_max_items(config.max_items);
        Self {
            provider,
            normalizer,
            config,
            session,
            session_open: false,
        }
    }

    pub fn state(&self) -> DiscoveryState {
        self.session.state()
    }

    pub fn session(&self) -> &DiscoverySession {
        &self.session
    }

    /// Returns a finished session to Idle, dropping its results.
    pub fn reset(&mut self) {
        self.session.reset();
    }

    /// Whether a capped run left the browsing session open for more.
    pub fn can_load_more(&self) -> bool {
        self.session_open && self.session.state() != DiscoveryState::Running
    }

    /// Runs one discovery over `seed_url` and returns the number of items found.
    ///
    /// Emits `LinkFound` for each new item, then exactly one of
    /// `DiscoveryComplete` or `DiscoveryFailed`. On failure the partial list
    /// stays available through [`DiscoveryEngine::session`].
    pub async fn start(
        &mut self,
        seed_url: &str,
        sink: &dyn StatusSink,
        cancel: &CancellationToken,
    ) -> Result<usize, DiscoveryError> {
        if self.session.state() == DiscoveryState::Running {
            return Err(DiscoveryError::AlreadyRunning);
        }
        self.release_session();

        let result = self.run(seed_url, sink, cancel).await;
        self.finish(result, sink)
    }

    /// Continues the previous run on its still-open browsing session, by up to
    /// another `max_items` items. Reports like [`DiscoveryEngine::start`];
    /// `DiscoveryComplete` carries the total count.
    pub async fn load_more(
        &mut self,
        sink: &dyn StatusSink,
        cancel: &CancellationToken,
    ) -> Result<usize, DiscoveryError> {
        if self.session.state() == DiscoveryState::Running {
            return Err(DiscoveryError::AlreadyRunning);
        }
        let result = if self.session_open {
            self.resume(sink, cancel).await
        } else {
            Err(DiscoveryError::NoOpenSession)
        };
        self.finish(result, sink)
    }

    /// Tears the browsing session down if it is still open.
    pub fn release_session(&mut self) {
        if std::mem::take(&mut self.session_open) {
            reel_debug!("Releasing browsing session");
            self.provider.teardown();
        }
    }

    fn finish(
        &mut self,
        result: Result<usize, DiscoveryError>,
        sink: &dyn StatusSink,
    ) -> Result<usize, DiscoveryError> {
        let capped = result.is_ok() && self.session.reached_item_limit();
        if !capped {
            self.release_session();
        }

        match &result {
            Ok(count) => {
                reel_info!("Discovery converged with {} items", count);
                sink.emit(StatusEvent::DiscoveryComplete { count: *count });
            }
            Err(err) => {
                reel_warn!("Discovery failed: {}", err);
                sink.emit(StatusEvent::DiscoveryFailed {
                    reason: err.to_string(),
                });
            }
        }
        result
    }

    async fn run(
        &mut self,
        seed_url: &str,
        sink: &dyn StatusSink,
        cancel: &CancellationToken,
    ) -> Result<usize, DiscoveryError> {
        self.session_open = true;
        self.provider
            .load_session(seed_url)
            .await
            .map_err(provider_error)?;

        // A challenge that cannot be cleared leaves the session untouched.
        if self.provider.has_active_challenge().await.map_err(provider_error)? {
            reel_info!("Verification challenge on {}, trying to resolve", seed_url);
            if !self.provider.resolve_challenge().await.map_err(provider_error)? {
                return Err(DiscoveryError::ChallengeUnresolved);
            }
        }

        self.session.begin(seed_url)?;
        self.collect(sink, cancel).await
    }

    async fn resume(
        &mut self,
        sink: &dyn StatusSink,
        cancel: &CancellationToken,
    ) -> Result<usize, DiscoveryError> {
        self.session.resume(self.config.max_items)?;
        reel_info!(
            "Loading more from {} after {} items",
            self.session.seed_url(),
            self.session.discovered().len()
        );
        if let Err(err) = self.provider.scroll_for_more().await {
            self.session.fail();
            return Err(provider_error(err));
        }
        self.collect(sink, cancel).await
    }

    async fn collect(
        &mut self,
        sink: &dyn StatusSink,
        cancel: &CancellationToken,
    ) -> Result<usize, DiscoveryError> {
        match self.poll(sink, cancel).await {
            Ok(()) => Ok(self.session.converge()),
            Err(err) => {
                self.session.fail();
                Err(err)
            }
        }
    }

    async fn poll(
        &mut self,
        sink: &dyn StatusSink,
        cancel: &CancellationToken,
    ) -> Result<(), DiscoveryError> {
        let started = Instant::now();
        loop {
            if cancel.is_cancelled() {
                return Err(DiscoveryError::Cancelled);
            }
            let elapsed = started.elapsed();
            if self.session.rounds() >= self.config.max_rounds
                || elapsed >= self.config.max_duration
            {
                return Err(DiscoveryError::Timeout {
                    rounds: self.session.rounds(),
                    elapsed,
                });
            }

            let snapshot = self.provider.current_items().await.map_err(provider_error)?;
            let candidates: Vec<LinkItem> = snapshot
                .into_iter()
                .filter_map(|entry| match self.normalizer.link_item(&entry.title, &entry.url) {
                    Ok(item) => Some(item),
                    Err(err) => {
                        reel_debug!("Skipping {:?}: {}", entry.url, err);
                        None
                    }
                })
                .collect();

            let added = self.session.record_round(candidates);
            reel_debug!(
                "Round {}: {} new, {} total, {} stable",
                self.session.rounds(),
                added.len(),
                self.session.discovered().len(),
                self.session.stable_rounds()
            );
            for item in added {
                sink.emit(StatusEvent::LinkFound { item });
            }

            if self.session.reached_item_limit() || self.session.is_stable() {
                return Ok(());
            }

            self.provider.scroll_for_more().await.map_err(provider_error)?;
            tokio::select! {
                _ = cancel.cancelled() => return Err(DiscoveryError::Cancelled),
                _ = tokio::time::sleep(self.config.settle_delay) => {}
            }
        }
    }

}

impl Drop for DiscoveryEngine {
    fn drop(&mut self) {
        self.release_session();
    }
}

fn provider_error(err: ProviderError) -> DiscoveryError {
    DiscoveryError::Provider(err.to_string())
}
