use std::collections::HashSet;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::LinkItem;

pub const DEFAULT_MAX_STABLE_ROUNDS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum DiscoveryState {
    #[default]
    Idle,
    Running,
    Converged,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    #[error("a discovery session is already running")]
    AlreadyRunning,
    #[error("the page presented an access challenge that was not resolved")]
    ChallengeUnresolved,
    #[error("discovery did not converge within {rounds} rounds ({elapsed:?})")]
    Timeout { rounds: u32, elapsed: Duration },
    #[error("discovery cancelled")]
    Cancelled,
    #[error("page snapshot provider failed: {0}")]
    Provider(String),
    #[error("no open discovery session to continue")]
    NoOpenSession,
}

/// Bookkeeping for one discovery run: the ordered unique items found so far
/// and the stable-round counter that decides convergence.
///
/// The I/O loop lives in the engine; this type only records rounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoverySession {
    seed_url: String,
    discovered: Vec<LinkItem>,
    seen_ids: HashSet<String>,
    stable_rounds: u32,
    max_stable_rounds: u32,
    rounds: u32,
    max_items: Option<usize>,
    state: DiscoveryState,
}

impl DiscoverySession {
    pub fn new(max_stable_rounds: u32) -> Self {
        Self {
            seed_url: String::new(),
            discovered: Vec::new(),
            seen_ids: HashSet::new(),
            stable_rounds: 0,
            max_stable_rounds: max_stable_rounds.max(1),
            rounds: 0,
            max_items: None,
            state: DiscoveryState::Idle,
        }
    }

    /// Stop collecting once this many items have been found.
    pub fn with_max_items(mut self, max_items: Option<usize>) -> Self {
        self.max_items = max_items;
        self
    }

    /// Enters `Running` for `seed_url`, discarding items of a previous run.
    pub fn begin(&mut self, seed_url: &str) -> Result<(), DiscoveryError> {
        if self.state == DiscoveryState::Running {
            return Err(DiscoveryError::AlreadyRunning);
        }
        self.clear();
        self.seed_url = seed_url.to_string();
        self.state = DiscoveryState::Running;
        Ok(())
    }

    /// Records one snapshot and returns the items not seen before, in
    /// snapshot order.
    ///
    /// Resets the stable-round counter when anything new arrived and
    /// increments it otherwise. Ignored unless `Running`.
    pub fn record_round(&mut self, snapshot: impl IntoIterator<Item = LinkItem>) -> Vec<LinkItem> {
        if self.state != DiscoveryState::Running {
            return Vec::new();
        }
        self.rounds += 1;

        let mut fresh = Vec::new();
        for item in snapshot {
            if self.reached_item_limit() {
                break;
            }
            if self.seen_ids.insert(item.id().to_string()) {
                self.discovered.push(item.clone());
                fresh.push(item);
            }
        }

        if fresh.is_empty() {
            self.stable_rounds += 1;
        } else {
            self.stable_rounds = 0;
        }
        fresh
    }

    pub fn is_stable(&self) -> bool {
        self.stable_rounds >= self.max_stable_rounds
    }

    pub fn reached_item_limit(&self) -> bool {
        self.max_items
            .is_some_and(|limit| self.discovered.len() >= limit)
    }

    /// `Running` -> `Converged`; returns the number of items discovered.
    pub fn converge(&mut self) -> usize {
        if self.state == DiscoveryState::Running {
            self.state = DiscoveryState::Converged;
        }
        self.discovered.len()
    }

    /// `Running` -> `Failed`. Items found so far are kept.
    pub fn fail(&mut self) {
        if self.state == DiscoveryState::Running {
            self.state = DiscoveryState::Failed;
        }
    }

    /// Re-enters `Running` after a finished run, keeping the items and seen
    /// ids. The item limit, if any, grows by `extra_items`; the round and
    /// stable counters start over.
    pub fn resume(&mut self, extra_items: Option<usize>) -> Result<(), DiscoveryError> {
        match self.state {
            DiscoveryState::Running => return Err(DiscoveryError::AlreadyRunning),
            DiscoveryState::Idle => return Err(DiscoveryError::NoOpenSession),
            DiscoveryState::Converged | DiscoveryState::Failed => {}
        }
        if let Some(extra) = extra_items {
            self.max_items = Some(self.discovered.len() + extra);
        }
        self.stable_rounds = 0;
        self.rounds = 0;
        self.state = DiscoveryState::Running;
        Ok(())
    }

    /// Back to `Idle` with an empty item list.
    pub fn reset(&mut self) {
        if self.state != DiscoveryState::Running {
            self.clear();
            self.seed_url.clear();
            self.state = DiscoveryState::Idle;
        }
    }

    pub fn state(&self) -> DiscoveryState {
        self.state
    }

    pub fn seed_url(&self) -> &str {
        &self.seed_url
    }

    pub fn discovered(&self) -> &[LinkItem] {
        &self.discovered
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn stable_rounds(&self) -> u32 {
        self.stable_rounds
    }

    pub fn max_stable_rounds(&self) -> u32 {
        self.max_stable_rounds
    }

    fn clear(&mut self) {
        self.discovered.clear();
        self.seen_ids.clear();
        self.stable_rounds = 0;
        self.rounds = 0;
    }
}

impl Default for DiscoverySession {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STABLE_ROUNDS)
    }
}
