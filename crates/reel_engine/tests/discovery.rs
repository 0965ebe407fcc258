use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use reel_core::{DiscoveryError, DiscoveryState, Normalizer, StatusEvent};
use reel_engine::{
    DiscoveryConfig, DiscoveryEngine, PageSnapshotProvider, ProviderError, SnapshotEntry,
    StatusSink,
};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct Calls {
    loads: usize,
    snapshots: usize,
    teardowns: usize,
}

/// Replays scripted snapshots; scroll `n` shows `script[min(n, last)]`.
struct ScriptedProvider {
    script: Vec<Vec<SnapshotEntry>>,
    /// Every scroll reveals one more fresh entry instead of following the script.
    endless: bool,
    challenge: bool,
    challenge_clears: bool,
    fail_load: bool,
    scrolls: usize,
    calls: Arc<Mutex<Calls>>,
}

impl ScriptedProvider {
    fn new(script: Vec<Vec<SnapshotEntry>>) -> Self {
        Self {
            script,
            endless: false,
            challenge: false,
            challenge_clears: false,
            fail_load: false,
            scrolls: 0,
            calls: Arc::new(Mutex::new(Calls::default())),
        }
    }

    fn calls(&self) -> Arc<Mutex<Calls>> {
        self.calls.clone()
    }
}

#[async_trait::async_trait]
impl PageSnapshotProvider for ScriptedProvider {
    async fn load_session(&mut self, _url: &str) -> Result<(), ProviderError> {
        self.calls.lock().unwrap().loads += 1;
        if self.fail_load {
            return Err(ProviderError::HttpStatus(500));
        }
        Ok(())
    }

    async fn current_items(&mut self) -> Result<Vec<SnapshotEntry>, ProviderError> {
        self.calls.lock().unwrap().snapshots += 1;
        if self.endless {
            return Ok((0..=self.scrolls)
                .map(|n| entry(&format!("https://example.com/video/{}", 1000 + n)))
                .collect());
        }
        let index = self.scrolls.min(self.script.len().saturating_sub(1));
        Ok(self.script.get(index).cloned().unwrap_or_default())
    }

    async fn scroll_for_more(&mut self) -> Result<(), ProviderError> {
        self.scrolls += 1;
        Ok(())
    }

    async fn has_active_challenge(&mut self) -> Result<bool, ProviderError> {
        Ok(self.challenge)
    }

    async fn resolve_challenge(&mut self) -> Result<bool, ProviderError> {
        if self.challenge_clears {
            self.challenge = false;
        }
        Ok(!self.challenge)
    }

    fn teardown(&mut self) {
        self.calls.lock().unwrap().teardowns += 1;
    }
}

#[derive(Default)]
struct TestSink {
    events: Mutex<Vec<StatusEvent>>,
    cancel_on_link: Option<CancellationToken>,
}

impl TestSink {
    fn take(&self) -> Vec<StatusEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl StatusSink for TestSink {
    fn emit(&self, event: StatusEvent) {
        if let (StatusEvent::LinkFound { .. }, Some(token)) = (&event, &self.cancel_on_link) {
            token.cancel();
        }
        self.events.lock().unwrap().push(event);
    }
}

fn entry(url: &str) -> SnapshotEntry {
    SnapshotEntry::new("", url)
}

fn config() -> DiscoveryConfig {
    DiscoveryConfig {
        settle_delay: Duration::ZERO,
        ..DiscoveryConfig::default()
    }
}

fn engine(provider: ScriptedProvider, config: DiscoveryConfig) -> DiscoveryEngine {
    DiscoveryEngine::new(Box::new(provider), Arc::new(Normalizer::default()), config)
}

fn found_ids(events: &[StatusEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            StatusEvent::LinkFound { item } => Some(item.id().to_string()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn converges_after_stable_rounds() {
    let a = entry("https://example.com/video/1");
    let b = entry("https://example.com/video/2");
    let c = entry("https://example.com/video/3");
    let provider = ScriptedProvider::new(vec![
        vec![a.clone(), b.clone()],
        vec![a.clone(), b.clone(), c.clone()],
    ]);
    let calls = provider.calls();
    let mut engine = engine(provider, config());
    let sink = TestSink::default();

    let count = engine
        .start("https://example.com/list", &sink, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(count, 3);
    let events = sink.take();
    assert_eq!(found_ids(&events), vec!["1", "2", "3"]);
    assert_eq!(events.last(), Some(&StatusEvent::DiscoveryComplete { count: 3 }));
    assert_eq!(engine.state(), DiscoveryState::Converged);
    // Two rounds with new items, then three stable ones.
    assert_eq!(engine.session().rounds(), 5);
    assert_eq!(calls.lock().unwrap().teardowns, 1);

    drop(engine);
    assert_eq!(calls.lock().unwrap().teardowns, 1);
}

#[tokio::test]
async fn links_with_the_same_identity_are_reported_once() {
    let provider = ScriptedProvider::new(vec![vec![
        entry("https://www.douyin.com/video/7301234567890123456?previous_page=a"),
        entry("https://www.douyin.com/video/7301234567890123456?previous_page=b"),
        entry("https://www.douyin.com/user/x?modal_id=7301234567890123456"),
        entry(" "),
    ]]);
    let mut engine = engine(provider, config());
    let sink = TestSink::default();

    let count = engine
        .start("https://www.douyin.com/user/x", &sink, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(count, 1);
    assert_eq!(found_ids(&sink.take()), vec!["7301234567890123456"]);
}

#[tokio::test]
async fn unresolved_challenge_stops_before_polling() {
    let mut provider = ScriptedProvider::new(vec![vec![entry("https://example.com/video/1")]]);
    provider.challenge = true;
    let calls = provider.calls();
    let mut engine = engine(provider, config());
    let sink = TestSink::default();

    let err = engine
        .start("https://example.com/list", &sink, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err, DiscoveryError::ChallengeUnresolved);
    assert_eq!(engine.state(), DiscoveryState::Idle);
    assert!(engine.session().discovered().is_empty());
    let calls = calls.lock().unwrap();
    assert_eq!(calls.snapshots, 0);
    assert_eq!(calls.teardowns, 1);
    assert!(matches!(
        sink.take().as_slice(),
        [StatusEvent::DiscoveryFailed { .. }]
    ));
}

#[tokio::test]
async fn resolved_challenge_continues_discovery() {
    let mut provider = ScriptedProvider::new(vec![vec![entry("https://example.com/video/1")]]);
    provider.challenge = true;
    provider.challenge_clears = true;
    let mut engine = engine(provider, config());
    let sink = TestSink::default();

    let count = engine
        .start("https://example.com/list", &sink, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn round_ceiling_fails_but_keeps_partial_results() {
    let mut provider = ScriptedProvider::new(Vec::new());
    provider.endless = true;
    let calls = provider.calls();
    let config = DiscoveryConfig {
        max_rounds: 4,
        ..config()
    };
    let mut engine = engine(provider, config);
    let sink = TestSink::default();

    let err = engine
        .start("https://example.com/list", &sink, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, DiscoveryError::Timeout { rounds: 4, .. }));
    assert_eq!(engine.state(), DiscoveryState::Failed);
    assert_eq!(engine.session().discovered().len(), 4);
    assert!(matches!(
        sink.take().last(),
        Some(StatusEvent::DiscoveryFailed { .. })
    ));
    assert_eq!(calls.lock().unwrap().teardowns, 1);

    engine.reset();
    assert_eq!(engine.state(), DiscoveryState::Idle);
}

#[tokio::test]
async fn cancellation_during_settle_delay_fails_the_run() {
    let mut provider = ScriptedProvider::new(Vec::new());
    provider.endless = true;
    let config = DiscoveryConfig {
        settle_delay: Duration::from_secs(30),
        ..config()
    };
    let mut engine = engine(provider, config);
    let cancel = CancellationToken::new();
    let sink = TestSink {
        cancel_on_link: Some(cancel.clone()),
        ..TestSink::default()
    };

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        engine.start("https://example.com/list", &sink, &cancel),
    )
    .await
    .expect("cancellation interrupts the settle delay")
    .unwrap_err();

    assert_eq!(err, DiscoveryError::Cancelled);
    assert_eq!(engine.state(), DiscoveryState::Failed);
    assert_eq!(engine.session().discovered().len(), 1);
}

#[tokio::test]
async fn item_limit_converges_early() {
    let provider = ScriptedProvider::new(vec![vec![
        entry("https://example.com/video/1"),
        entry("https://example.com/video/2"),
        entry("https://example.com/video/3"),
    ]]);
    let config = DiscoveryConfig {
        max_items: Some(2),
        ..config()
    };
    let mut engine = engine(provider, config);
    let sink = TestSink::default();

    let count = engine
        .start("https://example.com/list", &sink, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(count, 2);
    assert_eq!(engine.session().rounds(), 1);
}

#[tokio::test]
async fn provider_failure_still_tears_down_once() {
    let mut provider = ScriptedProvider::new(Vec::new());
    provider.fail_load = true;
    let calls = provider.calls();
    let mut engine = engine(provider, config());
    let sink = TestSink::default();

    let err = engine
        .start("https://example.com/list", &sink, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, DiscoveryError::Provider(_)));
    drop(engine);
    assert_eq!(calls.lock().unwrap().teardowns, 1);
}

#[tokio::test]
async fn repeated_snapshot_converges_after_two_stable_rounds() {
    let listing = vec![
        entry("https://example.com/video/a1"),
        entry("https://example.com/video/b2"),
        entry("https://example.com/video/c3"),
    ];
    let provider = ScriptedProvider::new(vec![listing]);
    let config = DiscoveryConfig {
        max_stable_rounds: 2,
        ..config()
    };
    let mut engine = engine(provider, config);
    let sink = TestSink::default();

    let count = engine
        .start("https://example.com/list", &sink, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(count, 3);
    let events = sink.take();
    assert_eq!(events.len(), 4);
    assert_eq!(found_ids(&events[..3]), vec!["a1", "b2", "c3"]);
    assert_eq!(events[3], StatusEvent::DiscoveryComplete { count: 3 });
    assert_eq!(engine.session().rounds(), 3);
}

fn videos(ids: std::ops::RangeInclusive<u32>) -> Vec<SnapshotEntry> {
    ids.map(|id| entry(&format!("https://example.com/video/{id}")))
        .collect()
}

#[tokio::test]
async fn capped_run_keeps_the_session_for_load_more() {
    let provider = ScriptedProvider::new(vec![videos(1..=3), videos(1..=5)]);
    let calls = provider.calls();
    let config = DiscoveryConfig {
        max_items: Some(2),
        ..config()
    };
    let mut engine = engine(provider, config);
    let sink = TestSink::default();
    let cancel = CancellationToken::new();

    assert_eq!(engine.start("https://example.com/list", &sink, &cancel).await, Ok(2));
    assert!(engine.can_load_more());
    assert_eq!(calls.lock().unwrap().teardowns, 0);
    assert_eq!(found_ids(&sink.take()), vec!["1", "2"]);

    assert_eq!(engine.load_more(&sink, &cancel).await, Ok(4));
    let events = sink.take();
    assert_eq!(found_ids(&events), vec!["3", "4"]);
    assert_eq!(events.last(), Some(&StatusEvent::DiscoveryComplete { count: 4 }));
    assert_eq!(calls.lock().unwrap().loads, 1);
    assert_eq!(calls.lock().unwrap().teardowns, 0);

    // The listing runs out before the raised limit: converged and released.
    assert_eq!(engine.load_more(&sink, &cancel).await, Ok(5));
    assert_eq!(found_ids(&sink.take()), vec!["5"]);
    assert!(!engine.can_load_more());
    assert_eq!(calls.lock().unwrap().teardowns, 1);

    assert_eq!(
        engine.load_more(&sink, &cancel).await,
        Err(DiscoveryError::NoOpenSession)
    );
    assert!(matches!(
        sink.take().as_slice(),
        [StatusEvent::DiscoveryFailed { .. }]
    ));
    drop(engine);
    assert_eq!(calls.lock().unwrap().teardowns, 1);
}

#[tokio::test]
async fn explicit_release_tears_down_once() {
    let provider = ScriptedProvider::new(vec![videos(1..=3)]);
    let calls = provider.calls();
    let config = DiscoveryConfig {
        max_items: Some(1),
        ..config()
    };
    let mut engine = engine(provider, config);
    let sink = TestSink::default();

    engine
        .start("https://example.com/list", &sink, &CancellationToken::new())
        .await
        .unwrap();
    assert!(engine.can_load_more());

    engine.release_session();
    engine.release_session();
    assert!(!engine.can_load_more());
    drop(engine);
    assert_eq!(calls.lock().unwrap().teardowns, 1);
}

#[tokio::test]
async fn new_start_releases_a_session_left_open() {
    let provider = ScriptedProvider::new(vec![videos(1..=3)]);
    let calls = provider.calls();
    let config = DiscoveryConfig {
        max_items: Some(1),
        ..config()
    };
    let mut engine = engine(provider, config);
    let sink = TestSink::default();
    let cancel = CancellationToken::new();

    engine.start("https://example.com/list", &sink, &cancel).await.unwrap();
    engine.start("https://example.com/list", &sink, &cancel).await.unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(calls.loads, 2);
    assert_eq!(calls.teardowns, 1);
}
