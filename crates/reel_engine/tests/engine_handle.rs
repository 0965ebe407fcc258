use std::time::{Duration, Instant};

use reel_core::{DiscoveryError, StatusEvent};
use reel_engine::{
    DiscoveryConfig, EngineConfig, EngineError, EngineHandle, PageSnapshotProvider,
    ProviderError, SnapshotEntry,
};

/// Endless listing: every scroll reveals one more video.
#[derive(Default)]
struct EndlessProvider {
    scrolls: usize,
}

#[async_trait::async_trait]
impl PageSnapshotProvider for EndlessProvider {
    async fn load_session(&mut self, _url: &str) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn current_items(&mut self) -> Result<Vec<SnapshotEntry>, ProviderError> {
        Ok((0..=self.scrolls)
            .map(|n| SnapshotEntry::new(format!("第{n}集"), format!("https://example.com/video/{n}")))
            .collect())
    }

    async fn scroll_for_more(&mut self) -> Result<(), ProviderError> {
        self.scrolls += 1;
        Ok(())
    }

    async fn has_active_challenge(&mut self) -> Result<bool, ProviderError> {
        Ok(false)
    }

    async fn resolve_challenge(&mut self) -> Result<bool, ProviderError> {
        Ok(true)
    }

    fn teardown(&mut self) {}
}

fn handle(settle_delay: Duration) -> EngineHandle {
    let config = EngineConfig {
        discovery: DiscoveryConfig {
            settle_delay,
            ..DiscoveryConfig::default()
        },
        ..EngineConfig::default()
    };
    EngineHandle::new(config, Box::new(EndlessProvider::default())).expect("engine starts")
}

/// Drains events until `done` matches one or the deadline passes.
fn wait_for(handle: &EngineHandle, done: impl Fn(&StatusEvent) -> bool) -> Vec<StatusEvent> {
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut events = Vec::new();
    while Instant::now() < deadline {
        if let Some(event) = handle.recv_timeout(Duration::from_millis(50)) {
            let finished = done(&event);
            events.push(event);
            if finished {
                break;
            }
        }
    }
    events
}

#[test]
fn second_discovery_is_rejected_while_one_runs() {
    let handle = handle(Duration::from_secs(30));
    handle.start_discovery("https://example.com/list").unwrap();

    let err = handle.start_discovery("https://example.com/other").unwrap_err();
    assert!(matches!(
        err,
        EngineError::Discovery(DiscoveryError::AlreadyRunning)
    ));

    handle.cancel_discovery();
    let events = wait_for(&handle, |event| {
        matches!(event, StatusEvent::DiscoveryFailed { .. })
    });
    assert!(matches!(
        events.last(),
        Some(StatusEvent::DiscoveryFailed { reason }) if reason.contains("cancelled")
    ));

    // The outcome is only reported once the engine is free again.
    handle.start_discovery("https://example.com/list").unwrap();
    handle.shutdown();
}

#[test]
fn merge_failure_is_reported_as_event() {
    let temp = tempfile::TempDir::new().unwrap();
    let handle = handle(Duration::ZERO);

    handle
        .merge(vec![temp.path().join("only.mp4")], temp.path())
        .unwrap();
    let events = wait_for(&handle, |event| {
        matches!(event, StatusEvent::MergeFailed { .. })
    });
    assert!(matches!(
        events.last(),
        Some(StatusEvent::MergeFailed { reason }) if reason.contains("at least two")
    ));
}

#[test]
fn download_batch_reports_completion() {
    let temp = tempfile::TempDir::new().unwrap();
    let config = EngineConfig {
        fetch_tool: reel_engine::FetchToolConfig {
            program: "/nonexistent/reel-fetch-tool".into(),
            ..Default::default()
        },
        ..EngineConfig::default()
    };
    let handle = EngineHandle::new(config, Box::new(EndlessProvider::default())).unwrap();
    let task = reel_core::DownloadTask::new(
        1,
        reel_core::LinkItem::new("1", "第1集", "https://example.com/video/1"),
    );

    handle.start_download(vec![task], temp.path()).unwrap();
    let events = wait_for(&handle, |event| {
        matches!(event, StatusEvent::BatchComplete { .. })
    });
    assert!(events
        .iter()
        .any(|event| matches!(event, StatusEvent::TaskFailed { task_id: 1, .. })));
    assert!(matches!(
        events.last(),
        Some(StatusEvent::BatchComplete { succeeded_paths }) if succeeded_paths.is_empty()
    ));

    // The batch slot frees up after completion.
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match handle.start_download(Vec::new(), temp.path()) {
            Ok(()) => break,
            Err(EngineError::BatchRunning) if Instant::now() < deadline => {
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(err) => panic!("unexpected error {err}"),
        }
    }
}

#[test]
fn load_more_continues_a_capped_discovery() {
    let config = EngineConfig {
        discovery: DiscoveryConfig {
            settle_delay: Duration::ZERO,
            max_items: Some(2),
            ..DiscoveryConfig::default()
        },
        ..EngineConfig::default()
    };
    let handle = EngineHandle::new(config, Box::new(EndlessProvider::default())).unwrap();
    let found = |events: &[StatusEvent]| -> Vec<String> {
        events
            .iter()
            .filter_map(|event| match event {
                StatusEvent::LinkFound { item } => Some(item.id().to_string()),
                _ => None,
            })
            .collect()
    };

    handle.start_discovery("https://example.com/list").unwrap();
    let events = wait_for(&handle, |event| {
        matches!(event, StatusEvent::DiscoveryComplete { .. })
    });
    assert_eq!(found(&events), vec!["0", "1"]);

    handle.load_more().unwrap();
    let events = wait_for(&handle, |event| {
        matches!(event, StatusEvent::DiscoveryComplete { .. })
    });
    assert_eq!(found(&events), vec!["2", "3"]);
    assert_eq!(
        events.last(),
        Some(&StatusEvent::DiscoveryComplete { count: 4 })
    );

    handle.release_discovery().unwrap();
    handle.load_more().unwrap();
    let events = wait_for(&handle, |event| {
        matches!(event, StatusEvent::DiscoveryFailed { .. })
    });
    assert!(matches!(
        events.last(),
        Some(StatusEvent::DiscoveryFailed { reason }) if reason.contains("no open discovery session")
    ));
    handle.shutdown();
}
