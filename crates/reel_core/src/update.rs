use crate::{default_normalizer, AppState, Effect, Msg, SessionState, StatusEvent};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::SeedSubmitted(raw) => {
            let seed_url = raw.trim();
            if seed_url.is_empty() {
                return (state, Vec::new());
            }
            // The list and the batch rows belong to the running phase.
            match state.session() {
                SessionState::Idle => {}
                SessionState::Discovering => return (state, Vec::new()),
                SessionState::Downloading | SessionState::Merging => {
                    state.set_status("Wait for the current batch to finish before a new discovery");
                    return (state, Vec::new());
                }
            }
            state.begin_discovery(seed_url);
            state.set_status(format!("Discovering links on {seed_url}"));
            vec![Effect::StartDiscovery {
                seed_url: seed_url.to_string(),
            }]
        }
        Msg::LoadMoreClicked => {
            let seed_url = match (state.session(), state.seed_url()) {
                (SessionState::Idle, Some(seed_url)) => seed_url.to_string(),
                _ => return (state, Vec::new()),
            };
            state.set_session(SessionState::Discovering);
            state.set_status(format!("Loading more videos from {seed_url}"));
            vec![Effect::LoadMoreDiscovery]
        }
        Msg::StopDiscoveryClicked => {
            if state.session() == SessionState::Discovering {
                state.set_status("Stopping discovery");
                vec![Effect::CancelDiscovery]
            } else {
                Vec::new()
            }
        }
        Msg::LinksPasted(text) => {
            let mut added = 0;
            let mut skipped = 0;
            for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
                let added_item = default_normalizer()
                    .link_item("", line)
                    .is_ok_and(|item| state.add_item(item));
                if added_item {
                    added += 1;
                } else {
                    skipped += 1;
                }
            }
            if added + skipped > 0 {
                state.set_last_paste_stats(added, skipped);
            }
            Vec::new()
        }
        Msg::SelectionChanged(ids) => {
            state.set_selection(ids);
            Vec::new()
        }
        Msg::SelectAll => {
            state.select_all();
            Vec::new()
        }
        Msg::DeleteSelected => {
            state.delete_selected();
            Vec::new()
        }
        Msg::ClearAll => {
            state.clear_items();
            Vec::new()
        }
        Msg::MergeToggled(enabled) => {
            state.set_merge_enabled(enabled);
            Vec::new()
        }
        Msg::DownloadClicked => match state.session() {
            SessionState::Downloading => {
                if state.cancel_requested() {
                    Vec::new()
                } else {
                    state.request_cancel();
                    state.set_status("Stopping downloads");
                    vec![Effect::CancelDownload]
                }
            }
            SessionState::Idle => {
                let tasks = state.begin_batch();
                if tasks.is_empty() {
                    state.set_session(SessionState::Idle);
                    state.set_status("Select at least one video to download");
                    Vec::new()
                } else {
                    state.set_status(format!("Downloading {} videos", tasks.len()));
                    vec![Effect::StartDownload { tasks }]
                }
            }
            SessionState::Discovering | SessionState::Merging => Vec::new(),
        },
        Msg::Status(event) => apply_status(&mut state, event),
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn apply_status(state: &mut AppState, event: StatusEvent) -> Vec<Effect> {
    match event {
        StatusEvent::LinkFound { item } => {
            state.add_item(item);
            Vec::new()
        }
        StatusEvent::DiscoveryComplete { count } => {
            if state.session() == SessionState::Discovering {
                state.set_session(SessionState::Idle);
            }
            state.set_status(format!("Done, found {count} videos"));
            Vec::new()
        }
        StatusEvent::DiscoveryFailed { reason } => {
            if state.session() == SessionState::Discovering {
                state.set_session(SessionState::Idle);
            }
            state.set_status(format!("Discovery failed: {reason}"));
            Vec::new()
        }
        StatusEvent::Progress {
            task_id,
            percent,
            details,
        } => {
            state.apply_progress(task_id, percent, details);
            Vec::new()
        }
        StatusEvent::TaskComplete { task_id, path } => {
            state.apply_task_complete(task_id, path);
            Vec::new()
        }
        StatusEvent::TaskFailed { task_id, message } => {
            state.apply_task_failed(task_id, message);
            Vec::new()
        }
        StatusEvent::BatchComplete { succeeded_paths } => {
            let stopped = state.cancel_requested();
            state.finish_batch();
            state.set_status(if stopped {
                format!("Stopped, {} videos downloaded", succeeded_paths.len())
            } else {
                format!("Finished, {} videos downloaded", succeeded_paths.len())
            });
            if state.merge_enabled() && succeeded_paths.len() >= 2 {
                state.set_session(SessionState::Merging);
                state.set_status(format!("Merging {} videos", succeeded_paths.len()));
                vec![Effect::Merge {
                    files: succeeded_paths,
                }]
            } else {
                state.set_session(SessionState::Idle);
                Vec::new()
            }
        }
        StatusEvent::MergeComplete { path } => {
            state.set_status(format!("Merged into {}", path.display()));
            state.set_last_merge(path);
            state.set_session(SessionState::Idle);
            Vec::new()
        }
        StatusEvent::MergeFailed { reason } => {
            state.set_status(format!("Merge failed: {reason}"));
            state.set_session(SessionState::Idle);
            Vec::new()
        }
    }
}
