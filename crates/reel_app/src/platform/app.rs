use std::collections::VecDeque;
use std::fs;
use std::time::Duration;

use anyhow::{bail, Context};
use log::LevelFilter;
use reel_core::{update, AppState, Msg, SessionState, TaskState};
use reel_engine::{EngineHandle, HttpSnapshotProvider, Interrupts};
use reel_logging::{reel_info, LogDestination};

use super::effects::EffectRunner;
use super::persistence::{load_settings, save_default_settings};
use super::render::Renderer;
use crate::cli::{parse_selection, Cli};

const EVENT_POLL: Duration = Duration::from_millis(75);

pub fn run_app(cli: Cli) -> anyhow::Result<()> {
    if let Some(path) = &cli.init_config {
        save_default_settings(path)?;
        println!("Wrote default settings to {}", path.display());
        return Ok(());
    }

    if cli.verbose {
        reel_logging::initialize(LogDestination::Both(cli.log_file.clone()), LevelFilter::Debug);
    } else {
        reel_logging::initialize(LogDestination::File(cli.log_file.clone()), LevelFilter::Info);
    }

    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(out) = &cli.out {
        settings.output_dir = out.clone();
    }
    reel_info!("Starting reel, output directory {:?}", settings.output_dir);

    let provider = HttpSnapshotProvider::new(settings.provider_settings())
        .context("failed to set up the page loader")?;
    let engine = EngineHandle::new(settings.engine_config(), Box::new(provider))
        .context("failed to start the engine")?;
    let runner = EffectRunner::new(engine, settings.output_dir.clone());
    let interrupts = runner.watch_interrupts().context("failed to watch for Ctrl-C")?;
    let mut session = Session {
        state: AppState::new(),
        runner,
        renderer: Renderer::new(cli.json),
        last_status: String::new(),
        interrupts,
        handled_interrupts: 0,
        interrupted: false,
    };
    let result = session.run(&cli);
    session.runner.shutdown();
    result
}

struct Session {
    state: AppState,
    runner: EffectRunner,
    renderer: Renderer,
    last_status: String,
    interrupts: Interrupts,
    handled_interrupts: usize,
    interrupted: bool,
}

impl Session {
    fn run(&mut self, cli: &Cli) -> anyhow::Result<()> {
        if let Some(path) = &cli.links_file {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read links from {}", path.display()))?;
            self.dispatch(Msg::LinksPasted(text));
            if let Some(stats) = self.state.view().last_paste_stats {
                reel_info!("Links file: {} added, {} skipped", stats.added, stats.skipped);
            }
        }

        if let Some(seed) = &cli.seed_url {
            self.dispatch(Msg::SeedSubmitted(seed.clone()));
            self.drive();
            for _ in 0..cli.load_more {
                if self.interrupted {
                    break;
                }
                let before = self.state.items().len();
                self.dispatch(Msg::LoadMoreClicked);
                self.drive();
                if self.state.items().len() == before {
                    break;
                }
            }
            self.runner.release_discovery();
        }

        let view = self.state.view();
        self.renderer.items(&view);
        if self.interrupted {
            bail!("interrupted during discovery");
        }
        if cli.discover_only {
            return Ok(());
        }
        if view.items.is_empty() {
            bail!("no video links to download");
        }

        let indices = parse_selection(&cli.select, view.items.len()).map_err(anyhow::Error::msg)?;
        let ids = indices
            .into_iter()
            .map(|index| view.items[index].id.clone())
            .collect();
        self.dispatch(Msg::SelectionChanged(ids));
        self.dispatch(Msg::MergeToggled(cli.merge));
        self.dispatch(Msg::DownloadClicked);
        self.drive();

        let view = self.state.view();
        self.renderer.summary(&view);
        if self.interrupted {
            bail!("interrupted");
        }
        if !view.tasks.is_empty()
            && view
                .tasks
                .iter()
                .all(|row| row.state != TaskState::Succeeded)
        {
            bail!("no video was downloaded");
        }
        Ok(())
    }

    /// Applies `msg` and everything the engine hands back for it.
    fn dispatch(&mut self, msg: Msg) {
        let mut queue = VecDeque::from([msg]);
        while let Some(msg) = queue.pop_front() {
            let (state, effects) = update(std::mem::take(&mut self.state), msg);
            self.state = state;
            queue.extend(self.runner.run(effects));
        }
        if self.state.consume_dirty() {
            let view = self.state.view();
            if view.status_line != self.last_status {
                self.renderer.status(&view);
                self.last_status = view.status_line;
            }
        }
    }

    /// Feeds engine events into the state until the session goes idle.
    ///
    /// Ctrl-C requests a stop through the same messages as the stop buttons;
    /// the loop keeps draining so cancellation and cleanup finish.
    fn drive(&mut self) {
        while self.state.session() != SessionState::Idle {
            let pressed = self.interrupts.count();
            if pressed > self.handled_interrupts {
                self.handled_interrupts = pressed;
                self.interrupted = true;
                if let Some(msg) = stop_message(self.state.session()) {
                    self.dispatch(msg);
                }
            }
            match self.runner.next_event(EVENT_POLL) {
                Some(event) => {
                    self.dispatch(Msg::Status(event.clone()));
                    self.renderer.event(&event, &self.state.view());
                }
                None => self.dispatch(Msg::Tick),
            }
        }
    }
}

/// Message that stops the running phase; a merge runs to completion.
fn stop_message(session: SessionState) -> Option<Msg> {
    match session {
        SessionState::Discovering => Some(Msg::StopDiscoveryClicked),
        SessionState::Downloading => Some(Msg::DownloadClicked),
        SessionState::Idle | SessionState::Merging => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_core::{Effect, StatusEvent};

    #[test]
    fn interrupt_stops_discovery() {
        let (state, _) = update(AppState::new(), Msg::SeedSubmitted("https://example.com/list".into()));
        let msg = stop_message(state.session()).unwrap();
        let (_, effects) = update(state, msg);
        assert_eq!(effects, vec![Effect::CancelDiscovery]);
    }

    #[test]
    fn interrupt_cancels_a_running_batch_once() {
        let (state, _) = update(
            AppState::new(),
            Msg::LinksPasted("https://www.douyin.com/video/7301234567890123456".into()),
        );
        let (state, _) = update(state, Msg::SelectAll);
        let (state, _) = update(state, Msg::DownloadClicked);

        let msg = stop_message(state.session()).unwrap();
        let (state, effects) = update(state, msg);
        assert_eq!(effects, vec![Effect::CancelDownload]);

        let msg = stop_message(state.session()).unwrap();
        let (state, effects) = update(state, msg);
        assert!(effects.is_empty());

        let (state, _) = update(
            state,
            Msg::Status(StatusEvent::BatchComplete {
                succeeded_paths: Vec::new(),
            }),
        );
        assert_eq!(stop_message(state.session()), None);
    }

    #[test]
    fn interrupt_never_starts_work() {
        assert_eq!(stop_message(SessionState::Idle), None);
        assert_eq!(stop_message(SessionState::Merging), None);
    }
}
