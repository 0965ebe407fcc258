use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use reel_core::NormalizerConfig;
use reel_engine::{
    ConcatToolConfig, DiscoveryConfig, EngineConfig, FetchToolConfig, HttpProviderSettings,
};
use reel_logging::reel_info;
use serde::{Deserialize, Serialize};

/// Looked up in the working directory when no settings file is named.
const DEFAULT_SETTINGS_FILE: &str = "reel.ron";

/// User settings, stored as RON. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Settings {
    pub output_dir: PathBuf,

    pub fetch_program: String,
    pub fetch_args: Vec<String>,
    pub concat_program: String,
    pub output_extension: String,
    pub episode_pattern: String,

    pub max_stable_rounds: u32,
    pub settle_delay_ms: u64,
    pub max_rounds: u32,
    pub max_duration_secs: u64,
    pub max_items: Option<usize>,

    pub path_patterns: Vec<String>,
    pub query_keys: Vec<String>,
    pub canonical_url_template: Option<String>,

    pub item_selector: String,
    pub title_attribute: Option<String>,
    pub href_filter: Option<String>,
    pub page_param: Option<String>,
    pub challenge_markers: Vec<String>,
    pub user_agent: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        let discovery = DiscoveryConfig::default();
        let fetch = FetchToolConfig::default();
        let concat = ConcatToolConfig::default();
        let normalizer = NormalizerConfig::default();
        let provider = HttpProviderSettings::default();
        Self {
            output_dir: PathBuf::from("downloads"),
            fetch_program: fetch.program.to_string_lossy().into_owned(),
            fetch_args: fetch.extra_args,
            concat_program: concat.program.to_string_lossy().into_owned(),
            output_extension: fetch.output_extension,
            episode_pattern: concat.episode_pattern,
            max_stable_rounds: discovery.max_stable_rounds,
            settle_delay_ms: discovery.settle_delay.as_millis() as u64,
            max_rounds: discovery.max_rounds,
            max_duration_secs: discovery.max_duration.as_secs(),
            max_items: discovery.max_items,
            path_patterns: normalizer.path_patterns,
            query_keys: normalizer.query_keys,
            canonical_url_template: normalizer.canonical_template,
            item_selector: provider.item_selector,
            title_attribute: provider.title_attribute,
            href_filter: provider.href_filter,
            page_param: provider.page_param,
            challenge_markers: provider.challenge_markers,
            user_agent: provider.user_agent,
        }
    }
}

impl Settings {
    pub(crate) fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            normalizer: NormalizerConfig {
                path_patterns: self.path_patterns.clone(),
                query_keys: self.query_keys.clone(),
                canonical_template: self.canonical_url_template.clone(),
                ..NormalizerConfig::default()
            },
            discovery: DiscoveryConfig {
                max_stable_rounds: self.max_stable_rounds.max(1),
                settle_delay: Duration::from_millis(self.settle_delay_ms),
                max_rounds: self.max_rounds,
                max_duration: Duration::from_secs(self.max_duration_secs),
                max_items: self.max_items,
            },
            fetch_tool: FetchToolConfig {
                program: self.fetch_program.clone().into(),
                extra_args: self.fetch_args.clone(),
                output_extension: self.output_extension.clone(),
                ..FetchToolConfig::default()
            },
            concat_tool: ConcatToolConfig {
                program: self.concat_program.clone().into(),
                output_extension: self.output_extension.clone(),
                episode_pattern: self.episode_pattern.clone(),
            },
        }
    }

    pub(crate) fn provider_settings(&self) -> HttpProviderSettings {
        HttpProviderSettings {
            user_agent: self.user_agent.clone(),
            item_selector: self.item_selector.clone(),
            title_attribute: self.title_attribute.clone(),
            href_filter: self.href_filter.clone(),
            page_param: self.page_param.clone(),
            challenge_markers: self.challenge_markers.clone(),
            ..HttpProviderSettings::default()
        }
    }
}

/// Loads `explicit`, or `reel.ron` from the working directory when present.
///
/// A named file must exist; the implicit one falls back to defaults.
pub(crate) fn load_settings(explicit: Option<&Path>) -> anyhow::Result<Settings> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let implicit = PathBuf::from(DEFAULT_SETTINGS_FILE);
            if !implicit.is_file() {
                return Ok(Settings::default());
            }
            implicit
        }
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("failed to read settings from {}", path.display()))?;
    let settings = parse_settings(&content)
        .with_context(|| format!("failed to parse settings in {}", path.display()))?;
    reel_info!("Loaded settings from {:?}", path);
    Ok(settings)
}

pub(crate) fn parse_settings(content: &str) -> anyhow::Result<Settings> {
    Ok(ron::from_str(content)?)
}

pub(crate) fn save_default_settings(path: &Path) -> anyhow::Result<()> {
    let pretty = ron::ser::PrettyConfig::new();
    let content = ron::ser::to_string_pretty(&Settings::default(), pretty)
        .context("failed to serialize default settings")?;
    fs::write(path, content)
        .with_context(|| format!("failed to write settings to {}", path.display()))?;
    reel_info!("Wrote default settings to {:?}", path);
    Ok(())
}
