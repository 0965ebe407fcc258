use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use url::form_urlencoded;

use crate::LinkItem;

/// Shortest bare digit run accepted as a video identifier.
pub const MIN_DIGIT_RUN: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationError {
    #[error("link is empty")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizerConfig {
    /// Regexes matching a canonical path segment; capture group 1 is the id.
    pub path_patterns: Vec<String>,
    /// Query keys whose numeric value is the id, tried in order.
    pub query_keys: Vec<String>,
    pub min_digit_run: usize,
    /// Watch URL rendered from a recognized id, e.g.
    /// `https://www.douyin.com/video/{id}`. `None` keeps the scraped URL.
    pub canonical_template: Option<String>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            path_patterns: vec![
                r"/video/([A-Za-z0-9]+)".to_string(),
                r"dai\.ly/([A-Za-z0-9]+)".to_string(),
                r"v\.douyin\.com/([A-Za-z0-9]+)".to_string(),
            ],
            query_keys: vec!["modal_id".to_string(), "vid".to_string()],
            min_digit_run: MIN_DIGIT_RUN,
            canonical_template: None,
        }
    }
}

/// Turns raw scraped or pasted link text into a stable identity key.
///
/// Resolution order: canonical path pattern, known query key, longest digit
/// run, then the link itself. Pasted share text such as `第1集 https://…` is
/// searched as a whole; the pass-through keeps only its embedded link. The
/// same input always yields the same id and nothing here touches the network.
#[derive(Debug, Clone)]
pub struct Normalizer {
    path_patterns: Vec<Regex>,
    query_keys: Vec<String>,
    min_digit_run: usize,
    canonical_template: Option<String>,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Result<Self, regex::Error> {
        let path_patterns = config
            .path_patterns
            .iter()
            .map(|pattern| Regex::new(pattern))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            path_patterns,
            query_keys: config.query_keys,
            min_digit_run: config.min_digit_run.max(1),
            canonical_template: config.canonical_template,
        })
    }

    pub fn normalize(&self, raw: &str) -> Result<String, NormalizationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(NormalizationError::Empty);
        }

        let link = embedded_link(trimmed);
        let id = self
            .id_from_path(trimmed)
            .or_else(|| self.id_from_query(link))
            .or_else(|| longest_digit_run(trimmed, self.min_digit_run).map(str::to_string))
            .unwrap_or_else(|| link.to_string());
        Ok(id)
    }

    /// Builds a [`LinkItem`] from a scraped `(title, url)` pair.
    ///
    /// A blank title falls back to the URL.
    pub fn link_item(&self, title: &str, raw_url: &str) -> Result<LinkItem, NormalizationError> {
        let id = self.normalize(raw_url)?;
        let link = embedded_link(raw_url.trim());
        // Pass-through ids are the link itself, no identifier to render.
        let url = match self.canonical_url(&id) {
            Some(url) if id != link => url,
            _ => link.to_string(),
        };
        let title = match title.trim() {
            "" => url.clone(),
            title => title.to_string(),
        };
        Ok(LinkItem::new(id, title, url))
    }

    /// Watch URL for `id` rendered from the configured template.
    pub fn canonical_url(&self, id: &str) -> Option<String> {
        self.canonical_template
            .as_ref()
            .map(|template| template.replace("{id}", id))
    }

    fn id_from_path(&self, raw: &str) -> Option<String> {
        self.path_patterns.iter().find_map(|re| {
            re.captures(raw)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        })
    }

    fn id_from_query(&self, raw: &str) -> Option<String> {
        let (_, query) = raw.split_once('?')?;
        let query = query.split_once('#').map_or(query, |(q, _)| q);
        self.query_keys.iter().find_map(|key| {
            form_urlencoded::parse(query.as_bytes())
                .find(|(k, _)| k == key.as_str())
                .map(|(_, value)| value.into_owned())
                .filter(|value| !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()))
        })
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(NormalizerConfig::default()).expect("built-in link patterns compile")
    }
}

/// Process-wide normalizer with the built-in configuration.
pub fn default_normalizer() -> &'static Normalizer {
    static DEFAULT: OnceLock<Normalizer> = OnceLock::new();
    DEFAULT.get_or_init(Normalizer::default)
}

/// Normalizes `raw` with the built-in configuration.
pub fn normalize(raw: &str) -> Result<String, NormalizationError> {
    default_normalizer().normalize(raw)
}

/// First whitespace-separated token that looks like a link, or the whole
/// text when there is none.
fn embedded_link(text: &str) -> &str {
    text.split_whitespace()
        .find(|token| token.contains("://") || token.starts_with("www."))
        .unwrap_or(text)
}

/// Longest run of ASCII digits of at least `min` characters; the first one
/// wins on ties.
fn longest_digit_run(input: &str, min: usize) -> Option<&str> {
    let bytes = input.as_bytes();
    let mut best: Option<(usize, usize)> = None;
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        let len = i - start;
        if len >= min && best.map_or(true, |(_, best_len)| len > best_len) {
            best = Some((start, len));
        }
    }
    best.map(|(start, len)| &input[start..start + len])
}
