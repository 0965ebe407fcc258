use std::time::Duration;

use futures_util::StreamExt;
use reel_logging::{reel_debug, reel_info};
use reqwest::header::CONTENT_TYPE;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::decode::decode_page;
use crate::provider::{PageSnapshotProvider, ProviderError, SnapshotEntry};

#[derive(Debug, Clone)]
pub struct HttpProviderSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub user_agent: Option<String>,
    /// CSS selector for link elements inside the listing.
    pub item_selector: String,
    /// Attribute holding the title; the element text is used when absent.
    pub title_attribute: Option<String>,
    /// Only links whose absolute URL contains this substring are reported.
    pub href_filter: Option<String>,
    /// Query parameter used to request the next page. `None` disables paging.
    pub page_param: Option<String>,
    /// Words that mark a verification interstitial when they appear in a
    /// class name split on `-` and `_`, e.g. `captcha` in `Captcha-Box`.
    pub challenge_markers: Vec<String>,
}

impl Default for HttpProviderSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
            user_agent: None,
            item_selector: "a[href]".to_string(),
            title_attribute: Some("title".to_string()),
            href_filter: Some("/video/".to_string()),
            page_param: Some("page".to_string()),
            challenge_markers: vec!["captcha".to_string(), "verify".to_string()],
        }
    }
}

struct LoadedPage {
    url: Url,
    html: String,
}

/// Snapshot provider for server-rendered, paginated listings.
///
/// "Scrolling" requests the next page through `page_param` and the snapshot
/// is the union of every page loaded so far. A 404 or a page without matching
/// links marks the listing as exhausted.
pub struct HttpSnapshotProvider {
    settings: HttpProviderSettings,
    client: reqwest::Client,
    item_selector: Selector,
    seed: Option<Url>,
    pages: Vec<LoadedPage>,
    exhausted: bool,
}

impl HttpSnapshotProvider {
    pub fn new(settings: HttpProviderSettings) -> Result<Self, ProviderError> {
        let item_selector = Selector::parse(&settings.item_selector).map_err(|err| {
            ProviderError::Selector {
                selector: settings.item_selector.clone(),
                message: err.to_string(),
            }
        })?;

        let mut builder = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit));
        if let Some(agent) = &settings.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        let client = builder
            .build()
            .map_err(|err| ProviderError::Network(err.to_string()))?;

        Ok(Self {
            settings,
            client,
            item_selector,
            seed: None,
            pages: Vec::new(),
            exhausted: false,
        })
    }

    pub fn pages_loaded(&self) -> usize {
        self.pages.len()
    }

    async fn fetch(&self, url: &Url) -> Result<LoadedPage, ProviderError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| ProviderError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::HttpStatus(status.as_u16()));
        }

        let max_bytes = self.settings.max_bytes;
        if response.content_length().is_some_and(|len| len > max_bytes) {
            return Err(ProviderError::TooLarge { max_bytes });
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| ProviderError::Network(err.to_string()))?;
            if bytes.len() as u64 + chunk.len() as u64 > max_bytes {
                return Err(ProviderError::TooLarge { max_bytes });
            }
            bytes.extend_from_slice(&chunk);
        }

        let decoded = decode_page(&bytes, content_type.as_deref())?;
        reel_debug!(
            "Loaded {} ({} bytes, {})",
            final_url,
            bytes.len(),
            decoded.encoding_label
        );
        Ok(LoadedPage {
            url: final_url,
            html: decoded.html,
        })
    }

    fn entries(&self, page: &LoadedPage) -> Vec<SnapshotEntry> {
        let document = Html::parse_document(&page.html);
        document
            .select(&self.item_selector)
            .filter_map(|element| self.entry(element, &page.url))
            .collect()
    }

    fn entry(&self, element: ElementRef<'_>, base: &Url) -> Option<SnapshotEntry> {
        let url = resolve_url(element.value().attr("href")?, base)?;
        if let Some(filter) = &self.settings.href_filter {
            if !url.as_str().contains(filter.as_str()) {
                return None;
            }
        }
        let title = self
            .settings
            .title_attribute
            .as_deref()
            .and_then(|name| element.value().attr(name))
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| collapse_whitespace(element.text()));
        Some(SnapshotEntry::new(title, url.to_string()))
    }

    fn shows_challenge(&self, page: &LoadedPage) -> bool {
        let document = Html::parse_document(&page.html);
        let Ok(with_class) = Selector::parse("[class]") else {
            return false;
        };
        document.select(&with_class).any(|element| {
            element
                .value()
                .classes()
                .any(|class| class_has_marker(class, &self.settings.challenge_markers))
        })
    }
}

fn class_has_marker(class: &str, markers: &[String]) -> bool {
    class
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .any(|word| markers.iter().any(|marker| word.eq_ignore_ascii_case(marker)))
}

#[async_trait::async_trait]
impl PageSnapshotProvider for HttpSnapshotProvider {
    async fn load_session(&mut self, url: &str) -> Result<(), ProviderError> {
        let seed = Url::parse(url.trim()).map_err(|err| ProviderError::InvalidUrl(err.to_string()))?;
        let page = self.fetch(&seed).await?;
        reel_info!("Opened listing {}", seed);
        self.seed = Some(seed);
        self.pages = vec![page];
        self.exhausted = false;
        Ok(())
    }

    async fn current_items(&mut self) -> Result<Vec<SnapshotEntry>, ProviderError> {
        if self.pages.is_empty() {
            return Err(ProviderError::NotLoaded);
        }
        Ok(self.pages.iter().flat_map(|page| self.entries(page)).collect())
    }

    async fn scroll_for_more(&mut self) -> Result<(), ProviderError> {
        let seed = self.seed.clone().ok_or(ProviderError::NotLoaded)?;
        let Some(param) = self.settings.page_param.clone() else {
            return Ok(());
        };
        if self.exhausted {
            return Ok(());
        }

        let next = self.pages.len() + 1;
        let url = page_url(&seed, &param, next);
        match self.fetch(&url).await {
            Ok(page) if self.entries(&page).is_empty() => {
                reel_debug!("Page {} has no links, listing exhausted", next);
                self.exhausted = true;
            }
            Ok(page) => self.pages.push(page),
            Err(ProviderError::HttpStatus(404)) => {
                reel_debug!("Page {} not found, listing exhausted", next);
                self.exhausted = true;
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }

    async fn has_active_challenge(&mut self) -> Result<bool, ProviderError> {
        let page = self.pages.last().ok_or(ProviderError::NotLoaded)?;
        Ok(self.shows_challenge(page))
    }

    async fn resolve_challenge(&mut self) -> Result<bool, ProviderError> {
        let seed = self.seed.clone().ok_or(ProviderError::NotLoaded)?;
        let page = self.fetch(&seed).await?;
        let cleared = !self.shows_challenge(&page);
        self.pages = vec![page];
        self.exhausted = false;
        Ok(cleared)
    }

    fn teardown(&mut self) {
        if self.seed.take().is_some() {
            reel_debug!("Closing listing session ({} pages)", self.pages.len());
        }
        self.pages.clear();
        self.exhausted = false;
    }
}

/// `seed` with `param` set to `page`, other query pairs kept.
fn page_url(seed: &Url, param: &str, page: usize) -> Url {
    let kept: Vec<(String, String)> = seed
        .query_pairs()
        .filter(|(key, _)| key != param)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    let mut url = seed.clone();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(param, &page.to_string());
    url
}

fn resolve_url(reference: &str, base: &Url) -> Option<Url> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with('#') || lower.starts_with("javascript:") {
        return None;
    }
    match Url::parse(trimmed) {
        Ok(url) => Some(url),
        Err(_) => base.join(trimmed).ok(),
    }
}

fn collapse_whitespace<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
