use thiserror::Error;

use crate::decode::DecodeError;

/// One `(title, url)` pair visible in the current page snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub title: String,
    pub url: String,
}

impl SnapshotEntry {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("invalid selector {selector:?}: {message}")]
    Selector { selector: String, message: String },
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("http status {0}")]
    HttpStatus(u16),
    #[error("network error: {0}")]
    Network(String),
    #[error("response too large (max {max_bytes} bytes)")]
    TooLarge { max_bytes: u64 },
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("no page loaded")]
    NotLoaded,
}

/// A browsing session over a listing page that grows as more is requested.
///
/// `teardown` is synchronous so owners can call it from `Drop`; it must be
/// safe to call on a session that was never loaded.
#[async_trait::async_trait]
pub trait PageSnapshotProvider: Send {
    async fn load_session(&mut self, url: &str) -> Result<(), ProviderError>;

    /// Every entry currently visible, in page order.
    async fn current_items(&mut self) -> Result<Vec<SnapshotEntry>, ProviderError>;

    /// Asks for more content. Reaching the end of the listing is not an error.
    async fn scroll_for_more(&mut self) -> Result<(), ProviderError>;

    async fn has_active_challenge(&mut self) -> Result<bool, ProviderError>;

    /// Attempts to clear an interstitial. `Ok(false)` means it is still there.
    async fn resolve_challenge(&mut self) -> Result<bool, ProviderError>;

    fn teardown(&mut self);
}
