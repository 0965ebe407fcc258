use serde::Serialize;

pub type TaskId = u64;

/// One discovered or pasted video link.
///
/// `id` is the normalized identity key used for deduplication, `url` the
/// canonical watch URL handed to the fetch tool. Items are immutable once
/// created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LinkItem {
    id: String,
    title: String,
    url: String,
}

impl LinkItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: url.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}
