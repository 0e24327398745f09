use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry from a source, before its page has been fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub id: String,
    pub title: String,
    pub url: String,
    pub category: String,
    pub published_at: Option<DateTime<Utc>>,
}

impl FeedItem {
    /// Uses the source's own id when it has one, otherwise a hash of the URL.
    pub fn new(
        source_id: Option<&str>,
        title: impl Into<String>,
        url: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        let url = url.into();
        let id = match source_id.map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => derive_id(&url),
        };
        Self {
            id,
            title: title.into(),
            url,
            category: category.into(),
            published_at: None,
        }
    }
}

/// Stable id for an item with no usable source id: first 16 bytes of
/// blake3 over the URL without its fragment, hex-encoded.
pub fn derive_id(url: &str) -> String {
    let canonical = match url::Url::parse(url.trim()) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.trim().to_string(),
    };
    let hash = blake3::hash(canonical.as_bytes());
    hash.as_bytes()[..16]
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[derive(Debug, Clone)]
pub struct NewPublication {
    pub id: String,
    pub title: String,
    pub source_url: String,
    pub category: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub topics: Vec<String>,
    pub original_text: String,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicationRecord {
    pub id: String,
    pub title: String,
    pub source_url: String,
    pub category: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub topics: Vec<String>,
    pub original_text: String,
    pub summary_text: Option<String>,
    pub summary_model: Option<String>,
    pub summarized_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
}

impl PublicationRecord {
    /// Date shown in listings: publication date when known, otherwise fetch date.
    pub fn display_date(&self) -> String {
        self.published_at
            .unwrap_or(self.fetched_at)
            .format("%Y-%m-%d")
            .to_string()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PublicationFilter {
    pub category: Option<String>,
    /// Case-insensitive substring of the title
    pub query: Option<String>,
    /// Exact topic label
    pub topic: Option<String>,
    pub limit: Option<usize>,
}
