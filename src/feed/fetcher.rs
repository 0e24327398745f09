use std::time::Duration;

use feed_rs::parser;
use reqwest::Client;

use crate::config::{Config, SourceConfig, SourceKind};
use crate::error::Result;
use crate::models::FeedItem;
use crate::pipeline::FeedSource;

use super::listing::{collect_listing_links, dedup_by_url, listing_page_url};

pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self { client })
    }

    pub async fn fetch_source(&self, source: &SourceConfig) -> Result<Vec<FeedItem>> {
        match source.kind {
            SourceKind::Feed => self.fetch_feed(source).await,
            SourceKind::Listing => self.fetch_listing(source).await,
        }
    }

    async fn fetch_feed(&self, source: &SourceConfig) -> Result<Vec<FeedItem>> {
        let bytes = self.get_bytes(&source.url).await?;
        let items = parse_feed_items(&bytes, &source.url, &source.name)?;
        tracing::debug!("Fetched {} entries from {}", items.len(), source.name);
        Ok(items)
    }

    /// Walks `pages` listing pages. A failing first page fails the source;
    /// a later failure ends paging with what was collected so far.
    async fn fetch_listing(&self, source: &SourceConfig) -> Result<Vec<FeedItem>> {
        let mut items = Vec::new();

        for page in 0..source.pages.max(1) {
            let Some(page_url) = listing_page_url(&source.url, page) else {
                return Err(anyhow::anyhow!("Invalid listing url: {}", source.url).into());
            };

            let html = match self.get_text(&page_url).await {
                Ok(html) => html,
                Err(e) if page == 0 => return Err(e),
                Err(e) => {
                    tracing::warn!("Stopping {} at page {}: {}", source.name, page, e);
                    break;
                }
            };

            let found = collect_listing_links(&html, &page_url, &source.name);
            tracing::debug!("{} page {}: {} links", source.name, page, found.len());
            if found.is_empty() {
                break;
            }
            items.extend(found);
        }

        Ok(dedup_by_url(items))
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Failed to fetch {}: HTTP {}", url, response.status()).into());
        }

        Ok(response)
    }

    /// Raw bytes; feed-rs reads the encoding from the XML prolog.
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        Ok(self.get(url).await?.bytes().await?.to_vec())
    }

    /// Decoded with the charset from `Content-Type`, UTF-8 otherwise.
    async fn get_text(&self, url: &str) -> Result<String> {
        Ok(self.get(url).await?.text().await?)
    }
}

impl FeedSource for FeedFetcher {
    async fn fetch_items(&self, source: &SourceConfig) -> Result<Vec<FeedItem>> {
        self.fetch_source(source).await
    }
}

/// Parse an RSS/Atom document into feed items. Entries without a link are
/// dropped since there is no page to extract.
pub fn parse_feed_items(bytes: &[u8], feed_url: &str, category: &str) -> Result<Vec<FeedItem>> {
    let feed = parser::parse(bytes)?;

    let items = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let href = entry.links.first().map(|l| l.href.clone())?;
            let url = resolve_url(&href, feed_url);
            let title = entry
                .title
                .map(|t| t.content.split_whitespace().collect::<Vec<_>>().join(" "))
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Untitled".to_string());

            let mut item = FeedItem::new(Some(entry.id.as_str()), title, url, category);
            item.published_at = entry.published.or(entry.updated);
            Some(item)
        })
        .collect();

    Ok(items)
}

/// Resolve a potentially relative URL against a base URL
fn resolve_url(href: &str, base_url: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }

    if let Ok(base) = url::Url::parse(base_url) {
        if let Ok(resolved) = base.join(href) {
            return resolved.to_string();
        }
    }

    href.to_string()
}
