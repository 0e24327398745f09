use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::pipeline::Extract;

/// Candidate containers for the main body, most specific first.
const MAIN_SELECTORS: [&str; 4] = ["main", "article", "[role='main']", "#content"];

/// Block elements whose text makes up the body.
const FRAGMENT_SELECTOR: &str = "h1, h2, h3, p, li";
const FRAGMENT_TAGS: [&str; 5] = ["h1", "h2", "h3", "p", "li"];

/// Boilerplate containers; any fragment inside one is dropped.
const BOILERPLATE_TAGS: [&str; 7] = ["script", "style", "nav", "footer", "header", "form", "aside"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    pub text: String,
    pub published_at: Option<DateTime<Utc>>,
}

pub struct ContentExtractor {
    client: Client,
    min_fragment_chars: usize,
}

impl ContentExtractor {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self {
            client,
            min_fragment_chars: config.extraction.min_fragment_chars,
        })
    }

    /// Fetch a publication page and extract its body text.
    pub async fn fetch_page(&self, page_url: &str) -> Result<ExtractedPage> {
        if looks_like_pdf(page_url, "") {
            return Err(AppError::UnsupportedContent {
                url: page_url.to_string(),
                content_type: "application/pdf".to_string(),
            });
        }

        let response = self.client.get(page_url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Failed to fetch {}: HTTP {}", page_url, response.status()).into());
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        if looks_like_pdf(page_url, &content_type) {
            return Err(AppError::UnsupportedContent {
                url: page_url.to_string(),
                content_type,
            });
        }

        let html = response.text().await?;
        Ok(extract_from_html(&html, self.min_fragment_chars))
    }
}

impl Extract for ContentExtractor {
    async fn extract(&self, page_url: &str) -> Result<ExtractedPage> {
        self.fetch_page(page_url).await
    }
}

fn looks_like_pdf(page_url: &str, content_type: &str) -> bool {
    if content_type.contains("pdf") {
        return true;
    }
    url::Url::parse(page_url)
        .map(|u| u.path().to_ascii_lowercase().ends_with(".pdf"))
        .unwrap_or(false)
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn clean_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract the readable body of a publication page.
///
/// Collects headings, paragraphs and list items inside the main container,
/// skipping boilerplate regions and fragments shorter than `min_fragment_chars`.
/// Falls back to a plain-text rendering of the whole page when nothing qualifies.
pub fn extract_from_html(html: &str, min_fragment_chars: usize) -> ExtractedPage {
    let document = Html::parse_document(html);
    let root = main_container(&document);

    let mut fragments: Vec<String> = Vec::new();
    if let Some(fragment_selector) = selector(FRAGMENT_SELECTOR) {
        for element in root.select(&fragment_selector) {
            if inside_skipped_region(&element, &root) {
                continue;
            }
            let text = clean_text(&element.text().collect::<Vec<_>>().join(" "));
            if text.chars().count() >= min_fragment_chars {
                fragments.push(text);
            }
        }
    }

    let text = if fragments.is_empty() {
        plain_text_fallback(html)
    } else {
        fragments.join("\n\n")
    };

    ExtractedPage {
        text,
        published_at: published_at(&document),
    }
}

fn main_container(document: &Html) -> ElementRef<'_> {
    for css in MAIN_SELECTORS {
        if let Some(sel) = selector(css) {
            if let Some(element) = document.select(&sel).next() {
                return element;
            }
        }
    }
    document.root_element()
}

/// True when an ancestor below `root` is boilerplate, or is itself a fragment
/// (its text is already collected through that ancestor).
fn inside_skipped_region(element: &ElementRef, root: &ElementRef) -> bool {
    for ancestor in element.ancestors() {
        if ancestor.id() == root.id() {
            return false;
        }
        if let Some(el) = ancestor.value().as_element() {
            let name = el.name();
            if BOILERPLATE_TAGS.contains(&name) || FRAGMENT_TAGS.contains(&name) {
                return true;
            }
        }
    }
    false
}

fn plain_text_fallback(html: &str) -> String {
    match html2text::from_read(html.as_bytes(), 80) {
        Ok(text) => text
            .lines()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        Err(e) => {
            tracing::debug!("Failed to convert HTML to text: {}", e);
            String::new()
        }
    }
}

fn published_at(document: &Html) -> Option<DateTime<Utc>> {
    let sel = selector("time[datetime]")?;
    let raw = document.select(&sel).next()?.value().attr("datetime")?;
    parse_published(raw)
}

/// Accepts RFC 3339 timestamps and bare `YYYY-MM-DD` dates.
pub fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
