use std::collections::HashSet;
use std::sync::OnceLock;

use regex::RegexSet;
use scraper::{Html, Selector};
use url::Url;

use crate::models::FeedItem;

/// Anchor texts shorter than this are navigation, not publications.
const MIN_TITLE_CHARS: usize = 12;

const JUNK_URL_BITS: [&str; 9] = [
    "/rss",
    "/cookies",
    "/privacy",
    "/terms",
    "/accessibility",
    "/sitemap",
    "/search",
    "/newsletter",
    "/node/",
];

const JUNK_TITLE_PATTERNS: [&str; 19] = [
    r"^home$",
    r"^rss$",
    r"^newsletter",
    r"sign up",
    r"subscribe",
    r"clear filters",
    r"skip to",
    r"previous page",
    r"next page",
    r"^page\s*\d+$",
    r"^\d+$",
    r"report anything wrong",
    r"share this page",
    r"^about consultations",
    r"^about statistics and research",
    r"how we use your data",
    r"terms and conditions",
    r"accessibility",
    r"^view all",
];

fn junk_titles() -> Option<&'static RegexSet> {
    static SET: OnceLock<Option<RegexSet>> = OnceLock::new();
    SET.get_or_init(|| RegexSet::new(JUNK_TITLE_PATTERNS).ok()).as_ref()
}

/// URL of page `page` of a listing, e.g. `https://www.gov.wales/announcements?page=1`.
pub fn listing_page_url(listing_url: &str, page: u32) -> Option<String> {
    let mut url = Url::parse(listing_url).ok()?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "page")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("page", &page.to_string());
    Some(url.to_string())
}

/// True for links that lead to site furniture rather than a publication.
pub fn looks_like_junk(title: &str, link: &str) -> bool {
    let link = link.to_lowercase();
    if JUNK_URL_BITS.iter().any(|bit| link.contains(bit)) {
        return true;
    }
    let title = title.trim().to_lowercase();
    junk_titles().is_some_and(|set| set.is_match(&title))
}

/// Collect publication links from one listing page.
///
/// Only anchors inside `<main>` (or the whole page when there is none) on the
/// listing's own host are considered; relative links are resolved against
/// `page_url`. Items come back in page order, unique by URL.
pub fn collect_listing_links(html: &str, page_url: &str, category: &str) -> Vec<FeedItem> {
    let Ok(base) = Url::parse(page_url) else {
        return Vec::new();
    };
    let Ok(anchor_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let root = Selector::parse("main")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .unwrap_or_else(|| document.root_element());

    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for anchor in root.select(&anchor_selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let title = anchor.text().collect::<Vec<_>>().join(" ");
        let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
        if title.chars().count() < MIN_TITLE_CHARS {
            continue;
        }

        let Ok(mut link) = base.join(href.trim()) else {
            continue;
        };
        link.set_fragment(None);

        if link.host_str() != base.host_str() || !matches!(link.scheme(), "http" | "https") {
            continue;
        }
        // the listing itself and its other pages
        if link.path() == base.path() {
            continue;
        }

        let link = link.to_string();
        if looks_like_junk(&title, &link) {
            continue;
        }
        if seen.insert(link.clone()) {
            items.push(FeedItem::new(None, title, link, category));
        }
    }

    items
}

/// Merge several pages' items, keeping the first occurrence of each URL.
pub fn dedup_by_url(items: Vec<FeedItem>) -> Vec<FeedItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.url.clone()))
        .collect()
}
