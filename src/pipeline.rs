use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};

use crate::config::{Config, ExtractionConfig, SourceConfig};
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{FeedItem, NewPublication};
use crate::services::topics::guess_topics;
use crate::services::ExtractedPage;

/// Produces candidate items for one configured source.
#[allow(async_fn_in_trait)]
pub trait FeedSource {
    async fn fetch_items(&self, source: &SourceConfig) -> Result<Vec<FeedItem>>;
}

/// Turns a publication URL into its body text.
#[allow(async_fn_in_trait)]
pub trait Extract {
    async fn extract(&self, page_url: &str) -> Result<ExtractedPage>;
}

/// Generates a neutral summary of a publication.
#[allow(async_fn_in_trait)]
pub trait Summarize {
    fn model_version(&self) -> &str;
    async fn summarize(&self, title: &str, text: &str) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Extraction(String),
    Unsupported(String),
    TooShort { chars: usize, min: usize },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Extraction(e) => write!(f, "extraction failed: {e}"),
            SkipReason::Unsupported(content_type) => write!(f, "unsupported content: {content_type}"),
            SkipReason::TooShort { chars, min } => {
                write!(f, "text too short ({chars} chars, need {min})")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    Generated,
    Failed(String),
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Stored { summary: SummaryOutcome },
    AlreadyPresent,
    Skipped(SkipReason),
}

#[derive(Debug, Clone)]
pub struct SourceFailure {
    pub source: String,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct SkippedItem {
    pub id: String,
    pub url: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub sources_ok: usize,
    pub source_failures: Vec<SourceFailure>,
    pub items_seen: usize,
    pub stored: Vec<String>,
    pub already_present: usize,
    pub skipped: Vec<SkippedItem>,
    pub summaries_generated: usize,
    pub summary_failures: Vec<(String, String)>,
    pub summaries_disabled: bool,
    pub backfilled: usize,
}

impl RunReport {
    fn record(&mut self, item: &FeedItem, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Stored { summary } => {
                self.stored.push(item.id.clone());
                self.record_summary(&item.id, summary);
            }
            ItemOutcome::AlreadyPresent => self.already_present += 1,
            ItemOutcome::Skipped(reason) => self.skipped.push(SkippedItem {
                id: item.id.clone(),
                url: item.url.clone(),
                reason,
            }),
        }
    }

    fn record_summary(&mut self, id: &str, summary: SummaryOutcome) {
        match summary {
            SummaryOutcome::Generated => self.summaries_generated += 1,
            SummaryOutcome::Failed(e) => self.summary_failures.push((id.to_string(), e)),
            SummaryOutcome::Disabled => self.summaries_disabled = true,
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Sources: {} ok, {} failed",
            self.sources_ok,
            self.source_failures.len()
        )?;
        for failure in &self.source_failures {
            writeln!(f, "  ✗ {}: {}", failure.source, failure.error)?;
        }
        writeln!(
            f,
            "Items: {} seen, {} stored, {} already present, {} skipped",
            self.items_seen,
            self.stored.len(),
            self.already_present,
            self.skipped.len()
        )?;
        for skipped in &self.skipped {
            writeln!(f, "  ⚠ {} {} ({})", skipped.id, skipped.url, skipped.reason)?;
        }
        if self.summaries_disabled {
            writeln!(f, "Summaries: disabled (no API key configured)")?;
        } else {
            writeln!(
                f,
                "Summaries: {} generated, {} backfilled, {} failed",
                self.summaries_generated,
                self.backfilled,
                self.summary_failures.len()
            )?;
            for (id, error) in &self.summary_failures {
                writeln!(f, "  ✗ {id}: {error}")?;
            }
        }
        Ok(())
    }
}

/// One batch run: collect items from every source, store the new ones with
/// their extracted text, summarise them, then backfill older records that
/// still lack a summary.
pub struct Pipeline<'a, F, E, S> {
    repository: &'a Repository,
    fetcher: F,
    extractor: E,
    summarizer: Option<S>,
    sources: Vec<SourceConfig>,
    extraction: ExtractionConfig,
    fetch_concurrency: usize,
    retries: u32,
    retry_delay: Duration,
    backfill_limit: usize,
}

impl<'a, F, E, S> Pipeline<'a, F, E, S>
where
    F: FeedSource,
    E: Extract,
    S: Summarize,
{
    pub fn new(
        config: &Config,
        repository: &'a Repository,
        fetcher: F,
        extractor: E,
        summarizer: Option<S>,
    ) -> Self {
        Self {
            repository,
            fetcher,
            extractor,
            summarizer,
            sources: config.sources.clone(),
            extraction: config.extraction.clone(),
            fetch_concurrency: config.fetch_concurrency.max(1),
            retries: config.summarizer.retries,
            retry_delay: Duration::from_millis(config.summarizer.retry_delay_ms),
            backfill_limit: config.summarizer.backfill_limit,
        }
    }

    pub async fn run(&self) -> Result<RunReport> {
        let mut report = RunReport {
            summaries_disabled: self.summarizer.is_none(),
            ..RunReport::default()
        };

        let items = self.collect_items(&mut report).await?;
        report.items_seen = items.len();
        tracing::info!("Collected {} candidate items", items.len());

        let mut attempted = HashSet::new();
        for item in &items {
            let outcome = self.process_item(item).await?;
            match &outcome {
                ItemOutcome::Stored { .. } => {
                    tracing::info!("Stored {} | {}", item.id, item.title);
                    attempted.insert(item.id.clone());
                }
                ItemOutcome::AlreadyPresent => tracing::debug!("Already present: {}", item.id),
                ItemOutcome::Skipped(reason) => tracing::warn!("Skipped {} ({})", item.url, reason),
            }
            report.record(item, outcome);
        }

        self.backfill_summaries(&attempted, &mut report).await?;

        tracing::info!(
            "Pipeline complete | stored={} | skipped={} | present={}",
            report.stored.len(),
            report.skipped.len(),
            report.already_present
        );
        Ok(report)
    }

    /// Fetch every source; a failed source is reported and skipped. Fails
    /// only when no source could be fetched. Items are unique by id, first
    /// source wins.
    async fn collect_items(&self, report: &mut RunReport) -> Result<Vec<FeedItem>> {
        let fetcher = &self.fetcher;
        let results: Vec<_> = stream::iter(self.sources.iter())
            .map(|source| async move { (source, fetcher.fetch_items(source).await) })
            .buffered(self.fetch_concurrency)
            .collect()
            .await;

        let mut seen = HashSet::new();
        let mut items = Vec::new();
        for (source, result) in results {
            match result {
                Ok(found) => {
                    tracing::debug!("{}: {} items", source.name, found.len());
                    report.sources_ok += 1;
                    items.extend(found.into_iter().filter(|item| seen.insert(item.id.clone())));
                }
                Err(e) => {
                    tracing::error!("Failed to fetch source {}: {}", source.name, e);
                    report.source_failures.push(SourceFailure {
                        source: source.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if !self.sources.is_empty() && report.sources_ok == 0 {
            return Err(AppError::AllSourcesFailed(self.sources.len()));
        }

        Ok(items)
    }

    /// Per-item failures come back as `Skipped`; only storage errors are fatal.
    async fn process_item(&self, item: &FeedItem) -> Result<ItemOutcome> {
        if self.repository.contains(&item.id).await?
            || self.repository.contains_url(&item.url).await?
        {
            return Ok(ItemOutcome::AlreadyPresent);
        }

        let page = match self.extractor.extract(&item.url).await {
            Ok(page) => page,
            Err(AppError::UnsupportedContent { content_type, .. }) => {
                return Ok(ItemOutcome::Skipped(SkipReason::Unsupported(content_type)));
            }
            Err(e) => return Ok(ItemOutcome::Skipped(SkipReason::Extraction(e.to_string()))),
        };

        let text = page.text.trim().to_string();
        let chars = text.chars().count();
        if chars == 0 || chars < self.extraction.min_text_chars {
            return Ok(ItemOutcome::Skipped(SkipReason::TooShort {
                chars,
                min: self.extraction.min_text_chars,
            }));
        }

        let publication = NewPublication {
            id: item.id.clone(),
            title: item.title.clone(),
            source_url: item.url.clone(),
            category: Some(item.category.clone()).filter(|c| !c.is_empty()),
            published_at: item.published_at.or(page.published_at),
            topics: guess_topics(&item.title, &text),
            original_text: text.clone(),
            fetched_at: Utc::now(),
        };

        if !self.repository.insert_publication(publication).await? {
            return Ok(ItemOutcome::AlreadyPresent);
        }

        let summary = match &self.summarizer {
            Some(summarizer) => {
                self.summarize_and_save(summarizer, &item.id, &item.title, &text)
                    .await?
            }
            None => SummaryOutcome::Disabled,
        };

        Ok(ItemOutcome::Stored { summary })
    }

    async fn backfill_summaries(
        &self,
        attempted: &HashSet<String>,
        report: &mut RunReport,
    ) -> Result<()> {
        let Some(summarizer) = &self.summarizer else {
            return Ok(());
        };
        if self.backfill_limit == 0 {
            return Ok(());
        }

        let pending = self
            .repository
            .publications_missing_summary(self.backfill_limit + attempted.len())
            .await?;

        for record in pending
            .into_iter()
            .filter(|r| !attempted.contains(&r.id))
            .take(self.backfill_limit)
        {
            let outcome = self
                .summarize_and_save(summarizer, &record.id, &record.title, &record.original_text)
                .await?;
            if outcome == SummaryOutcome::Generated {
                report.backfilled += 1;
            } else if let SummaryOutcome::Failed(e) = outcome {
                report.summary_failures.push((record.id, e));
            }
        }

        Ok(())
    }

    async fn summarize_and_save(
        &self,
        summarizer: &S,
        id: &str,
        title: &str,
        text: &str,
    ) -> Result<SummaryOutcome> {
        match self.summarize_with_retry(summarizer, title, text).await {
            Ok(summary) => {
                self.repository
                    .save_summary(id, summary, summarizer.model_version().to_string())
                    .await?;
                Ok(SummaryOutcome::Generated)
            }
            Err(e) => {
                tracing::error!("Failed to generate summary for {}: {}", id, e);
                self.repository.record_summary_failure(id).await?;
                Ok(SummaryOutcome::Failed(e.to_string()))
            }
        }
    }

    /// Up to `1 + retries` attempts with a linearly growing delay. An empty
    /// reply counts as a failed attempt.
    async fn summarize_with_retry(&self, summarizer: &S, title: &str, text: &str) -> Result<String> {
        let mut last_error = AppError::EmptySummary;

        for attempt in 0..=self.retries {
            if attempt > 0 {
                tokio::time::sleep(retry_backoff(self.retry_delay, attempt)).await;
                tracing::debug!("Retrying summary (attempt {})", attempt + 1);
            }

            match summarizer.summarize(title, text).await {
                Ok(summary) if !summary.trim().is_empty() => return Ok(summary.trim().to_string()),
                Ok(_) => last_error = AppError::EmptySummary,
                Err(e) => last_error = e,
            }
        }

        Err(last_error)
    }
}

/// `delay * attempt`, saturating instead of overflowing on huge configured delays.
fn retry_backoff(delay: Duration, attempt: u32) -> Duration {
    delay.checked_mul(attempt).unwrap_or(Duration::MAX)
}
