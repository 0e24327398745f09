use crate::db::Repository;
use crate::error::Result;
use crate::models::{PublicationFilter, PublicationRecord, SummaryStatus};
use crate::tui::AppAction;

const SCROLL_STEP: u16 = 10;

/// Read-only viewer state over the publication store.
pub struct App {
    // Data
    pub records: Vec<PublicationRecord>,
    pub categories: Vec<String>,
    pub topics: Vec<String>,
    /// Stored records across every category
    pub total: usize,

    // UI State
    pub selected_index: usize,
    /// Index into `categories`; `None` shows every category
    pub category_filter: Option<usize>,
    /// Index into `topics`; `None` shows every topic
    pub topic_filter: Option<usize>,
    /// Applied title search
    pub search: Option<String>,
    pub detail_scroll: u16,
    pub show_help: bool,

    // Search input state
    pub search_input_active: bool,
    pub search_input: String,

    repository: Repository,
}

impl App {
    pub async fn new(repository: Repository) -> Result<Self> {
        let categories = repository.categories().await?;
        let topics = repository.topics().await?;
        let total = repository.count().await?;
        let records = repository
            .list_publications(PublicationFilter::default())
            .await?;

        Ok(Self {
            records,
            categories,
            topics,
            total,
            selected_index: 0,
            category_filter: None,
            topic_filter: None,
            search: None,
            detail_scroll: 0,
            show_help: false,
            search_input_active: false,
            search_input: String::new(),
            repository,
        })
    }

    pub fn filter_label(&self) -> &str {
        self.category_filter
            .and_then(|i| self.categories.get(i))
            .map(String::as_str)
            .unwrap_or("All")
    }

    pub fn topic_label(&self) -> Option<&str> {
        self.topic_filter
            .and_then(|i| self.topics.get(i))
            .map(String::as_str)
    }

    pub fn selected_record(&self) -> Option<&PublicationRecord> {
        self.records.get(self.selected_index)
    }

    pub fn summary_status(&self) -> SummaryStatus {
        SummaryStatus::of(self.selected_record())
    }

    pub async fn handle_action(&mut self, action: AppAction) -> Result<bool> {
        match action {
            AppAction::Quit => return Ok(true),

            AppAction::MoveUp => {
                if self.selected_index > 0 {
                    self.selected_index -= 1;
                    self.on_selection_changed();
                }
            }

            AppAction::MoveDown => {
                if self.selected_index + 1 < self.records.len() {
                    self.selected_index += 1;
                    self.on_selection_changed();
                }
            }

            AppAction::MoveToTop => {
                self.selected_index = 0;
                self.on_selection_changed();
            }

            AppAction::MoveToBottom => {
                self.selected_index = self.records.len().saturating_sub(1);
                self.on_selection_changed();
            }

            AppAction::ScrollDetailDown => {
                self.detail_scroll = self.detail_scroll.saturating_add(SCROLL_STEP);
            }

            AppAction::ScrollDetailUp => {
                self.detail_scroll = self.detail_scroll.saturating_sub(SCROLL_STEP);
            }

            AppAction::CycleFilter => {
                self.category_filter = next_index(self.category_filter, self.categories.len());
                self.reload().await?;
            }

            AppAction::CycleTopic => {
                self.topic_filter = next_index(self.topic_filter, self.topics.len());
                self.reload().await?;
            }

            AppAction::Reload => {
                self.categories = self.repository.categories().await?;
                self.topics = self.repository.topics().await?;
                self.total = self.repository.count().await?;
                if self
                    .category_filter
                    .is_some_and(|i| i >= self.categories.len())
                {
                    self.category_filter = None;
                }
                if self.topic_filter.is_some_and(|i| i >= self.topics.len()) {
                    self.topic_filter = None;
                }
                self.reload().await?;
            }

            AppAction::OpenInBrowser => {
                if let Some(record) = self.selected_record() {
                    if let Err(e) = open::that(&record.source_url) {
                        tracing::warn!("Failed to open {}: {}", record.source_url, e);
                    }
                }
            }

            AppAction::SearchStart => {
                self.search_input_active = true;
                self.search_input = self.search.clone().unwrap_or_default();
            }

            AppAction::SearchInputChar(c) => {
                self.search_input.push(c);
            }

            AppAction::SearchInputBackspace => {
                self.search_input.pop();
            }

            AppAction::SearchInputConfirm => {
                self.search_input_active = false;
                let query = self.search_input.trim().to_string();
                self.search = Some(query).filter(|q| !q.is_empty());
                self.search_input.clear();
                self.reload().await?;
            }

            AppAction::SearchInputCancel => {
                self.search_input_active = false;
                self.search_input.clear();
            }

            AppAction::ShowHelp => {
                self.show_help = true;
            }

            AppAction::HideHelp => {
                self.show_help = false;
            }
        }

        Ok(false)
    }

    fn on_selection_changed(&mut self) {
        self.detail_scroll = 0;
    }

    async fn reload(&mut self) -> Result<()> {
        let filter = PublicationFilter {
            category: self
                .category_filter
                .and_then(|i| self.categories.get(i))
                .cloned(),
            query: self.search.clone(),
            topic: self.topic_label().map(str::to_string),
            limit: None,
        };
        self.records = self.repository.list_publications(filter).await?;
        self.selected_index = 0;
        self.on_selection_changed();
        Ok(())
    }
}

/// Steps `None -> 0 -> .. -> len-1 -> None`.
fn next_index(current: Option<usize>, len: usize) -> Option<usize> {
    match current {
        None if len > 0 => Some(0),
        Some(i) if i + 1 < len => Some(i + 1),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::NewPublication;

    async fn app_with(records: &[(&str, &str)]) -> App {
        let no_topics: &[&str] = &[];
        let tagged: Vec<(&str, &str, &[&str])> =
            records.iter().map(|(id, c)| (*id, *c, no_topics)).collect();
        app_with_topics(&tagged).await
    }

    async fn app_with_topics(records: &[(&str, &str, &[&str])]) -> App {
        let repo = Repository::in_memory().await.unwrap();
        for (id, category, topics) in records {
            repo.insert_publication(NewPublication {
                id: id.to_string(),
                title: format!("Title {id}"),
                source_url: format!("https://x.org/{id}"),
                category: Some(category.to_string()),
                published_at: None,
                topics: topics.iter().map(|t| t.to_string()).collect(),
                original_text: format!("Body of {id}"),
                fetched_at: Utc::now(),
            })
            .await
            .unwrap();
        }
        App::new(repo).await.unwrap()
    }

    #[tokio::test]
    async fn navigation_stays_in_bounds() {
        let mut app = app_with(&[("a", "News"), ("b", "News")]).await;

        app.handle_action(AppAction::MoveUp).await.unwrap();
        assert_eq!(app.selected_index, 0);

        app.handle_action(AppAction::MoveToBottom).await.unwrap();
        assert_eq!(app.selected_index, 1);
        app.handle_action(AppAction::MoveDown).await.unwrap();
        assert_eq!(app.selected_index, 1);

        app.handle_action(AppAction::ScrollDetailDown).await.unwrap();
        assert_eq!(app.detail_scroll, SCROLL_STEP);
        app.handle_action(AppAction::MoveToTop).await.unwrap();
        assert_eq!(app.selected_index, 0);
        assert_eq!(app.detail_scroll, 0);
    }

    #[tokio::test]
    async fn filter_cycles_through_categories_and_back() {
        let mut app = app_with(&[
            ("a", "Announcements"),
            ("b", "Consultations"),
            ("c", "Consultations"),
        ])
        .await;
        assert_eq!(app.filter_label(), "All");
        assert_eq!(app.records.len(), 3);
        assert_eq!(app.total, 3);

        app.handle_action(AppAction::CycleFilter).await.unwrap();
        assert_eq!(app.filter_label(), "Announcements");
        assert_eq!(app.records.len(), 1);

        app.handle_action(AppAction::CycleFilter).await.unwrap();
        assert_eq!(app.filter_label(), "Consultations");
        assert_eq!(app.records.len(), 2);

        app.handle_action(AppAction::CycleFilter).await.unwrap();
        assert_eq!(app.filter_label(), "All");
        assert_eq!(app.records.len(), 3);
    }

    #[tokio::test]
    async fn topic_filter_and_title_search_narrow_the_feed() {
        let mut app = app_with_topics(&[
            ("rent-rules", "Announcements", &["Housing"][..]),
            ("bus-fares", "Announcements", &["Transport"][..]),
            ("rent-survey", "Statistics", &["Housing", "Transport"][..]),
        ])
        .await;
        assert_eq!(app.topics, vec!["Housing".to_string(), "Transport".to_string()]);

        app.handle_action(AppAction::CycleTopic).await.unwrap();
        assert_eq!(app.topic_label(), Some("Housing"));
        assert_eq!(app.records.len(), 2);

        app.handle_action(AppAction::SearchStart).await.unwrap();
        assert!(app.search_input_active);
        for c in "survey".chars() {
            app.handle_action(AppAction::SearchInputChar(c)).await.unwrap();
        }
        app.handle_action(AppAction::SearchInputConfirm).await.unwrap();
        assert!(!app.search_input_active);
        assert_eq!(app.search.as_deref(), Some("survey"));
        let ids: Vec<_> = app.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["rent-survey"]);

        // an empty search clears it
        app.handle_action(AppAction::SearchStart).await.unwrap();
        for _ in 0.."survey".len() {
            app.handle_action(AppAction::SearchInputBackspace).await.unwrap();
        }
        app.handle_action(AppAction::SearchInputConfirm).await.unwrap();
        assert_eq!(app.search, None);
        assert_eq!(app.records.len(), 2);

        app.handle_action(AppAction::CycleTopic).await.unwrap();
        app.handle_action(AppAction::CycleTopic).await.unwrap();
        assert_eq!(app.topic_label(), None);
        assert_eq!(app.records.len(), 3);
    }

    #[tokio::test]
    async fn cancelled_search_keeps_the_current_feed() {
        let mut app = app_with(&[("a", "News"), ("b", "News")]).await;
        app.handle_action(AppAction::SearchStart).await.unwrap();
        app.handle_action(AppAction::SearchInputChar('z')).await.unwrap();
        app.handle_action(AppAction::SearchInputCancel).await.unwrap();
        assert!(!app.search_input_active);
        assert_eq!(app.search, None);
        assert_eq!(app.records.len(), 2);
    }

    #[tokio::test]
    async fn detail_shows_stored_text() {
        let app = app_with(&[("a", "News")]).await;
        let record = app.selected_record().unwrap();
        assert_eq!(record.original_text, "Body of a");
        assert_eq!(app.summary_status(), SummaryStatus::Pending);
    }

    #[tokio::test]
    async fn empty_store() {
        let mut app = app_with(&[]).await;
        assert!(app.selected_record().is_none());
        assert_eq!(app.summary_status(), SummaryStatus::NoSelection);
        app.handle_action(AppAction::MoveDown).await.unwrap();
        app.handle_action(AppAction::CycleFilter).await.unwrap();
        assert_eq!(app.filter_label(), "All");
        assert!(app.handle_action(AppAction::Quit).await.unwrap());
    }
}
