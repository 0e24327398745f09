use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::models::{NewPublication, PublicationFilter, PublicationRecord};

use super::schema::SCHEMA;

const RECORD_COLUMNS: &str = r#"p.id, p.title, p.source_url, p.category, p.published_at, p.topics,
       p.original_text, p.fetched_at, s.content, s.model_version, s.generated_at"#;

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;
        Self::init(conn).await
    }

    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Publication operations

    pub async fn contains(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        let exists = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM publications WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await?;
        Ok(exists)
    }

    pub async fn contains_url(&self, source_url: &str) -> Result<bool> {
        let source_url = source_url.to_string();
        let exists = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM publications WHERE source_url = ?1",
                    params![source_url],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await?;
        Ok(exists)
    }

    /// Inserts a new record. Returns false, leaving the stored row untouched,
    /// when the id or source URL is already present.
    pub async fn insert_publication(&self, publication: NewPublication) -> Result<bool> {
        if publication.original_text.trim().is_empty() {
            return Err(AppError::InvalidRecord(format!(
                "publication {} has no original text",
                publication.id
            )));
        }

        let topics = serde_json::to_string(&publication.topics)?;
        let inserted = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    r#"INSERT INTO publications
                           (id, title, source_url, category, published_at, topics, original_text, fetched_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                       ON CONFLICT DO NOTHING"#,
                    params![
                        publication.id,
                        publication.title,
                        publication.source_url,
                        publication.category,
                        publication.published_at.map(|dt| dt.to_rfc3339()),
                        topics,
                        publication.original_text,
                        publication.fetched_at.to_rfc3339(),
                    ],
                )?;
                Ok(changed == 1)
            })
            .await?;
        Ok(inserted)
    }

    pub async fn get_publication(&self, id: &str) -> Result<Option<PublicationRecord>> {
        let id = id.to_string();
        let record = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    r#"SELECT {RECORD_COLUMNS}
                       FROM publications p
                       LEFT JOIN summaries s ON s.publication_id = p.id
                       WHERE p.id = ?1"#
                ))?;
                let record = stmt.query_row(params![id], record_from_row).optional()?;
                Ok(record)
            })
            .await?;
        Ok(record)
    }

    /// Newest first: publication date, then fetch time, records without a
    /// publication date last.
    pub async fn list_publications(
        &self,
        filter: PublicationFilter,
    ) -> Result<Vec<PublicationRecord>> {
        let limit = filter.limit.map(|l| l as i64).unwrap_or(-1);
        let query = filter
            .query
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{}%", escape_like(&q)));
        let records = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    r#"SELECT {RECORD_COLUMNS}
                       FROM publications p
                       LEFT JOIN summaries s ON s.publication_id = p.id
                       WHERE (?1 IS NULL OR p.category = ?1)
                         AND (?2 IS NULL OR p.title LIKE ?2 ESCAPE '\')
                         AND (?3 IS NULL OR EXISTS (
                               SELECT 1 FROM json_each(p.topics) WHERE json_each.value = ?3))
                       ORDER BY p.published_at DESC NULLS LAST, p.fetched_at DESC, p.id
                       LIMIT ?4"#
                ))?;
                let records = stmt
                    .query_map(
                        params![filter.category, query, filter.topic, limit],
                        record_from_row,
                    )?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(records)
            })
            .await?;
        Ok(records)
    }

    /// Fewest failed attempts first, then least recently tried, then oldest.
    /// Publications that keep failing sink behind ones never tried.
    pub async fn publications_missing_summary(
        &self,
        limit: usize,
    ) -> Result<Vec<PublicationRecord>> {
        let limit = limit as i64;
        let records = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    r#"SELECT {RECORD_COLUMNS}
                       FROM publications p
                       LEFT JOIN summaries s ON s.publication_id = p.id
                       LEFT JOIN summary_attempts a ON a.publication_id = p.id
                       WHERE s.publication_id IS NULL
                       ORDER BY COALESCE(a.failures, 0), a.last_attempt_at NULLS FIRST,
                                p.fetched_at, p.id
                       LIMIT ?1"#
                ))?;
                let records = stmt
                    .query_map(params![limit], record_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(records)
            })
            .await?;
        Ok(records)
    }

    pub async fn categories(&self) -> Result<Vec<String>> {
        let categories = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT DISTINCT category FROM publications WHERE category IS NOT NULL ORDER BY category",
                )?;
                let categories = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(categories)
            })
            .await?;
        Ok(categories)
    }

    /// Topic labels in use, alphabetical.
    pub async fn topics(&self) -> Result<Vec<String>> {
        let topics = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT DISTINCT json_each.value
                       FROM publications p, json_each(p.topics)
                       ORDER BY json_each.value"#,
                )?;
                let topics = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(topics)
            })
            .await?;
        Ok(topics)
    }

    pub async fn count(&self) -> Result<usize> {
        let count = self
            .conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM publications", [], |row| row.get(0))?;
                Ok(count as usize)
            })
            .await?;
        Ok(count)
    }

    // Summary operations

    pub async fn save_summary(&self, publication_id: &str, content: String, model: String) -> Result<()> {
        if content.trim().is_empty() {
            return Err(AppError::EmptySummary);
        }

        let publication_id = publication_id.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO summaries (publication_id, content, model_version, generated_at)
                       VALUES (?1, ?2, ?3, ?4)
                       ON CONFLICT(publication_id) DO UPDATE SET
                           content = excluded.content,
                           model_version = excluded.model_version,
                           generated_at = excluded.generated_at"#,
                    params![publication_id, content, model, Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Counts a failed summary attempt for the backfill ordering.
    pub async fn record_summary_failure(&self, publication_id: &str) -> Result<()> {
        let publication_id = publication_id.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO summary_attempts (publication_id, failures, last_attempt_at)
                       VALUES (?1, 1, ?2)
                       ON CONFLICT(publication_id) DO UPDATE SET
                           failures = failures + 1,
                           last_attempt_at = excluded.last_attempt_at"#,
                    params![publication_id, Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

/// Make `%`, `_` and `\` in user input match literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // RFC3339 as written by this crate (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQLite datetime('now') default (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn record_from_row(row: &Row) -> rusqlite::Result<PublicationRecord> {
    let topics: String = row.get(5)?;
    Ok(PublicationRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        source_url: row.get(2)?,
        category: row.get(3)?,
        published_at: row
            .get::<_, Option<String>>(4)?
            .and_then(|s| parse_datetime(&s)),
        topics: serde_json::from_str(&topics).unwrap_or_default(),
        original_text: row.get(6)?,
        fetched_at: row
            .get::<_, String>(7)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        summary_text: row.get(8)?,
        summary_model: row.get(9)?,
        summarized_at: row
            .get::<_, Option<String>>(10)?
            .and_then(|s| parse_datetime(&s)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn publication(id: &str, url: &str, published: Option<DateTime<Utc>>) -> NewPublication {
        NewPublication {
            id: id.to_string(),
            title: format!("Title {id}"),
            source_url: url.to_string(),
            category: Some("Announcements".to_string()),
            published_at: published,
            topics: vec!["Housing".to_string()],
            original_text: format!("Original text of {id}."),
            fetched_at: Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn insert_is_keyed_by_id_and_url() {
        let repo = Repository::in_memory().await.unwrap();

        assert!(repo
            .insert_publication(publication("a", "https://x.org/a", None))
            .await
            .unwrap());
        // same id, different url
        assert!(!repo
            .insert_publication(publication("a", "https://x.org/other", None))
            .await
            .unwrap());
        // different id, same url
        assert!(!repo
            .insert_publication(publication("b", "https://x.org/a", None))
            .await
            .unwrap());

        assert_eq!(repo.count().await.unwrap(), 1);
        assert!(repo.contains("a").await.unwrap());
        assert!(repo.contains_url("https://x.org/a").await.unwrap());
        assert!(!repo.contains("b").await.unwrap());
    }

    #[tokio::test]
    async fn insert_does_not_overwrite_original_text() {
        let repo = Repository::in_memory().await.unwrap();
        repo.insert_publication(publication("a", "https://x.org/a", None))
            .await
            .unwrap();

        let mut changed = publication("a", "https://x.org/a", None);
        changed.original_text = "Rewritten".to_string();
        repo.insert_publication(changed).await.unwrap();

        let stored = repo.get_publication("a").await.unwrap().unwrap();
        assert_eq!(stored.original_text, "Original text of a.");
    }

    #[tokio::test]
    async fn empty_original_text_is_rejected() {
        let repo = Repository::in_memory().await.unwrap();
        let mut empty = publication("a", "https://x.org/a", None);
        empty.original_text = "   ".to_string();

        let result = repo.insert_publication(empty).await;
        assert!(matches!(result, Err(AppError::InvalidRecord(_))));
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn summary_round_trips_and_overwrites() {
        let repo = Repository::in_memory().await.unwrap();
        repo.insert_publication(publication("a", "https://x.org/a", None))
            .await
            .unwrap();

        let record = repo.get_publication("a").await.unwrap().unwrap();
        assert_eq!(record.summary_text, None);
        assert_eq!(record.topics, vec!["Housing".to_string()]);

        repo.save_summary("a", "First".to_string(), "m1".to_string())
            .await
            .unwrap();
        repo.save_summary("a", "Second".to_string(), "m2".to_string())
            .await
            .unwrap();

        let record = repo.get_publication("a").await.unwrap().unwrap();
        assert_eq!(record.summary_text.as_deref(), Some("Second"));
        assert_eq!(record.summary_model.as_deref(), Some("m2"));
        assert!(record.summarized_at.is_some());

        let empty = repo.save_summary("a", " ".to_string(), "m3".to_string()).await;
        assert!(matches!(empty, Err(AppError::EmptySummary)));
    }

    #[tokio::test]
    async fn list_orders_newest_first_with_undated_last() {
        let repo = Repository::in_memory().await.unwrap();
        let older = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();

        repo.insert_publication(publication("undated", "https://x.org/u", None))
            .await
            .unwrap();
        repo.insert_publication(publication("older", "https://x.org/o", Some(older)))
            .await
            .unwrap();
        let mut other = publication("newer", "https://x.org/n", Some(newer));
        other.category = Some("Consultations".to_string());
        repo.insert_publication(other).await.unwrap();

        let all = repo
            .list_publications(PublicationFilter::default())
            .await
            .unwrap();
        let ids: Vec<_> = all.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["newer", "older", "undated"]);

        let filtered = repo
            .list_publications(PublicationFilter {
                category: Some("Announcements".to_string()),
                limit: Some(1),
                ..PublicationFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, "older");

        assert_eq!(
            repo.categories().await.unwrap(),
            vec!["Announcements".to_string(), "Consultations".to_string()]
        );
    }

    #[tokio::test]
    async fn missing_summary_queue() {
        let repo = Repository::in_memory().await.unwrap();
        repo.insert_publication(publication("a", "https://x.org/a", None))
            .await
            .unwrap();
        repo.insert_publication(publication("b", "https://x.org/b", None))
            .await
            .unwrap();
        repo.save_summary("a", "Done".to_string(), "m".to_string())
            .await
            .unwrap();

        let pending = repo.publications_missing_summary(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "b");
    }

    #[tokio::test]
    async fn list_filters_by_title_keyword_and_topic() {
        let repo = Repository::in_memory().await.unwrap();
        let mut rent = publication("rent", "https://x.org/rent", None);
        rent.title = "Rent Smart Wales: 100% compliance".to_string();
        rent.topics = vec!["Housing".to_string(), "Justice and law".to_string()];
        repo.insert_publication(rent).await.unwrap();
        let mut buses = publication("buses", "https://x.org/buses", None);
        buses.title = "New bus_stop funding".to_string();
        buses.topics = vec!["Transport".to_string()];
        repo.insert_publication(buses).await.unwrap();

        let ids = |records: Vec<PublicationRecord>| {
            records.into_iter().map(|r| r.id).collect::<Vec<_>>()
        };

        let by_keyword = repo
            .list_publications(PublicationFilter {
                query: Some("  rent smart ".to_string()),
                ..PublicationFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(ids(by_keyword), vec!["rent"]);

        // wildcards in the keyword match literally
        let percent = repo
            .list_publications(PublicationFilter {
                query: Some("100%".to_string()),
                ..PublicationFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(ids(percent), vec!["rent"]);
        let underscore = repo
            .list_publications(PublicationFilter {
                query: Some("_".to_string()),
                ..PublicationFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(ids(underscore), vec!["buses"]);

        let by_topic = repo
            .list_publications(PublicationFilter {
                topic: Some("Justice and law".to_string()),
                ..PublicationFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(ids(by_topic), vec!["rent"]);

        let both = repo
            .list_publications(PublicationFilter {
                query: Some("bus".to_string()),
                topic: Some("Housing".to_string()),
                ..PublicationFilter::default()
            })
            .await
            .unwrap();
        assert!(both.is_empty());

        assert_eq!(
            repo.topics().await.unwrap(),
            vec![
                "Housing".to_string(),
                "Justice and law".to_string(),
                "Transport".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn failing_publications_rotate_to_the_back_of_the_queue() {
        let repo = Repository::in_memory().await.unwrap();
        for id in ["a", "b", "c"] {
            repo.insert_publication(publication(id, &format!("https://x.org/{id}"), None))
                .await
                .unwrap();
        }

        let first: Vec<_> = repo
            .publications_missing_summary(2)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(first, vec!["a", "b"]);

        repo.record_summary_failure("a").await.unwrap();
        repo.record_summary_failure("b").await.unwrap();

        let next: Vec<_> = repo
            .publications_missing_summary(2)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(next, vec!["c", "a"]);
    }

    #[tokio::test]
    async fn file_database_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pp.db");
        let path = path.to_str().unwrap();

        {
            let repo = Repository::new(path).await.unwrap();
            repo.insert_publication(publication("a", "https://x.org/a", None))
                .await
                .unwrap();
        }

        let repo = Repository::new(path).await.unwrap();
        assert!(repo.contains("a").await.unwrap());
    }
}
