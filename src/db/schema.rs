pub const SCHEMA: &str = r#"
-- publications table
CREATE TABLE IF NOT EXISTS publications (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    source_url TEXT NOT NULL UNIQUE,
    category TEXT,
    published_at TEXT,
    topics TEXT NOT NULL DEFAULT '[]',
    original_text TEXT NOT NULL CHECK (length(trim(original_text)) > 0),
    fetched_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_publications_published_at ON publications(published_at DESC);
CREATE INDEX IF NOT EXISTS idx_publications_category ON publications(category);

-- summaries table (one current summary per publication, overwritten on regeneration)
CREATE TABLE IF NOT EXISTS summaries (
    publication_id TEXT PRIMARY KEY REFERENCES publications(id) ON DELETE CASCADE,
    content TEXT NOT NULL CHECK (length(trim(content)) > 0),
    model_version TEXT NOT NULL,
    generated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- failed summary attempts, so the backfill rotates past publications that keep failing
CREATE TABLE IF NOT EXISTS summary_attempts (
    publication_id TEXT PRIMARY KEY REFERENCES publications(id) ON DELETE CASCADE,
    failures INTEGER NOT NULL DEFAULT 0,
    last_attempt_at TEXT NOT NULL
);
"#;
