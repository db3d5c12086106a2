/// Schema for the article cache and the reading library.
pub const SCHEMA: &str = r#"
-- One row per cached result set
CREATE TABLE IF NOT EXISTS cache_entries (
    cache_key TEXT PRIMARY KEY,
    article_count INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

-- Denormalized articles of a result set (position preserves API order)
CREATE TABLE IF NOT EXISTS cached_articles (
    category TEXT NOT NULL,
    position INTEGER NOT NULL,
    article_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    content TEXT,
    url TEXT NOT NULL,
    image_url TEXT,
    published_at TEXT NOT NULL,
    source_name TEXT NOT NULL,
    source_url TEXT,
    created_at TEXT NOT NULL,
    PRIMARY KEY (category, position)
);

CREATE TABLE IF NOT EXISTS bookmarks (
    url TEXT PRIMARY KEY,
    article_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    content TEXT,
    image_url TEXT,
    published_at TEXT NOT NULL,
    source_name TEXT NOT NULL,
    source_url TEXT,
    category TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_bookmarks_created ON bookmarks(created_at);

CREATE TABLE IF NOT EXISTS reading_history (
    url TEXT PRIMARY KEY,
    article_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    content TEXT,
    image_url TEXT,
    published_at TEXT NOT NULL,
    source_name TEXT NOT NULL,
    source_url TEXT,
    category TEXT,
    read_at TEXT NOT NULL,
    read_duration INTEGER
);

CREATE INDEX IF NOT EXISTS idx_reading_history_read_at ON reading_history(read_at);
"#;
