//! Cache storage trait and its implementations.

use chrono::{DateTime, SecondsFormat, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::types::Type;
use rusqlite::Error::FromSqlConversionFailure;
use rusqlite::{params, OptionalExtension, Row};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::traits::{CacheEntry, CacheKey};
use crate::db::Database;
use crate::news::types::Article;

/// Trait for cache storage backends.
pub trait ArticleStore: Send + Sync {
  /// Get the entry stored for a key, if any.
  fn load(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;

  /// Replace everything stored for a key with a new result set.
  fn replace(&self, key: &CacheKey, articles: &[Article], created_at: DateTime<Utc>) -> Result<()>;
}

impl<T: ArticleStore + ?Sized> ArticleStore for Box<T> {
  fn load(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
    (**self).load(key)
  }

  fn replace(&self, key: &CacheKey, articles: &[Article], created_at: DateTime<Utc>) -> Result<()> {
    (**self).replace(key, articles, created_at)
  }
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl ArticleStore for NoopStorage {
  fn load(&self, _key: &CacheKey) -> Result<Option<CacheEntry>> {
    Ok(None) // Always miss
  }

  fn replace(&self, _key: &CacheKey, _articles: &[Article], _created_at: DateTime<Utc>) -> Result<()> {
    Ok(()) // Discard
  }
}

/// In-process storage
#[derive(Default)]
pub struct MemoryStorage {
  entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

impl ArticleStore for MemoryStorage {
  fn load(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
    let entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(entries.get(key).cloned())
  }

  fn replace(&self, key: &CacheKey, articles: &[Article], created_at: DateTime<Utc>) -> Result<()> {
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    entries.insert(
      key.clone(),
      CacheEntry {
        key: key.clone(),
        articles: articles.to_vec(),
        created_at,
      },
    );
    Ok(())
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  db: Arc<Database>,
}

impl SqliteStorage {
  pub fn new(db: Arc<Database>) -> Self {
    Self { db }
  }
}

/// Format a timestamp for storage
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp
pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

/// Read the article columns shared by every article table, starting at `offset`:
/// article_id, title, description, content, url, image_url, published_at,
/// source_name, source_url
pub(crate) fn article_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Article> {
  let published_at: String = row.get(offset + 6)?;
  let published_at = DateTime::parse_from_rfc3339(&published_at)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| FromSqlConversionFailure(offset + 6, Type::Text, Box::new(e)))?;

  Ok(Article {
    id: row.get(offset)?,
    title: row.get(offset + 1)?,
    description: row.get::<_, Option<String>>(offset + 2)?.unwrap_or_default(),
    content: row.get(offset + 3)?,
    url: row.get(offset + 4)?,
    image: row.get(offset + 5)?,
    published_at,
    source_name: row.get(offset + 7)?,
    source_url: row.get(offset + 8)?,
  })
}

impl ArticleStore for SqliteStorage {
  fn load(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
    let conn = self.db.conn()?;
    let storage_key = key.storage_key();

    let created_at: Option<String> = conn
      .query_row(
        "SELECT created_at FROM cache_entries WHERE cache_key = ?",
        params![storage_key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to query cache entry: {}", e))?;

    let created_at = match created_at {
      Some(s) => parse_datetime(&s)?,
      None => return Ok(None),
    };

    let mut stmt = conn
      .prepare(
        "SELECT article_id, title, description, content, url, image_url, published_at,
                source_name, source_url
         FROM cached_articles
         WHERE category = ?
         ORDER BY position",
      )
      .map_err(|e| eyre!("Failed to prepare article query: {}", e))?;

    let rows = stmt
      .query_map(params![storage_key], |row| article_from_row(row, 0))
      .map_err(|e| eyre!("Failed to query cached articles: {}", e))?;

    let articles = rows
      .collect::<rusqlite::Result<Vec<Article>>>()
      .map_err(|e| eyre!("Failed to read cached article: {}", e))?;

    Ok(Some(CacheEntry {
      key: key.clone(),
      articles,
      created_at,
    }))
  }

  fn replace(&self, key: &CacheKey, articles: &[Article], created_at: DateTime<Utc>) -> Result<()> {
    let mut conn = self.db.conn()?;
    let storage_key = key.storage_key();
    let created = format_datetime(&created_at);

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "DELETE FROM cached_articles WHERE category = ?",
      params![storage_key],
    )
    .map_err(|e| eyre!("Failed to delete old cached articles: {}", e))?;

    tx.execute(
      "INSERT OR REPLACE INTO cache_entries (cache_key, article_count, created_at)
       VALUES (?, ?, ?)",
      params![storage_key, articles.len(), created],
    )
    .map_err(|e| eyre!("Failed to update cache entry: {}", e))?;

    {
      let mut insert = tx
        .prepare(
          "INSERT INTO cached_articles (category, position, article_id, title, description,
             content, url, image_url, published_at, source_name, source_url, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .map_err(|e| eyre!("Failed to prepare insert: {}", e))?;

      for (position, article) in articles.iter().enumerate() {
        insert
          .execute(params![
            storage_key,
            position,
            article.id,
            article.title,
            article.description,
            article.content,
            article.url,
            article.image,
            format_datetime(&article.published_at),
            article.source_name,
            article.source_url,
            created,
          ])
          .map_err(|e| eyre!("Failed to store article: {}", e))?;
      }
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }
}
