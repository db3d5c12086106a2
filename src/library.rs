//! Bookmarks and reading history kept in the local database.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::cache::{article_from_row, format_datetime, parse_datetime};
use crate::db::Database;
use crate::news::types::{Article, Category};

/// How many history rows are listed
pub const HISTORY_LIMIT: usize = 50;

const ARTICLE_COLUMNS: &str =
  "article_id, title, description, content, url, image_url, published_at, source_name, source_url";

/// An article saved to the library, with when and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedArticle {
  pub article: Article,
  pub category: Option<Category>,
  /// Bookmark creation or last read time
  pub saved_at: DateTime<Utc>,
  /// Seconds spent in the detail view (history only)
  pub read_duration: Option<u64>,
}

/// Which library list to show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shelf {
  Bookmarks,
  History,
}

impl Shelf {
  pub fn title(&self) -> &'static str {
    match self {
      Shelf::Bookmarks => "Bookmarks",
      Shelf::History => "History",
    }
  }
}

#[derive(Clone)]
pub struct Library {
  db: Arc<Database>,
}

impl Library {
  pub fn new(db: Arc<Database>) -> Self {
    Self { db }
  }

  /// Bookmark an article. Bookmarking the same URL twice keeps one row.
  pub fn add_bookmark(&self, article: &Article, category: Option<Category>) -> Result<()> {
    let conn = self.db.conn()?;
    conn
      .execute(
        "INSERT INTO bookmarks (url, article_id, title, description, content, image_url,
                                published_at, source_name, source_url, category, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(url) DO NOTHING",
        params![
          article.url,
          article.id,
          article.title,
          article.description,
          article.content,
          article.image,
          format_datetime(&article.published_at),
          article.source_name,
          article.source_url,
          category.map(|c| c.as_str()),
          format_datetime(&Utc::now()),
        ],
      )
      .map_err(|e| eyre!("Failed to add bookmark: {}", e))?;
    debug!(url = %article.url, "bookmark added");
    Ok(())
  }

  pub fn remove_bookmark(&self, url: &str) -> Result<()> {
    let conn = self.db.conn()?;
    conn
      .execute("DELETE FROM bookmarks WHERE url = ?1", params![url])
      .map_err(|e| eyre!("Failed to remove bookmark: {}", e))?;
    debug!(url, "bookmark removed");
    Ok(())
  }

  pub fn is_bookmarked(&self, url: &str) -> Result<bool> {
    let conn = self.db.conn()?;
    let found = conn
      .query_row("SELECT 1 FROM bookmarks WHERE url = ?1", params![url], |_| Ok(()))
      .optional()
      .map_err(|e| eyre!("Failed to query bookmark: {}", e))?;
    Ok(found.is_some())
  }

  /// Add or remove a bookmark. Returns whether the article is now bookmarked.
  pub fn toggle_bookmark(&self, article: &Article, category: Option<Category>) -> Result<bool> {
    if self.is_bookmarked(&article.url)? {
      self.remove_bookmark(&article.url)?;
      Ok(false)
    } else {
      self.add_bookmark(article, category)?;
      Ok(true)
    }
  }

  /// Bookmarks, newest first
  pub fn bookmarks(&self) -> Result<Vec<SavedArticle>> {
    let sql = format!(
      "SELECT {}, category, created_at, NULL FROM bookmarks ORDER BY created_at DESC",
      ARTICLE_COLUMNS
    );
    self.list(&sql, None)
  }

  /// Record that an article was opened. Re-opening moves it to the top.
  pub fn record_open(&self, article: &Article, category: Option<Category>) -> Result<()> {
    let conn = self.db.conn()?;
    conn
      .execute(
        "INSERT INTO reading_history (url, article_id, title, description, content, image_url,
                                      published_at, source_name, source_url, category, read_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(url) DO UPDATE SET read_at = excluded.read_at",
        params![
          article.url,
          article.id,
          article.title,
          article.description,
          article.content,
          article.image,
          format_datetime(&article.published_at),
          article.source_name,
          article.source_url,
          category.map(|c| c.as_str()),
          format_datetime(&Utc::now()),
        ],
      )
      .map_err(|e| eyre!("Failed to record reading history: {}", e))?;
    Ok(())
  }

  /// Store how long the reader spent on an article.
  pub fn record_duration(&self, url: &str, duration: Duration) -> Result<()> {
    let conn = self.db.conn()?;
    conn
      .execute(
        "UPDATE reading_history SET read_duration = ?2 WHERE url = ?1",
        params![url, duration.as_secs() as i64],
      )
      .map_err(|e| eyre!("Failed to record reading duration: {}", e))?;
    debug!(url, secs = duration.as_secs(), "reading duration recorded");
    Ok(())
  }

  /// Most recently read articles
  pub fn history(&self) -> Result<Vec<SavedArticle>> {
    let sql = format!(
      "SELECT {}, category, read_at, read_duration FROM reading_history
       ORDER BY read_at DESC LIMIT ?1",
      ARTICLE_COLUMNS
    );
    self.list(&sql, Some(HISTORY_LIMIT))
  }

  pub fn shelf(&self, shelf: Shelf) -> Result<Vec<SavedArticle>> {
    match shelf {
      Shelf::Bookmarks => self.bookmarks(),
      Shelf::History => self.history(),
    }
  }

  fn list(&self, sql: &str, limit: Option<usize>) -> Result<Vec<SavedArticle>> {
    let conn = self.db.conn()?;
    let mut stmt = conn
      .prepare(sql)
      .map_err(|e| eyre!("Failed to prepare library query: {}", e))?;

    type LibraryRow = (Article, Option<String>, String, Option<i64>);
    let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<LibraryRow> {
      let article = article_from_row(row, 0)?;
      let category: Option<String> = row.get(9)?;
      let saved_at: String = row.get(10)?;
      let read_duration: Option<i64> = row.get(11)?;
      Ok((article, category, saved_at, read_duration))
    };

    let rows = match limit {
      Some(limit) => stmt
        .query_map(params![limit as i64], map_row)
        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>()),
      None => stmt
        .query_map([], map_row)
        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>()),
    }
    .map_err(|e| eyre!("Failed to read library: {}", e))?;

    rows
      .into_iter()
      .map(|(article, category, saved_at, read_duration)| -> Result<SavedArticle> {
        Ok(SavedArticle {
          article,
          category: category.and_then(|c| c.parse().ok()),
          saved_at: parse_datetime(&saved_at)?,
          read_duration: read_duration.map(|d| d.max(0) as u64),
        })
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::sample_articles;

  fn library() -> Library {
    Library::new(Arc::new(Database::open_in_memory().unwrap()))
  }

  #[test]
  fn test_bookmark_roundtrip() {
    let lib = library();
    let articles = sample_articles(2);

    lib.add_bookmark(&articles[0], Some(Category::Science)).unwrap();

    let saved = lib.bookmarks().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].article, articles[0]);
    assert_eq!(saved[0].category, Some(Category::Science));
    assert!(lib.is_bookmarked(&articles[0].url).unwrap());
    assert!(!lib.is_bookmarked(&articles[1].url).unwrap());
  }

  #[test]
  fn test_bookmark_is_unique_per_url() {
    let lib = library();
    let article = &sample_articles(1)[0];

    lib.add_bookmark(article, None).unwrap();
    lib.add_bookmark(article, None).unwrap();

    assert_eq!(lib.bookmarks().unwrap().len(), 1);
  }

  #[test]
  fn test_toggle_bookmark() {
    let lib = library();
    let article = &sample_articles(1)[0];

    assert!(lib.toggle_bookmark(article, None).unwrap());
    assert!(lib.is_bookmarked(&article.url).unwrap());
    assert!(!lib.toggle_bookmark(article, None).unwrap());
    assert!(lib.bookmarks().unwrap().is_empty());
  }

  #[test]
  fn test_history_upsert_and_duration() {
    let lib = library();
    let articles = sample_articles(2);

    lib.record_open(&articles[0], Some(Category::World)).unwrap();
    std::thread::sleep(Duration::from_millis(2));
    lib.record_open(&articles[1], None).unwrap();
    std::thread::sleep(Duration::from_millis(2));
    lib.record_open(&articles[0], Some(Category::World)).unwrap();
    lib
      .record_duration(&articles[0].url, Duration::from_secs(42))
      .unwrap();

    let history = lib.history().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].article.url, articles[0].url);
    assert_eq!(history[0].read_duration, Some(42));
    assert_eq!(history[1].read_duration, None);
  }

  #[test]
  fn test_history_is_limited() {
    let lib = library();
    for article in sample_articles(HISTORY_LIMIT + 5) {
      lib.record_open(&article, None).unwrap();
    }
    assert_eq!(lib.history().unwrap().len(), HISTORY_LIMIT);
  }

  #[test]
  fn test_duration_for_unknown_url_is_ignored() {
    let lib = library();
    lib
      .record_duration("https://nowhere.example.com", Duration::from_secs(5))
      .unwrap();
    assert!(lib.history().unwrap().is_empty());
  }
}
