//! Core types for the article cache.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::news::types::Article;

/// Identifies one cached result set: (country, category), both lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
  country: String,
  category: String,
}

impl CacheKey {
  pub fn new(country: &str, category: &str) -> Self {
    Self {
      country: country.trim().to_lowercase(),
      category: category.trim().to_lowercase(),
    }
  }

  /// Key string used by the persisted store, e.g. `us-general`
  pub fn storage_key(&self) -> String {
    format!("{}-{}", self.country, self.category)
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}-{}", self.country, self.category)
  }
}

/// A stored result set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
  pub key: CacheKey,
  /// Articles in upstream order
  pub articles: Vec<Article>,
  pub created_at: DateTime<Utc>,
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new cache result from cached data.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      cached_at: Some(cached_at),
    }
  }
}

/// Indicates where data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from the news API
  Network,
  /// Stored entry still inside the freshness window
  Cache,
}
