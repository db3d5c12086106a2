//! Cache layer that orchestrates caching logic with network fetching.

use chrono::{DateTime, Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

use super::storage::ArticleStore;
use super::traits::{CacheKey, CacheResult};
use crate::news::error::NewsError;
use crate::news::types::NewsPage;

/// Age after which a stored entry is refetched
pub const FRESHNESS_WINDOW_MINUTES: i64 = 30;

type SharedFetch = Shared<BoxFuture<'static, Result<NewsPage, NewsError>>>;
type InFlight = Arc<Mutex<HashMap<CacheKey, SharedFetch>>>;

/// Read-through cache in front of the news fetcher.
///
/// This layer sits between the application and the network client. Store
/// failures are logged and never fail a read.
pub struct CacheLayer<S: ArticleStore> {
  storage: Arc<S>,
  /// How long before cached data is considered stale
  freshness: Duration,
  /// Fetches currently running, so concurrent misses share one request
  in_flight: InFlight,
}

impl<S: ArticleStore + 'static> CacheLayer<S> {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: S) -> Self {
    Self {
      storage: Arc::new(storage),
      freshness: Duration::minutes(FRESHNESS_WINDOW_MINUTES),
      in_flight: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  pub fn storage(&self) -> &S {
    &self.storage
  }

  /// Check if cached data is stale based on its creation timestamp.
  fn is_stale(&self, created_at: DateTime<Utc>) -> bool {
    Utc::now() - created_at > self.freshness
  }

  /// Read a key through the cache.
  ///
  /// 1. Unless forced, return the stored entry if it is fresh
  /// 2. Otherwise fetch (or join a fetch already running for this key)
  /// 3. Replace the stored entry with the fetched articles
  ///
  /// A failed fetch leaves the stored entry untouched.
  pub async fn read<F, Fut>(
    &self,
    key: &CacheKey,
    force_refresh: bool,
    fetcher: F,
  ) -> Result<CacheResult<NewsPage>, NewsError>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<NewsPage, NewsError>> + Send + 'static,
  {
    if !force_refresh {
      match self.storage.load(key) {
        Ok(Some(entry)) if !self.is_stale(entry.created_at) => {
          debug!(%key, count = entry.articles.len(), "cache hit");
          return Ok(CacheResult::from_cache(
            NewsPage::from_articles(entry.articles),
            entry.created_at,
          ));
        }
        Ok(Some(entry)) => {
          debug!(%key, created_at = %entry.created_at, "cache entry stale");
        }
        Ok(None) => debug!(%key, "cache miss"),
        Err(e) => warn!(%key, error = %e, "cache read failed, fetching live"),
      }
    }

    let page = self.join_or_start(key, fetcher).await?;
    Ok(CacheResult::from_network(page))
  }

  /// Return the running fetch for `key`, or start one that persists its result.
  fn join_or_start<F, Fut>(&self, key: &CacheKey, fetcher: F) -> SharedFetch
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<NewsPage, NewsError>> + Send + 'static,
  {
    let mut in_flight = self
      .in_flight
      .lock()
      .unwrap_or_else(PoisonError::into_inner);

    if let Some(running) = in_flight.get(key) {
      debug!(%key, "joining in-flight fetch");
      return running.clone();
    }

    let storage = Arc::clone(&self.storage);
    let registry = Arc::clone(&self.in_flight);
    let owned_key = key.clone();
    let fetch = fetcher();

    // Detached, so the fetch completes and persists even if every reader is aborted.
    let task = tokio::spawn(async move {
      let result = fetch.await;

      if let Ok(page) = &result {
        match storage.replace(&owned_key, &page.articles, Utc::now()) {
          Ok(()) => info!(key = %owned_key, count = page.articles.len(), "cache entry replaced"),
          Err(e) => warn!(key = %owned_key, error = %e, "failed to persist cache entry"),
        }
      }

      registry
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(&owned_key);
      result
    });

    let shared = async move {
      task
        .await
        .unwrap_or_else(|e| Err(NewsError::Network(format!("fetch task failed: {}", e))))
    }
    .boxed()
    .shared();

    in_flight.insert(key.clone(), shared.clone());
    shared
  }
}

impl<S: ArticleStore> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      freshness: self.freshness,
      in_flight: Arc::clone(&self.in_flight),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::storage::tests::sample_articles;
  use crate::cache::{CacheEntry, CacheSource, MemoryStorage};
  use crate::news::types::Article;
  use color_eyre::eyre::eyre;
  use std::sync::atomic::{AtomicUsize, Ordering};

  /// Fetcher returning `articles` and counting invocations
  fn counting_fetcher(
    calls: &Arc<AtomicUsize>,
    articles: Vec<Article>,
  ) -> impl FnOnce() -> BoxFuture<'static, Result<NewsPage, NewsError>> {
    let calls = Arc::clone(calls);
    move || {
      calls.fetch_add(1, Ordering::SeqCst);
      async move { Ok(NewsPage::from_articles(articles)) }.boxed()
    }
  }

  fn failing_fetcher(
    calls: &Arc<AtomicUsize>,
  ) -> impl FnOnce() -> BoxFuture<'static, Result<NewsPage, NewsError>> {
    let calls = Arc::clone(calls);
    move || {
      calls.fetch_add(1, Ordering::SeqCst);
      async { Err(NewsError::RateLimitExhausted { attempts: 2 }) }.boxed()
    }
  }

  /// Storage whose reads and/or writes always fail
  struct BrokenStorage {
    fail_reads: bool,
    inner: MemoryStorage,
  }

  impl ArticleStore for BrokenStorage {
    fn load(&self, key: &CacheKey) -> color_eyre::Result<Option<CacheEntry>> {
      if self.fail_reads {
        return Err(eyre!("disk on fire"));
      }
      self.inner.load(key)
    }

    fn replace(
      &self,
      _key: &CacheKey,
      _articles: &[Article],
      _created_at: DateTime<Utc>,
    ) -> color_eyre::Result<()> {
      Err(eyre!("read-only filesystem"))
    }
  }

  fn key() -> CacheKey {
    CacheKey::new("us", "general")
  }

  #[tokio::test]
  async fn test_miss_fetches_and_stores() {
    let cache = CacheLayer::new(MemoryStorage::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let result = cache
      .read(&key(), false, counting_fetcher(&calls, sample_articles(3)))
      .await
      .unwrap();

    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(result.data.articles, sample_articles(3));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
      cache.storage().load(&key()).unwrap().unwrap().articles,
      sample_articles(3)
    );
  }

  #[tokio::test]
  async fn test_second_read_within_window_hits_cache() {
    let cache = CacheLayer::new(MemoryStorage::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let first = cache
      .read(&key(), false, counting_fetcher(&calls, sample_articles(3)))
      .await
      .unwrap();
    let second = cache
      .read(&key(), false, counting_fetcher(&calls, sample_articles(1)))
      .await
      .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(second.source, CacheSource::Cache);
    assert_eq!(second.data.articles, first.data.articles);
  }

  #[tokio::test]
  async fn test_force_refresh_always_fetches() {
    let cache = CacheLayer::new(MemoryStorage::new());
    let calls = Arc::new(AtomicUsize::new(0));
    cache
      .storage()
      .replace(&key(), &sample_articles(2), Utc::now())
      .unwrap();

    let result = cache
      .read(&key(), true, counting_fetcher(&calls, sample_articles(4)))
      .await
      .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.data.articles.len(), 4);
    assert_eq!(cache.storage().load(&key()).unwrap().unwrap().articles.len(), 4);
  }

  #[tokio::test]
  async fn test_entry_older_than_window_is_replaced() {
    let cache = CacheLayer::new(MemoryStorage::new());
    let calls = Arc::new(AtomicUsize::new(0));
    cache
      .storage()
      .replace(&key(), &sample_articles(2), Utc::now() - Duration::minutes(31))
      .unwrap();

    let result = cache
      .read(&key(), false, counting_fetcher(&calls, sample_articles(5)))
      .await
      .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.source, CacheSource::Network);
    let stored = cache.storage().load(&key()).unwrap().unwrap();
    assert_eq!(stored.articles.len(), 5);
    assert!(Utc::now() - stored.created_at < Duration::minutes(1));
  }

  #[tokio::test]
  async fn test_entry_inside_window_is_served_without_fetch() {
    let cache = CacheLayer::new(MemoryStorage::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let created = Utc::now() - Duration::minutes(10);
    cache
      .storage()
      .replace(&key(), &sample_articles(2), created)
      .unwrap();

    let result = cache
      .read(&key(), false, counting_fetcher(&calls, sample_articles(5)))
      .await
      .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(result.source, CacheSource::Cache);
    assert_eq!(result.cached_at, Some(created));
    assert_eq!(result.data.articles, sample_articles(2));
    assert_eq!(result.data.total_articles, 2);
  }

  #[tokio::test]
  async fn test_failed_fetch_leaves_entry_untouched() {
    let cache = CacheLayer::new(MemoryStorage::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let created = Utc::now() - Duration::minutes(45);
    cache
      .storage()
      .replace(&key(), &sample_articles(2), created)
      .unwrap();

    let err = cache
      .read(&key(), false, failing_fetcher(&calls))
      .await
      .unwrap_err();

    assert_eq!(err, NewsError::RateLimitExhausted { attempts: 2 });
    let stored = cache.storage().load(&key()).unwrap().unwrap();
    assert_eq!(stored.articles, sample_articles(2));
    assert_eq!(stored.created_at, created);
  }

  #[tokio::test]
  async fn test_read_failure_falls_back_to_fetch() {
    let cache = CacheLayer::new(BrokenStorage {
      fail_reads: true,
      inner: MemoryStorage::new(),
    });
    let calls = Arc::new(AtomicUsize::new(0));

    let result = cache
      .read(&key(), false, counting_fetcher(&calls, sample_articles(2)))
      .await
      .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.data.articles.len(), 2);
  }

  #[tokio::test]
  async fn test_write_failure_does_not_fail_read() {
    let cache = CacheLayer::new(BrokenStorage {
      fail_reads: false,
      inner: MemoryStorage::new(),
    });
    let calls = Arc::new(AtomicUsize::new(0));

    let result = cache
      .read(&key(), false, counting_fetcher(&calls, sample_articles(3)))
      .await
      .unwrap();

    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(result.data.articles.len(), 3);
  }

  #[tokio::test]
  async fn test_concurrent_misses_share_one_fetch() {
    let cache = CacheLayer::new(MemoryStorage::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let slow = {
      let calls = Arc::clone(&calls);
      move || {
        calls.fetch_add(1, Ordering::SeqCst);
        async {
          tokio::time::sleep(std::time::Duration::from_millis(50)).await;
          Ok(NewsPage::from_articles(sample_articles(3)))
        }
      }
    };

    let k = key();
    let (a, b) = tokio::join!(
      cache.read(&k, false, slow),
      cache.read(&k, false, counting_fetcher(&calls, sample_articles(1))),
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(a.unwrap().data.articles, b.unwrap().data.articles);
  }

  #[tokio::test]
  async fn test_in_flight_entry_is_cleared_after_completion() {
    let cache = CacheLayer::new(MemoryStorage::new());
    let calls = Arc::new(AtomicUsize::new(0));

    cache
      .read(&key(), true, counting_fetcher(&calls, sample_articles(1)))
      .await
      .unwrap();
    cache
      .read(&key(), true, counting_fetcher(&calls, sample_articles(1)))
      .await
      .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(cache.in_flight.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_aborted_reader_still_completes_fetch() {
    let cache = CacheLayer::new(MemoryStorage::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let slow = {
      let calls = Arc::clone(&calls);
      move || {
        calls.fetch_add(1, Ordering::SeqCst);
        async {
          tokio::time::sleep(std::time::Duration::from_millis(100)).await;
          Ok(NewsPage::from_articles(sample_articles(3)))
        }
      }
    };

    let reader = {
      let cache = cache.clone();
      tokio::spawn(async move { cache.read(&key(), false, slow).await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    reader.abort();
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    assert_eq!(
      cache.storage().load(&key()).unwrap().unwrap().articles,
      sample_articles(3)
    );
    assert!(cache.in_flight.lock().unwrap().is_empty());

    let result = cache
      .read(&key(), false, counting_fetcher(&calls, sample_articles(1)))
      .await
      .unwrap();

    assert_eq!(result.source, CacheSource::Cache);
    assert_eq!(result.data.articles, sample_articles(3));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }
}
