//! Cached news client that wraps NewsClient with a read-through cache.

use tracing::debug;

use crate::cache::{ArticleStore, CacheLayer, CacheResult};

use super::client::NewsClient;
use super::error::NewsError;
use super::types::{NewsPage, RequestIntent};

/// News client with transparent caching.
///
/// Headline and category reads go through the cache; searches always hit the
/// network and are never stored.
pub struct CachedNewsClient<S: ArticleStore = Box<dyn ArticleStore>> {
  inner: NewsClient,
  cache: CacheLayer<S>,
}

impl<S: ArticleStore + 'static> CachedNewsClient<S> {
  pub fn new(inner: NewsClient, storage: S) -> Self {
    Self {
      inner,
      cache: CacheLayer::new(storage),
    }
  }

  /// Load articles for an intent.
  pub async fn read(
    &self,
    intent: &RequestIntent,
    force_refresh: bool,
  ) -> Result<CacheResult<NewsPage>, NewsError> {
    let Some(key) = intent.cache_key() else {
      debug!(%intent, "search bypasses cache");
      let page = self.inner.fetch(intent).await?;
      return Ok(CacheResult::from_network(page));
    };

    let inner = self.inner.clone();
    let owned = intent.clone();
    self
      .cache
      .read(&key, force_refresh, move || async move {
        inner.fetch(&owned).await
      })
      .await
  }

  #[cfg(test)]
  pub fn storage(&self) -> &S {
    self.cache.storage()
  }
}

impl<S: ArticleStore> Clone for CachedNewsClient<S> {
  fn clone(&self) -> Self {
    Self {
      inner: self.inner.clone(),
      cache: self.cache.clone(),
    }
  }
}
