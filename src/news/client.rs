//! News API client: builds requests, rotates keys on rejection, normalizes
//! responses.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use tracing::{info, warn};
use url::Url;

use super::api_types::ApiNewsResponse;
use super::error::NewsError;
use super::keys::{ApiKey, KeyRotator};
use super::types::{NewsPage, RequestIntent};
use crate::config::NewsConfig;

/// Statuses that mean "this key cannot be used right now": rate limited (429),
/// daily quota exhausted (403) or an invalid / exhausted key (400).
fn is_key_rejection(status: StatusCode) -> bool {
  matches!(
    status,
    StatusCode::TOO_MANY_REQUESTS | StatusCode::FORBIDDEN | StatusCode::BAD_REQUEST
  )
}

/// Copy of a request URL with the key masked, for logs
fn redact(url: &Url) -> String {
  let mut masked = url.clone();
  let pairs: Vec<(String, String)> = url
    .query_pairs()
    .map(|(k, v)| {
      let v = if k == "apikey" { "***".into() } else { v.into_owned() };
      (k.into_owned(), v)
    })
    .collect();
  masked.query_pairs_mut().clear().extend_pairs(pairs);
  masked.to_string()
}

/// Pull a readable message out of an error body (`{"errors": [...]}`).
fn error_message(status: StatusCode, body: &[u8]) -> String {
  let from_body = serde_json::from_slice::<Value>(body).ok().and_then(|v| {
    match v.get("errors")? {
      Value::Array(items) => Some(
        items
          .iter()
          .filter_map(|i| i.as_str())
          .collect::<Vec<_>>()
          .join("; "),
      ),
      Value::Object(map) => Some(
        map
          .values()
          .filter_map(|i| i.as_str())
          .collect::<Vec<_>>()
          .join("; "),
      ),
      Value::String(s) => Some(s.clone()),
      _ => None,
    }
  });

  from_body
    .filter(|m| !m.is_empty())
    .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string())
}

/// News API client
#[derive(Clone)]
pub struct NewsClient {
  http: reqwest::Client,
  base_url: Url,
  max_articles: u32,
  rotator: Arc<KeyRotator>,
}

impl NewsClient {
  pub fn new(config: &NewsConfig, rotator: Arc<KeyRotator>) -> Result<Self, NewsError> {
    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .user_agent(concat!("newsdeck/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| NewsError::Configuration(format!("failed to build HTTP client: {}", e)))?;

    Self::with_http(http, &config.base_url, config.max_articles, rotator)
  }

  /// Create a client around an existing HTTP client.
  pub fn with_http(
    http: reqwest::Client,
    base_url: &str,
    max_articles: u32,
    rotator: Arc<KeyRotator>,
  ) -> Result<Self, NewsError> {
    let base_url = Url::parse(base_url)
      .map_err(|e| NewsError::Configuration(format!("invalid news API URL '{}': {}", base_url, e)))?;
    if base_url.cannot_be_a_base() {
      return Err(NewsError::Configuration(format!(
        "news API URL '{}' cannot be used as a base",
        base_url
      )));
    }

    Ok(Self {
      http,
      base_url,
      max_articles,
      rotator,
    })
  }

  /// Build the request URL for an intent with the given key.
  pub fn request_url(&self, intent: &RequestIntent, key: &ApiKey) -> Url {
    let endpoint = match intent {
      RequestIntent::Search { .. } => "search",
      _ => "top-headlines",
    };

    let mut url = self.base_url.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
      segments.pop_if_empty().push(endpoint);
    }

    {
      let mut query = url.query_pairs_mut();
      query.append_pair("apikey", key.expose());
      match intent {
        RequestIntent::TopHeadlines { country } => {
          query.append_pair("country", country);
        }
        RequestIntent::Category { country, category } => {
          query.append_pair("country", country);
          query.append_pair("category", category.as_str());
        }
        RequestIntent::Search { country, query: q } => {
          query.append_pair("q", q);
          query.append_pair("country", country);
        }
      }
      query.append_pair("max", &self.max_articles.to_string());
    }

    url
  }

  /// Fetch one page for an intent.
  ///
  /// Rejected keys are rotated and the request retried, sequentially, at
  /// most once per key in the pool. Any other failure is returned at once.
  pub async fn fetch(&self, intent: &RequestIntent) -> Result<NewsPage, NewsError> {
    let mut attempts = 0usize;
    let mut budget: Option<usize> = None;

    loop {
      let lease = self.rotator.next().await?;
      let budget = *budget.get_or_insert(lease.pool_size);
      attempts += 1;

      let url = self.request_url(intent, &lease.key);
      info!(%intent, url = %redact(&url), attempt = attempts, "fetching news");

      let response = self.http.get(url).send().await?;
      let status = response.status();

      if is_key_rejection(status) {
        warn!(
          %intent,
          status = status.as_u16(),
          key = %lease.key.fingerprint(),
          attempt = attempts,
          "news API rejected key"
        );
        self.rotator.advance_on_rate_limit(&lease).await;
        if attempts >= budget {
          return Err(NewsError::RateLimitExhausted { attempts });
        }
        continue;
      }

      let body = response.bytes().await?;

      if !status.is_success() {
        return Err(NewsError::Transport {
          status: status.as_u16(),
          message: error_message(status, &body),
        });
      }

      let parsed: ApiNewsResponse = serde_json::from_slice(&body)?;
      let page = NewsPage::from(parsed);
      info!(%intent, count = page.articles.len(), total = page.total_articles, "fetched news");
      return Ok(page);
    }
  }
}
