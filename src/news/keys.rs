//! API key rotation.
//!
//! Keys come from a [`CredentialSource`] and are cached for a short window so
//! secrets rotated outside the process are picked up without a restart.

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::api_types::ApiKeysResponse;
use super::error::NewsError;

/// How long a loaded key set is trusted before the source is asked again
pub const KEY_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Highest numbered `GNEWS_API_KEY_<n>` variable that is looked at
const MAX_NUMBERED_KEYS: usize = 16;

/// An opaque news API key. Never printed in cleartext.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
  pub fn new(key: impl Into<String>) -> Self {
    Self(key.into())
  }

  /// The raw key, for embedding into a request
  pub fn expose(&self) -> &str {
    &self.0
  }

  /// Short stable identifier safe to put in logs
  pub fn fingerprint(&self) -> String {
    let digest = Sha256::digest(self.0.as_bytes());
    hex::encode(&digest[..4])
  }
}

impl fmt::Debug for ApiKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "ApiKey({})", self.fingerprint())
  }
}

fn collect_keys<I: IntoIterator<Item = String>>(raw: I) -> Vec<ApiKey> {
  raw
    .into_iter()
    .map(|k| k.trim().to_string())
    .filter(|k| !k.is_empty())
    .map(ApiKey)
    .collect()
}

// ============================================================================
// Credential sources
// ============================================================================

/// Where API keys are loaded from.
#[async_trait]
pub trait CredentialSource: Send + Sync {
  /// Load the current ordered key set.
  async fn load(&self) -> Result<Vec<ApiKey>, NewsError>;

  /// Human readable name for logs
  fn describe(&self) -> String;
}

#[async_trait]
impl CredentialSource for Box<dyn CredentialSource> {
  async fn load(&self) -> Result<Vec<ApiKey>, NewsError> {
    (**self).load().await
  }

  fn describe(&self) -> String {
    (**self).describe()
  }
}

/// Keys listed directly in configuration.
pub struct StaticCredentials {
  keys: Vec<ApiKey>,
}

impl StaticCredentials {
  pub fn new<I, S>(keys: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      keys: collect_keys(keys.into_iter().map(Into::into)),
    }
  }
}

#[async_trait]
impl CredentialSource for StaticCredentials {
  async fn load(&self) -> Result<Vec<ApiKey>, NewsError> {
    Ok(self.keys.clone())
  }

  fn describe(&self) -> String {
    "static configuration".to_string()
  }
}

/// Keys read from the process environment.
///
/// `NEWSDECK_API_KEYS` (comma separated) takes precedence; otherwise
/// `GNEWS_API_KEY_1` .. `GNEWS_API_KEY_16` are collected in order, skipping
/// unset ones.
#[derive(Debug, Default)]
pub struct EnvCredentials;

impl EnvCredentials {
  fn keys_from<F>(lookup: F) -> Vec<ApiKey>
  where
    F: Fn(&str) -> Option<String>,
  {
    if let Some(list) = lookup("NEWSDECK_API_KEYS") {
      let keys = collect_keys(list.split(',').map(String::from));
      if !keys.is_empty() {
        return keys;
      }
    }

    collect_keys((1..=MAX_NUMBERED_KEYS).filter_map(|n| lookup(&format!("GNEWS_API_KEY_{}", n))))
  }
}

#[async_trait]
impl CredentialSource for EnvCredentials {
  async fn load(&self) -> Result<Vec<ApiKey>, NewsError> {
    Ok(Self::keys_from(|name| std::env::var(name).ok()))
  }

  fn describe(&self) -> String {
    "environment".to_string()
  }
}

/// Keys served by a secrets function over HTTP.
pub struct EndpointCredentials {
  http: reqwest::Client,
  url: url::Url,
  bearer: Option<String>,
}

impl EndpointCredentials {
  pub fn new(http: reqwest::Client, url: url::Url, bearer: Option<String>) -> Self {
    Self { http, url, bearer }
  }
}

#[async_trait]
impl CredentialSource for EndpointCredentials {
  async fn load(&self) -> Result<Vec<ApiKey>, NewsError> {
    let mut request = self.http.get(self.url.clone());
    if let Some(token) = &self.bearer {
      request = request.bearer_auth(token);
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
      return Err(NewsError::Configuration(format!(
        "credential endpoint returned HTTP {}",
        status.as_u16()
      )));
    }

    let body = response.bytes().await?;
    let parsed: ApiKeysResponse = serde_json::from_slice(&body)?;
    Ok(collect_keys(parsed.into_keys()))
  }

  fn describe(&self) -> String {
    format!("endpoint {}", self.url)
  }
}

// ============================================================================
// Rotator
// ============================================================================

/// A key handed out by the rotator for one request attempt
#[derive(Debug, Clone)]
pub struct KeyLease {
  pub key: ApiKey,
  /// Position of the key in the pool when it was handed out
  pub index: usize,
  /// Number of keys in the pool when it was handed out
  pub pool_size: usize,
}

#[derive(Debug, Default)]
struct RotatorState {
  keys: Vec<ApiKey>,
  index: usize,
  loaded_at: Option<Instant>,
}

/// Round-robin key rotator with a cached key set.
pub struct KeyRotator {
  source: Box<dyn CredentialSource>,
  refresh_interval: Duration,
  state: Mutex<RotatorState>,
}

impl KeyRotator {
  pub fn new(source: impl CredentialSource + 'static) -> Self {
    Self {
      source: Box::new(source),
      refresh_interval: KEY_REFRESH_INTERVAL,
      state: Mutex::new(RotatorState::default()),
    }
  }

  /// Override how long a loaded key set is trusted.
  pub fn with_refresh_interval(mut self, refresh_interval: Duration) -> Self {
    self.refresh_interval = refresh_interval;
    self
  }

  /// Hand out the key at the rotation index, then advance the index.
  pub async fn next(&self) -> Result<KeyLease, NewsError> {
    let mut state = self.state.lock().await;
    self.ensure_loaded(&mut state).await?;

    let pool_size = state.keys.len();
    let index = state.index % pool_size;
    let key = state.keys[index].clone();
    state.index = (index + 1) % pool_size;

    debug!(key = %key.fingerprint(), index, pool_size, "leased API key");
    Ok(KeyLease {
      key,
      index,
      pool_size,
    })
  }

  /// Move the rotation index past a key the API just rejected.
  ///
  /// Relative to the lease, so calling it after `next()` already advanced
  /// never skips a key.
  pub async fn advance_on_rate_limit(&self, lease: &KeyLease) {
    let mut state = self.state.lock().await;
    let pool_size = state.keys.len();
    if pool_size == 0 {
      return;
    }
    state.index = (lease.index + 1) % pool_size;
    warn!(
      key = %lease.key.fingerprint(),
      next_index = state.index,
      "API key rejected, rotating"
    );
  }

  /// Current rotation index (the key the next call will receive)
  pub async fn current_index(&self) -> usize {
    self.state.lock().await.index
  }

  async fn ensure_loaded(&self, state: &mut RotatorState) -> Result<(), NewsError> {
    let fresh = !state.keys.is_empty()
      && state
        .loaded_at
        .map(|t| t.elapsed() < self.refresh_interval)
        .unwrap_or(false);
    if fresh {
      return Ok(());
    }

    match self.source.load().await {
      Ok(keys) if !keys.is_empty() => {
        if keys.len() != state.keys.len() {
          info!(
            source = %self.source.describe(),
            count = keys.len(),
            "loaded API keys"
          );
          state.index %= keys.len();
        }
        state.keys = keys;
        state.loaded_at = Some(Instant::now());
        Ok(())
      }
      Ok(_) => {
        state.keys.clear();
        state.index = 0;
        Err(NewsError::Configuration(format!(
          "no API keys configured (source: {})",
          self.source.describe()
        )))
      }
      Err(e) if !state.keys.is_empty() => {
        warn!(error = %e, "failed to refresh API keys, keeping previous set");
        Ok(())
      }
      Err(e) => Err(e),
    }
  }
}
