//! Error taxonomy for the fetch subsystem.

/// Errors surfaced by the key rotator, the news fetcher and the article cache.
///
/// `Clone` so a single coalesced fetch can hand the same outcome to every
/// caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NewsError {
  /// No credentials available. Terminal for the whole fetch subsystem.
  #[error("configuration error: {0}")]
  Configuration(String),

  /// Every credential was tried within one logical fetch and all were rejected.
  #[error("all {attempts} API keys are rate limited, try again later")]
  RateLimitExhausted { attempts: usize },

  /// Upstream answered with a non-success status that is not a key rejection.
  #[error("news API returned HTTP {status}: {message}")]
  Transport { status: u16, message: String },

  /// The request never produced a response (DNS, TLS, timeout, ...).
  #[error("network error: {0}")]
  Network(String),

  /// The response body did not match the expected shape.
  #[error("failed to decode news API response: {0}")]
  Decode(String),
}

impl NewsError {
  /// Whether retrying later might succeed.
  pub fn is_recoverable(&self) -> bool {
    !matches!(self, NewsError::Configuration(_))
  }
}

impl From<reqwest::Error> for NewsError {
  fn from(error: reqwest::Error) -> Self {
    match error.status() {
      Some(status) => NewsError::Transport {
        status: status.as_u16(),
        message: error.to_string(),
      },
      None => NewsError::Network(error.to_string()),
    }
  }
}

impl From<serde_json::Error> for NewsError {
  fn from(error: serde_json::Error) -> Self {
    NewsError::Decode(error.to_string())
  }
}
