use chrono::{DateTime, Utc};

/// Average reading speed used for estimates
const WORDS_PER_MINUTE: usize = 200;

/// Word count assumed when an article has no description
const FALLBACK_WORDS: usize = 100;

/// Truncate to at most `max_len` characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Short age like "5m ago", "3h ago" or "2d ago"
pub fn relative_age(published_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
  let age = now - published_at;
  if age.num_minutes() < 1 {
    "just now".to_string()
  } else if age.num_hours() < 1 {
    format!("{}m ago", age.num_minutes())
  } else if age.num_days() < 1 {
    format!("{}h ago", age.num_hours())
  } else {
    format!("{}d ago", age.num_days())
  }
}

/// Estimated reading time in minutes, never less than one
pub fn read_time_minutes(description: &str) -> usize {
  let words = match description.split_whitespace().count() {
    0 => FALLBACK_WORDS,
    n => n,
  };
  (words / WORDS_PER_MINUTE).max(1)
}
