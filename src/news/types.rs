//! Domain types for news articles and fetch requests.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::CacheKey;

/// A normalized news article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
  /// Surrogate id derived from the URL and response position
  pub id: i64,
  pub title: String,
  pub description: String,
  pub content: Option<String>,
  /// Canonical URL, the article's natural identity
  pub url: String,
  pub image: Option<String>,
  pub published_at: DateTime<Utc>,
  pub source_name: String,
  pub source_url: Option<String>,
}

/// One page of articles in upstream order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewsPage {
  pub total_articles: u64,
  pub articles: Vec<Article>,
}

impl NewsPage {
  /// Build a page from stored articles, where the upstream total is unknown.
  pub fn from_articles(articles: Vec<Article>) -> Self {
    Self {
      total_articles: articles.len() as u64,
      articles,
    }
  }
}

/// Derive the numeric id for an article.
///
/// Rolling 31-multiplier hash over the URL's UTF-16 code units in wrapping
/// 32-bit arithmetic, made non-negative, plus the article's position. Matches
/// the ids already stored in the hosted tables.
pub fn article_id(url: &str, position: usize) -> i64 {
  let hash = url.encode_utf16().fold(0i32, |acc, unit| {
    acc
      .wrapping_shl(5)
      .wrapping_sub(acc)
      .wrapping_add(i32::from(unit))
  });
  i64::from(hash).abs() + position as i64
}

// ============================================================================
// Countries and categories
// ============================================================================

/// A country the news API can filter headlines by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Country {
  pub code: &'static str,
  pub name: &'static str,
}

pub const COUNTRIES: &[Country] = &[
  Country { code: "us", name: "United States" },
  Country { code: "gb", name: "United Kingdom" },
  Country { code: "au", name: "Australia" },
  Country { code: "ca", name: "Canada" },
  Country { code: "br", name: "Brazil" },
  Country { code: "cn", name: "China" },
  Country { code: "eg", name: "Egypt" },
  Country { code: "fr", name: "France" },
  Country { code: "de", name: "Germany" },
  Country { code: "gr", name: "Greece" },
  Country { code: "hk", name: "Hong Kong" },
  Country { code: "in", name: "India" },
  Country { code: "ie", name: "Ireland" },
  Country { code: "it", name: "Italy" },
  Country { code: "jp", name: "Japan" },
  Country { code: "nl", name: "Netherlands" },
  Country { code: "no", name: "Norway" },
  Country { code: "pk", name: "Pakistan" },
  Country { code: "pe", name: "Peru" },
  Country { code: "ph", name: "Philippines" },
  Country { code: "pt", name: "Portugal" },
  Country { code: "ro", name: "Romania" },
  Country { code: "ru", name: "Russian Federation" },
  Country { code: "sg", name: "Singapore" },
  Country { code: "es", name: "Spain" },
  Country { code: "se", name: "Sweden" },
  Country { code: "ch", name: "Switzerland" },
  Country { code: "tw", name: "Taiwan" },
  Country { code: "ua", name: "Ukraine" },
];

impl Country {
  /// Look up a supported country by its code (case-insensitive).
  pub fn find(code: &str) -> Option<&'static Country> {
    let code = code.trim().to_lowercase();
    COUNTRIES.iter().find(|c| c.code == code)
  }
}

/// Headline categories offered by the news API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Category {
  #[default]
  General,
  World,
  Nation,
  Business,
  Technology,
  Entertainment,
  Sports,
  Science,
  Health,
}

impl Category {
  pub const ALL: [Category; 9] = [
    Category::General,
    Category::World,
    Category::Nation,
    Category::Business,
    Category::Technology,
    Category::Entertainment,
    Category::Sports,
    Category::Science,
    Category::Health,
  ];

  /// Lower-case name used in API requests and cache keys
  pub fn as_str(&self) -> &'static str {
    match self {
      Category::General => "general",
      Category::World => "world",
      Category::Nation => "nation",
      Category::Business => "business",
      Category::Technology => "technology",
      Category::Entertainment => "entertainment",
      Category::Sports => "sports",
      Category::Science => "science",
      Category::Health => "health",
    }
  }

  /// Tab label
  pub fn label(&self) -> &'static str {
    match self {
      Category::General => "All",
      Category::World => "World",
      Category::Nation => "Nation",
      Category::Business => "Business",
      Category::Technology => "Technology",
      Category::Entertainment => "Entertainment",
      Category::Sports => "Sports",
      Category::Science => "Science",
      Category::Health => "Health",
    }
  }

  fn position(&self) -> usize {
    Self::ALL.iter().position(|c| c == self).unwrap_or(0)
  }

  pub fn next(&self) -> Category {
    Self::ALL[(self.position() + 1) % Self::ALL.len()]
  }

  pub fn previous(&self) -> Category {
    let len = Self::ALL.len();
    Self::ALL[(self.position() + len - 1) % len]
  }
}

impl fmt::Display for Category {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Category {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let wanted = s.trim().to_lowercase();
    if wanted == "all" {
      return Ok(Category::General);
    }
    Category::ALL
      .iter()
      .copied()
      .find(|c| c.as_str() == wanted)
      .ok_or_else(|| format!("unknown category '{}'", s))
  }
}

// ============================================================================
// Request intents
// ============================================================================

/// What the reader asked for. Exactly one of category or query is meaningful.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestIntent {
  TopHeadlines { country: String },
  Category { country: String, category: Category },
  Search { country: String, query: String },
}

impl RequestIntent {
  /// Build the intent for the current selection.
  ///
  /// A non-blank query always wins over the category; the general category
  /// maps to plain top headlines.
  pub fn from_selection(country: &str, category: Category, query: &str) -> Self {
    let country = country.trim().to_lowercase();
    let query = query.trim();
    if !query.is_empty() {
      RequestIntent::Search {
        country,
        query: query.to_string(),
      }
    } else if category == Category::General {
      RequestIntent::TopHeadlines { country }
    } else {
      RequestIntent::Category { country, category }
    }
  }

  /// Cache key for this intent. Searches are never cached.
  pub fn cache_key(&self) -> Option<CacheKey> {
    match self {
      RequestIntent::TopHeadlines { country } => {
        Some(CacheKey::new(country, Category::General.as_str()))
      }
      RequestIntent::Category { country, category } => {
        Some(CacheKey::new(country, category.as_str()))
      }
      RequestIntent::Search { .. } => None,
    }
  }
}

impl fmt::Display for RequestIntent {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RequestIntent::TopHeadlines { country } => write!(f, "top headlines [{}]", country),
      RequestIntent::Category { country, category } => {
        write!(f, "{} [{}]", category, country)
      }
      RequestIntent::Search { country, query } => write!(f, "search '{}' [{}]", query, country),
    }
  }
}

/// A request dispatched by the feed view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRequest {
  pub intent: RequestIntent,
  pub force_refresh: bool,
}

impl FeedRequest {
  pub fn new(intent: RequestIntent) -> Self {
    Self {
      intent,
      force_refresh: false,
    }
  }

  pub fn forced(intent: RequestIntent) -> Self {
    Self {
      intent,
      force_refresh: true,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_article_id_known_values() {
    assert_eq!(article_id("", 0), 0);
    assert_eq!(article_id("a", 0), 97);
    assert_eq!(article_id("ab", 0), 97 * 31 + 98);
    assert_eq!(article_id("ab", 2), 97 * 31 + 98 + 2);
  }

  #[test]
  fn test_article_id_is_stable() {
    let url = "https://example.com/news/2024/some-long-article-slug";
    assert_eq!(article_id(url, 3), article_id(url, 3));
    assert_ne!(article_id(url, 3), article_id(url, 4));
    assert!(article_id(url, 0) >= 0);
  }

  #[test]
  fn test_article_id_matches_stored_ids() {
    // Values produced by the web client for the same URLs
    assert_eq!(
      article_id(
        "https://www.theguardian.com/world/2024/mar/15/example-long-article-slug-for-testing",
        0
      ),
      50547271
    );
    // Overflows 32 bits many times and ends negative before abs
    let repeated = "https://example.com/".repeat(20);
    assert_eq!(article_id(&repeated, 0), 1526957164);
    assert_eq!(article_id(&repeated, 7), 1526957171);
    // Non-ASCII hashes per UTF-16 code unit, surrogate pairs included
    assert_eq!(
      article_id("https://news.example.org/é-ünïcödé/😀", 0),
      128737860
    );
  }

  #[test]
  fn test_intent_from_selection() {
    assert_eq!(
      RequestIntent::from_selection("US", Category::General, ""),
      RequestIntent::TopHeadlines {
        country: "us".into()
      }
    );
    assert_eq!(
      RequestIntent::from_selection("gb", Category::Sports, "  "),
      RequestIntent::Category {
        country: "gb".into(),
        category: Category::Sports
      }
    );
    assert_eq!(
      RequestIntent::from_selection("gb", Category::Sports, " rust "),
      RequestIntent::Search {
        country: "gb".into(),
        query: "rust".into()
      }
    );
  }

  #[test]
  fn test_search_has_no_cache_key() {
    let intent = RequestIntent::from_selection("us", Category::Health, "vaccine");
    assert!(intent.cache_key().is_none());
  }

  #[test]
  fn test_top_headlines_share_general_key() {
    let intent = RequestIntent::from_selection("us", Category::General, "");
    assert_eq!(intent.cache_key(), Some(CacheKey::new("us", "general")));
  }

  #[test]
  fn test_category_cycle() {
    assert_eq!(Category::General.next(), Category::World);
    assert_eq!(Category::Health.next(), Category::General);
    assert_eq!(Category::General.previous(), Category::Health);
  }

  #[test]
  fn test_category_parse() {
    assert_eq!("Sports".parse::<Category>(), Ok(Category::Sports));
    assert_eq!("all".parse::<Category>(), Ok(Category::General));
    assert!("weather".parse::<Category>().is_err());
  }

  #[test]
  fn test_country_lookup() {
    assert_eq!(Country::find("GB").map(|c| c.name), Some("United Kingdom"));
    assert!(Country::find("zz").is_none());
  }
}
