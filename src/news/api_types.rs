//! Serde-deserializable types matching news API responses.
//!
//! These types are separate from domain types so missing or null upstream
//! fields are absorbed here and domain types stay focused on the reader.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::types::{article_id, Article, NewsPage};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiNewsResponse {
  #[serde(default)]
  pub total_articles: u64,
  #[serde(default)]
  pub articles: Vec<ApiArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiArticle {
  #[serde(default)]
  pub title: String,
  pub description: Option<String>,
  pub content: Option<String>,
  pub url: String,
  pub image: Option<String>,
  pub published_at: DateTime<Utc>,
  #[serde(default)]
  pub source: ApiSource,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiSource {
  #[serde(default)]
  pub name: String,
  pub url: Option<String>,
}

/// Body returned by the credential endpoint: either `["k1", "k2"]` or
/// `{"keys": ["k1", "k2"]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiKeysResponse {
  Bare(Vec<String>),
  Wrapped { keys: Vec<String> },
}

impl ApiKeysResponse {
  pub fn into_keys(self) -> Vec<String> {
    match self {
      ApiKeysResponse::Bare(keys) | ApiKeysResponse::Wrapped { keys } => keys,
    }
  }
}

fn non_blank(value: Option<String>) -> Option<String> {
  value.filter(|v| !v.trim().is_empty())
}

impl ApiArticle {
  pub fn into_article(self, position: usize) -> Article {
    Article {
      id: article_id(&self.url, position),
      title: self.title,
      description: self.description.unwrap_or_default(),
      content: non_blank(self.content),
      image: non_blank(self.image),
      url: self.url,
      published_at: self.published_at,
      source_name: self.source.name,
      source_url: non_blank(self.source.url),
    }
  }
}

impl From<ApiNewsResponse> for NewsPage {
  fn from(response: ApiNewsResponse) -> Self {
    NewsPage {
      total_articles: response.total_articles,
      articles: response
        .articles
        .into_iter()
        .enumerate()
        .map(|(position, article)| article.into_article(position))
        .collect(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const SAMPLE: &str = r#"{
    "totalArticles": 54904,
    "articles": [
      {
        "title": "First",
        "description": "One",
        "content": "Body one",
        "url": "https://example.com/1",
        "image": "https://example.com/1.jpg",
        "publishedAt": "2024-05-01T12:00:00Z",
        "source": { "name": "Example", "url": "https://example.com" }
      },
      {
        "title": "Second",
        "description": null,
        "content": "",
        "url": "https://example.com/2",
        "image": null,
        "publishedAt": "2024-05-01T11:00:00Z",
        "source": { "name": "Other" }
      }
    ]
  }"#;

  #[test]
  fn test_parse_response_keeps_order() {
    let response: ApiNewsResponse = serde_json::from_str(SAMPLE).unwrap();
    let page = NewsPage::from(response);

    assert_eq!(page.total_articles, 54904);
    assert_eq!(page.articles.len(), 2);
    assert_eq!(page.articles[0].title, "First");
    assert_eq!(page.articles[1].title, "Second");
    assert_eq!(page.articles[0].id, article_id("https://example.com/1", 0));
    assert_eq!(page.articles[1].id, article_id("https://example.com/2", 1));
  }

  #[test]
  fn test_missing_fields_normalize_to_none() {
    let response: ApiNewsResponse = serde_json::from_str(SAMPLE).unwrap();
    let page = NewsPage::from(response);
    let second = &page.articles[1];

    assert_eq!(second.description, "");
    assert_eq!(second.content, None);
    assert_eq!(second.image, None);
    assert_eq!(second.source_url, None);
    assert_eq!(second.source_name, "Other");
  }

  #[test]
  fn test_keys_response_shapes() {
    let bare: ApiKeysResponse = serde_json::from_str(r#"["a", "b"]"#).unwrap();
    assert_eq!(bare.into_keys(), vec!["a", "b"]);

    let wrapped: ApiKeysResponse = serde_json::from_str(r#"{"keys": ["c"]}"#).unwrap();
    assert_eq!(wrapped.into_keys(), vec!["c"]);
  }
}
