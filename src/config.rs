use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::cache::{ArticleStore, NoopStorage, SqliteStorage};
use crate::db::Database;
use crate::news::keys::{EndpointCredentials, EnvCredentials, StaticCredentials};
use crate::news::types::{Category, Country};
use crate::news::CredentialSource;

const DEFAULT_BASE_URL: &str = "https://gnews.io/api/v4";

/// Environment variable holding the bearer token for the key endpoint
const SECRETS_TOKEN_VAR: &str = "NEWSDECK_SECRETS_TOKEN";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  #[serde(deserialize_with = "deserialize_country")]
  pub default_country: String,
  #[serde(deserialize_with = "deserialize_category")]
  pub default_category: Category,
  /// Custom title for header
  pub title: Option<String>,
  pub news: NewsConfig,
  pub credentials: CredentialsConfig,
  pub cache: CacheConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      default_country: "us".to_string(),
      default_category: Category::General,
      title: None,
      news: NewsConfig::default(),
      credentials: CredentialsConfig::default(),
      cache: CacheConfig::default(),
    }
  }
}

fn deserialize_country<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let code = String::deserialize(deserializer)?;
  Country::find(&code)
    .map(|c| c.code.to_string())
    .ok_or_else(|| serde::de::Error::custom(format!("unsupported country '{}'", code)))
}

fn deserialize_category<'de, D>(deserializer: D) -> Result<Category, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let name = String::deserialize(deserializer)?;
  name.parse().map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
  pub base_url: String,
  /// Articles requested per call
  pub max_articles: u32,
  pub timeout_secs: u64,
}

impl Default for NewsConfig {
  fn default() -> Self {
    Self {
      base_url: DEFAULT_BASE_URL.to_string(),
      max_articles: 10,
      timeout_secs: 15,
    }
  }
}

/// Where API keys come from
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum CredentialsConfig {
  /// NEWSDECK_API_KEYS or GNEWS_API_KEY_<n>
  #[default]
  Env,
  /// A secrets function returning the key list as JSON
  Endpoint { url: String },
  /// Keys written into the config file
  Static { keys: Vec<String> },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub enabled: bool,
  /// Database location (defaults to the data directory)
  pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      path: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./newsdeck.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/newsdeck/config.yaml
  ///
  /// Built-in defaults are used when no file exists.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => {
        info!("no config file found, using defaults");
        Ok(Self::default())
      }
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("newsdeck.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("newsdeck").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// Header title
  pub fn title(&self) -> &str {
    self.title.as_deref().unwrap_or("newsdeck")
  }

  /// Build the configured credential source.
  pub fn credential_source(&self) -> Result<Box<dyn CredentialSource>> {
    let source: Box<dyn CredentialSource> = match &self.credentials {
      CredentialsConfig::Env => Box::new(EnvCredentials),
      CredentialsConfig::Static { keys } => Box::new(StaticCredentials::new(keys.clone())),
      CredentialsConfig::Endpoint { url } => {
        let url = url::Url::parse(url)
          .map_err(|e| eyre!("Invalid credentials endpoint '{}': {}", url, e))?;
        let http = reqwest::Client::builder()
          .timeout(std::time::Duration::from_secs(self.news.timeout_secs))
          .build()
          .map_err(|e| eyre!("Failed to build HTTP client: {}", e))?;
        let bearer = std::env::var(SECRETS_TOKEN_VAR).ok();
        Box::new(EndpointCredentials::new(http, url, bearer))
      }
    };
    Ok(source)
  }

  /// Build the article store on top of the shared database.
  pub fn article_store(&self, db: Arc<Database>) -> Box<dyn ArticleStore> {
    if self.cache.enabled {
      Box::new(SqliteStorage::new(db))
    } else {
      info!("article cache disabled");
      Box::new(NoopStorage)
    }
  }
}

/// Directory for the database and log files.
pub fn data_dir() -> Result<PathBuf> {
  let dir = dirs::data_dir()
    .ok_or_else(|| eyre!("Could not determine data directory"))?
    .join("newsdeck");

  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create data directory {}: {}", dir.display(), e))?;

  Ok(dir)
}
