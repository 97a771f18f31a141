use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::StoreError;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub github: GithubConfig,
  #[serde(default)]
  pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubConfig {
  /// Repository in `owner/name` form
  pub repo: String,
  #[serde(default = "default_api_url")]
  pub api_url: String,
  /// Page size requested from list endpoints
  #[serde(default = "default_per_page")]
  pub per_page: u32,
  /// Upper bound on pages fetched per listing (unbounded if not set)
  #[serde(default)]
  pub max_pages: Option<u32>,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_api_url() -> String {
  "https://api.github.com".to_string()
}

fn default_per_page() -> u32 {
  100
}

fn default_timeout_secs() -> u64 {
  30
}

/// Labelling, reaction and cache settings of a store instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
  pub base_label: String,
  pub uid_prefix: String,
  /// Label shared by every issue the store manages
  pub store_label: String,
  pub reactions: ReactionsConfig,
  pub cache: CacheConfig,
  pub identity: IdentityConfig,
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      base_label: "stored-object".to_string(),
      uid_prefix: "UID:".to_string(),
      store_label: "gh-store".to_string(),
      reactions: ReactionsConfig::default(),
      cache: CacheConfig::default(),
      identity: IdentityConfig::default(),
    }
  }
}

impl StoreConfig {
  pub fn validate(&self) -> crate::error::Result<()> {
    if self.base_label.is_empty() {
      return Err(StoreError::InvalidConfig("base_label must not be empty".into()));
    }
    if self.uid_prefix.is_empty() {
      return Err(StoreError::InvalidConfig("uid_prefix must not be empty".into()));
    }
    if self.base_label.starts_with(&self.uid_prefix) {
      return Err(StoreError::InvalidConfig(format!(
        "base_label '{}' must not start with uid_prefix '{}'",
        self.base_label, self.uid_prefix
      )));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReactionsConfig {
  /// Marks an update as visible to readers
  pub processed: String,
  /// Marks the comment holding the initial state
  pub initial_state: String,
}

impl Default for ReactionsConfig {
  fn default() -> Self {
    Self {
      processed: "+1".to_string(),
      initial_state: "rocket".to_string(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Maximum number of entries; 0 disables caching
  pub max_size: usize,
  pub ttl_ms: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      max_size: crate::cache::DEFAULT_MAX_SIZE,
      ttl_ms: crate::cache::DEFAULT_TTL.as_millis() as u64,
    }
  }
}

impl CacheConfig {
  pub fn ttl(&self) -> Duration {
    Duration::from_millis(self.ttl_ms)
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
  /// Accept issues that carry only the base label as a match for any ID.
  /// Needed for legacy issues created without an ID label.
  pub allow_base_label_match: bool,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./gh-store.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/gh-store/config.yaml
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
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/gh-store/config.yaml\n\
                 or pass --repo on the command line."
      )),
    }
  }

  /// Configuration for a repository with every store setting at its default.
  pub fn for_repo(repo: &str) -> Self {
    Self {
      github: GithubConfig {
        repo: repo.to_string(),
        api_url: default_api_url(),
        per_page: default_per_page(),
        max_pages: None,
        timeout_secs: default_timeout_secs(),
      },
      store: StoreConfig::default(),
    }
  }

  /// Load the config file from the search path, or fall back to defaults
  /// for `repo` when there is none. A file that exists but fails to parse
  /// is still an error.
  pub fn load_or_repo(repo: &str) -> Result<Self> {
    Self::load_found_or_repo(Self::find_config_file(), repo)
  }

  fn load_found_or_repo(found: Option<PathBuf>, repo: &str) -> Result<Self> {
    match found {
      Some(path) => Self::load_from_path(&path),
      None => Ok(Self::for_repo(repo)),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("gh-store.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("gh-store").join("config.yaml");
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

  pub fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    config.store.validate()?;
    Ok(config)
  }

  /// Get the GitHub token from environment variables.
  ///
  /// Checks GH_STORE_TOKEN first, then GITHUB_TOKEN as fallback. No token
  /// means the store runs in read-only public mode.
  pub fn get_token() -> Option<String> {
    std::env::var("GH_STORE_TOKEN")
      .or_else(|_| std::env::var("GITHUB_TOKEN"))
      .ok()
      .filter(|t| !t.is_empty())
  }
}
