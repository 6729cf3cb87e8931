use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::fetch::FetchPolicy;
use crate::store::{MemoryStore, SqliteStore, Store};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub store: StoreConfig,
  pub fetch: FetchConfig,
  pub log: LogConfig,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
  /// Process-local, nothing survives the process
  Memory,
  /// SQLite database file
  #[default]
  Sqlite,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
  pub backend: StoreBackend,
  /// Database path for the sqlite backend (defaults to the data directory)
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
  /// Seconds fetched content is served from cache
  pub ttl_secs: u64,
  /// Allow only one fetch in flight per resource
  pub single_flight: bool,
  /// Request timeout for the HTTP client; none by default
  pub timeout_secs: Option<u64>,
  pub user_agent: String,
}

impl Default for FetchConfig {
  fn default() -> Self {
    Self {
      ttl_secs: 10,
      single_flight: false,
      timeout_secs: None,
      user_agent: format!("replaykv/{}", env!("CARGO_PKG_VERSION")),
    }
  }
}

impl FetchConfig {
  pub fn ttl(&self) -> Duration {
    Duration::from_secs(self.ttl_secs)
  }

  pub fn policy(&self) -> FetchPolicy {
    if self.single_flight {
      FetchPolicy::SingleFlight
    } else {
      FetchPolicy::Concurrent
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
  /// Filter used when RUST_LOG is unset
  pub level: String,
  /// Write logs to this file instead of stderr
  pub file: Option<PathBuf>,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      file: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./replaykv.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/replaykv/config.yaml
  ///
  /// Falls back to defaults when no file is found.
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
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("replaykv.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("replaykv").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Open the configured store backend.
  pub fn open_store(&self) -> Result<Arc<dyn Store>> {
    match self.store.backend {
      StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
      StoreBackend::Sqlite => {
        let path = match &self.store.path {
          Some(path) => path.clone(),
          None => SqliteStore::default_path()
            .ok_or_else(|| eyre!("Could not determine data directory"))?,
        };
        Ok(Arc::new(SqliteStore::open(&path)?))
      }
    }
  }
}
