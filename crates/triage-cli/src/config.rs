//! Runtime configuration.
//!
//! Settings come from an optional `triage.toml`, overridden by the process
//! environment (`DATABASE_URL`, `APP_ENV`). The binary loads `.env` into the
//! environment before calling [`AppConfig::load`].

use std::{path::PathBuf, str::FromStr};

use config::{Config, ConfigBuilder, Environment, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use triage_store_sqlite::SqliteStore;

use crate::error::ConfigError;

fn default_app_env() -> String { "development".to_string() }

/// Typed view of the merged configuration sources.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Where the SQLite database lives. See [`StorageLocation`] for the
  /// accepted forms.
  pub database_url: Option<String>,
  #[serde(default = "default_app_env")]
  pub app_env:      String,
}

impl AppConfig {
  /// Load from `file` (if it exists) and the environment.
  pub fn load(file: impl Into<PathBuf>) -> Result<Self, ConfigError> {
    let file = file.into();
    let builder = Config::builder()
      .add_source(File::new(&file.to_string_lossy(), FileFormat::Toml).required(false))
      .add_source(Environment::default());
    Self::from_builder(builder)
  }

  /// Build and validate. A configuration without a usable database URL is
  /// rejected here rather than when the store is first opened.
  pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
    let cfg: Self = builder.build()?.try_deserialize()?;
    cfg.storage()?;
    Ok(cfg)
  }

  pub fn storage(&self) -> Result<StorageLocation, ConfigError> {
    self
      .database_url
      .as_deref()
      .ok_or(ConfigError::MissingDatabaseUrl)?
      .parse()
  }

  pub fn is_production(&self) -> bool { self.app_env.eq_ignore_ascii_case("production") }
}

/// A parsed `DATABASE_URL`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
  Memory,
  File(PathBuf),
}

impl StorageLocation {
  pub async fn open(&self) -> triage_store_sqlite::Result<SqliteStore> {
    match self {
      Self::Memory => SqliteStore::open_in_memory().await,
      Self::File(path) => SqliteStore::open(expand_tilde(path)).await,
    }
  }
}

impl FromStr for StorageLocation {
  type Err = ConfigError;

  fn from_str(url: &str) -> Result<Self, Self::Err> {
    let url = url.trim();
    if url.is_empty() {
      return Err(ConfigError::MissingDatabaseUrl);
    }

    let path = if let Some(rest) = url.strip_prefix("sqlite://") {
      rest
    } else if let Some(rest) = url.strip_prefix("sqlite:") {
      rest
    } else if let Some(rest) = url.strip_prefix("file:") {
      rest
    } else if let Some((scheme, _)) = url.split_once("://") {
      return Err(ConfigError::UnsupportedScheme { scheme: scheme.to_string() });
    } else {
      url
    };

    // Connection options after `?` are not used by the store.
    let path = path.split_once('?').map_or(path, |(path, _)| path);

    match path {
      "" => Err(ConfigError::EmptyPath { url: url.to_string() }),
      ":memory:" => Ok(Self::Memory),
      path => Ok(Self::File(PathBuf::from(path))),
    }
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &std::path::Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
