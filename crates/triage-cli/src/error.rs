use thiserror::Error;
use triage_core::ErrorKind;

/// Startup failures. All of them are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("DATABASE_URL is not set")]
  MissingDatabaseUrl,

  #[error("DATABASE_URL {url:?} names no database file")]
  EmptyPath { url: String },

  #[error("unsupported DATABASE_URL scheme {scheme:?}; expected sqlite")]
  UnsupportedScheme { scheme: String },

  #[error("failed to load configuration: {0}")]
  Load(#[from] config::ConfigError),
}

impl ConfigError {
  pub fn kind(&self) -> ErrorKind { ErrorKind::Configuration }
}
