//! Error type for `triage-store-sqlite`.

use thiserror::Error;
use triage_core::ErrorKind;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] triage_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// A stored value could not be turned back into its domain type.
  #[error("cannot decode {column}: {reason}")]
  Decode { column: &'static str, reason: String },
}

impl Error {
  /// Domain errors keep their own classification; everything raised by
  /// SQLite or by decoding a stored row is a storage failure.
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Core(e) => e.kind(),
      Self::Database(_) | Self::Sqlite(_) | Self::Json(_) | Self::Decode { .. } => {
        ErrorKind::Storage
      }
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
