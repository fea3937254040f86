//! Error types for `triage-core`.

use thiserror::Error;

/// Coarse classification shared by every error type in the workspace.
///
/// Callers that only need to decide how to surface a failure (bad input,
/// dangling reference, broken configuration, storage outage) match on this
/// rather than on the concrete error enums.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// A required setting is missing or malformed. Fatal at startup.
  Configuration,
  /// A provided identifier does not resolve to a row, or resolves to a row
  /// that cannot be combined with the others in the request.
  Referential,
  /// A value lies outside its declared enumeration, range or shape.
  Validation,
  /// The storage engine itself failed.
  Storage,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid {field}: {reason}")]
  Validation { field: &'static str, reason: String },

  #[error("{field} {id} does not exist")]
  MissingReference { field: &'static str, id: i64 },

  #[error("{field} {id} belongs to thread {actual}, not thread {expected}")]
  ThreadMismatch {
    field:    &'static str,
    id:       i64,
    expected: i64,
    actual:   i64,
  },

  #[error("{field} {id} answers email {actual}, not email {expected}")]
  EmailMismatch {
    field:    &'static str,
    id:       i64,
    expected: i64,
    actual:   i64,
  },

  #[error("{entity} not found: {id}")]
  NotFound { entity: &'static str, id: i64 },

  #[error("draft cannot move from {from} to {to}")]
  InvalidTransition { from: String, to: String },

  #[error("cannot delete {entity} {id}: {reason}")]
  Restricted {
    entity: &'static str,
    id:     i64,
    reason: String,
  },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
    Self::Validation { field, reason: reason.into() }
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Validation { .. }
      | Self::InvalidTransition { .. }
      | Self::Serialization(_) => ErrorKind::Validation,
      Self::MissingReference { .. }
      | Self::ThreadMismatch { .. }
      | Self::EmailMismatch { .. }
      | Self::NotFound { .. }
      | Self::Restricted { .. } => ErrorKind::Referential,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Reject empty strings and strings longer than the column allows.
/// Lengths are counted in characters, matching the storage engine.
pub(crate) fn ensure_text(
  field: &'static str,
  value: &str,
  max: usize,
) -> Result<()> {
  if value.trim().is_empty() {
    return Err(Error::validation(field, "must not be empty"));
  }
  let len = value.chars().count();
  if len > max {
    return Err(Error::validation(
      field,
      format!("{len} characters exceeds the limit of {max}"),
    ));
  }
  Ok(())
}
