//! Threads: a conversation grouping one or more emails.
//!
//! Threads are never hard-deleted while anything points at them. Their only
//! mutations are status changes and the `last_activity_at` touch, which is the
//! responsibility of whoever orchestrates an end-to-end flow (it is not a
//! side effect of logging an action).

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, ThreadId, error::ensure_text};

pub const SUBJECT_MAX_LEN: usize = 500;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
  #[default]
  Active,
  Closed,
  NeedsAttention,
}

impl ThreadStatus {
  pub const ALL: [ThreadStatus; 3] =
    [Self::Active, Self::Closed, Self::NeedsAttention];

  pub const fn as_str(self) -> &'static str {
    match self {
      Self::Active => "active",
      Self::Closed => "closed",
      Self::NeedsAttention => "needs_attention",
    }
  }
}

impl fmt::Display for ThreadStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ThreadStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    Self::ALL.into_iter().find(|t| t.as_str() == s).ok_or_else(|| {
      Error::validation("thread_status", format!("unknown status {s:?}"))
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
  pub id:                 ThreadId,
  pub subject:            String,
  /// Ordered as supplied; duplicates are kept.
  pub participant_emails: Vec<String>,
  pub status:             ThreadStatus,
  /// Advanced whenever a new email or action touches the thread.
  pub last_activity_at:   DateTime<Utc>,
  pub created_at:         DateTime<Utc>,
  pub updated_at:         DateTime<Utc>,
}

/// Input to [`crate::store::TriageStore::create_thread`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewThread {
  pub subject:            String,
  #[serde(default)]
  pub participant_emails: Vec<String>,
  #[serde(default)]
  pub status:             ThreadStatus,
  /// Defaults to the creation time when omitted.
  #[serde(default)]
  pub last_activity_at:   Option<DateTime<Utc>>,
}

impl NewThread {
  pub fn new(subject: impl Into<String>) -> Self {
    Self {
      subject:            subject.into(),
      participant_emails: Vec::new(),
      status:             ThreadStatus::default(),
      last_activity_at:   None,
    }
  }

  pub fn validate(&self) -> Result<()> {
    ensure_text("subject", &self.subject, SUBJECT_MAX_LEN)
  }
}
