//! Draft responses: reply candidates for an email, versioned and optionally
//! chained to the draft they revise.
//!
//! ```text
//! pending → approved → sent
//!         → rejected
//! ```
//!
//! `rejected` and `sent` are terminal. A revision is a new row whose
//! `parent_draft_id` points at its predecessor and whose `version` is one
//! higher.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{DraftId, EmailId, Error, Result, ThreadId, UserId};

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
  #[default]
  Pending,
  Approved,
  Rejected,
  Sent,
}

impl DraftStatus {
  pub const ALL: [DraftStatus; 4] =
    [Self::Pending, Self::Approved, Self::Rejected, Self::Sent];

  pub const fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Approved => "approved",
      Self::Rejected => "rejected",
      Self::Sent => "sent",
    }
  }

  pub fn is_terminal(self) -> bool { matches!(self, Self::Rejected | Self::Sent) }

  pub fn can_transition_to(self, next: DraftStatus) -> bool {
    matches!(
      (self, next),
      (Self::Pending, Self::Approved)
        | (Self::Pending, Self::Rejected)
        | (Self::Approved, Self::Sent)
    )
  }

  /// Check a transition, returning the target status on success.
  pub fn transition(self, next: DraftStatus) -> Result<DraftStatus> {
    if self.can_transition_to(next) {
      Ok(next)
    } else {
      Err(Error::InvalidTransition {
        from: self.to_string(),
        to:   next.to_string(),
      })
    }
  }
}

impl fmt::Display for DraftStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for DraftStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    Self::ALL.into_iter().find(|d| d.as_str() == s).ok_or_else(|| {
      Error::validation("draft_status", format!("unknown status {s:?}"))
    })
  }
}

// ─── Confidence ──────────────────────────────────────────────────────────────

/// Generator confidence in `[0, 1]`, held at three decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct ConfidenceScore(u16);

impl ConfidenceScore {
  const SCALE: u16 = 1000;

  /// Build from thousandths, e.g. `850` for `0.850`.
  pub fn from_thousandths(thousandths: u16) -> Result<Self> {
    if thousandths > Self::SCALE {
      return Err(Error::validation(
        "confidence_score",
        format!("{thousandths}/1000 is above 1"),
      ));
    }
    Ok(Self(thousandths))
  }

  pub fn thousandths(self) -> u16 { self.0 }

  pub fn as_f64(self) -> f64 { f64::from(self.0) / f64::from(Self::SCALE) }
}

impl TryFrom<f64> for ConfidenceScore {
  type Error = Error;

  fn try_from(value: f64) -> Result<Self> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
      return Err(Error::validation(
        "confidence_score",
        format!("{value} is outside [0, 1]"),
      ));
    }
    Ok(Self((value * f64::from(Self::SCALE)).round() as u16))
  }
}

impl From<ConfidenceScore> for f64 {
  fn from(score: ConfidenceScore) -> f64 { score.as_f64() }
}

impl FromStr for ConfidenceScore {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let value: f64 = s.trim().parse().map_err(|_| {
      Error::validation("confidence_score", format!("{s:?} is not a number"))
    })?;
    Self::try_from(value)
  }
}

impl fmt::Display for ConfidenceScore {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{:03}", self.0 / Self::SCALE, self.0 % Self::SCALE)
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftResponse {
  pub id:                 DraftId,
  pub email_id:           EmailId,
  /// Always the thread of `email_id`.
  pub thread_id:          ThreadId,
  pub generated_content:  String,
  pub status:             DraftStatus,
  /// `None` means the draft was machine-generated.
  pub created_by_user_id: Option<UserId>,
  pub version:            i32,
  pub parent_draft_id:    Option<DraftId>,
  pub confidence_score:   Option<ConfidenceScore>,
  pub created_at:         DateTime<Utc>,
  pub updated_at:         DateTime<Utc>,
}

impl DraftResponse {
  pub fn is_machine_generated(&self) -> bool {
    self.created_by_user_id.is_none()
  }

  /// Check that `self` may be recorded as a revision of `parent`.
  pub fn check_parent(&self, parent: &DraftResponse) -> Result<()> {
    if self.email_id != parent.email_id {
      return Err(Error::EmailMismatch {
        field:    "parent_draft_id",
        id:       parent.id.get(),
        expected: self.email_id.get(),
        actual:   parent.email_id.get(),
      });
    }
    if self.thread_id != parent.thread_id {
      return Err(Error::ThreadMismatch {
        field:    "parent_draft_id",
        id:       parent.id.get(),
        expected: self.thread_id.get(),
        actual:   parent.thread_id.get(),
      });
    }
    if self.version <= parent.version {
      return Err(Error::validation(
        "version",
        format!(
          "version {} does not follow parent version {}",
          self.version, parent.version
        ),
      ));
    }
    Ok(())
  }
}

/// Input to [`crate::store::TriageStore::create_draft`]. Always version 1,
/// status `pending`, no parent.
#[derive(Debug, Clone, Deserialize)]
pub struct NewDraft {
  pub email_id:           EmailId,
  pub thread_id:          ThreadId,
  pub generated_content:  String,
  #[serde(default)]
  pub created_by_user_id: Option<UserId>,
  #[serde(default)]
  pub confidence_score:   Option<ConfidenceScore>,
}

impl NewDraft {
  pub fn validate(&self) -> Result<()> {
    ensure_content(&self.generated_content)
  }
}

/// Input to [`crate::store::TriageStore::revise_draft`]. Email, thread and
/// version are derived from the parent.
#[derive(Debug, Clone, Deserialize)]
pub struct DraftRevision {
  pub generated_content:  String,
  #[serde(default)]
  pub created_by_user_id: Option<UserId>,
  #[serde(default)]
  pub confidence_score:   Option<ConfidenceScore>,
}

impl DraftRevision {
  pub fn validate(&self) -> Result<()> {
    ensure_content(&self.generated_content)
  }
}

fn ensure_content(content: &str) -> Result<()> {
  if content.trim().is_empty() {
    return Err(Error::validation("generated_content", "must not be empty"));
  }
  Ok(())
}
