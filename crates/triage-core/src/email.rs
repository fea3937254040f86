//! Emails: individual messages within a thread, either received or composed
//! by an agent.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EmailId, Error, Result, ThreadId, error::ensure_text, thread};

pub const ADDRESS_MAX_LEN: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
  Inbound,
  Outbound,
}

impl Direction {
  pub const ALL: [Direction; 2] = [Self::Inbound, Self::Outbound];

  pub const fn as_str(self) -> &'static str {
    match self {
      Self::Inbound => "inbound",
      Self::Outbound => "outbound",
    }
  }
}

impl fmt::Display for Direction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Direction {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    Self::ALL.into_iter().find(|d| d.as_str() == s).ok_or_else(|| {
      Error::validation("direction", format!("unknown direction {s:?}"))
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
  pub id:         EmailId,
  pub thread_id:  ThreadId,
  pub from_email: String,
  pub to_emails:  Vec<String>,
  pub cc_emails:  Option<Vec<String>>,
  pub bcc_emails: Option<Vec<String>>,
  pub subject:    String,
  pub body_text:  Option<String>,
  pub body_html:  Option<String>,
  pub direction:  Direction,
  /// An unsent outbound message composed by an agent.
  pub is_draft:   bool,
  /// `None` while the email is still a draft; set exactly once.
  pub sent_at:    Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Input to [`crate::store::TriageStore::record_email`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewEmail {
  pub thread_id:  ThreadId,
  pub from_email: String,
  pub to_emails:  Vec<String>,
  #[serde(default)]
  pub cc_emails:  Option<Vec<String>>,
  #[serde(default)]
  pub bcc_emails: Option<Vec<String>>,
  pub subject:    String,
  #[serde(default)]
  pub body_text:  Option<String>,
  #[serde(default)]
  pub body_html:  Option<String>,
  pub direction:  Direction,
  #[serde(default)]
  pub is_draft:   bool,
  #[serde(default)]
  pub sent_at:    Option<DateTime<Utc>>,
}

impl NewEmail {
  /// A received message, stamped as sent at `sent_at`.
  pub fn inbound(
    thread_id: ThreadId,
    from: impl Into<String>,
    to: Vec<String>,
    subject: impl Into<String>,
    sent_at: DateTime<Utc>,
  ) -> Self {
    Self {
      thread_id,
      from_email: from.into(),
      to_emails: to,
      cc_emails: None,
      bcc_emails: None,
      subject: subject.into(),
      body_text: None,
      body_html: None,
      direction: Direction::Inbound,
      is_draft: false,
      sent_at: Some(sent_at),
    }
  }

  /// An outbound message that has not been sent yet.
  pub fn outbound_draft(
    thread_id: ThreadId,
    from: impl Into<String>,
    to: Vec<String>,
    subject: impl Into<String>,
  ) -> Self {
    Self {
      thread_id,
      from_email: from.into(),
      to_emails: to,
      cc_emails: None,
      bcc_emails: None,
      subject: subject.into(),
      body_text: None,
      body_html: None,
      direction: Direction::Outbound,
      is_draft: true,
      sent_at: None,
    }
  }

  pub fn validate(&self) -> Result<()> {
    ensure_text("from_email", &self.from_email, ADDRESS_MAX_LEN)?;
    ensure_text("subject", &self.subject, thread::SUBJECT_MAX_LEN)?;
    if self.is_draft && self.direction == Direction::Inbound {
      return Err(Error::validation("is_draft", "inbound email cannot be a draft"));
    }
    if self.is_draft && self.sent_at.is_some() {
      return Err(Error::validation("sent_at", "a draft has not been sent"));
    }
    Ok(())
  }
}
