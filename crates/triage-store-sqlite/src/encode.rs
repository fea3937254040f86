//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`
//! suffix) so that lexical order equals chronological order. Address lists
//! and metadata are stored as compact JSON. Enumerations use their `as_str`
//! form.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use rusqlite::Row;
use triage_core::{
  action::{Actor, AgentAction, Metadata},
  draft::DraftResponse,
  email::Email,
  thread::Thread,
  user::User,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// Truncate to the precision the store keeps, so a returned record compares
/// equal to the same record read back later.
pub fn stored_precision(dt: DateTime<Utc>) -> DateTime<Utc> { dt.trunc_subsecs(6) }

/// The store's clock.
pub fn now() -> DateTime<Utc> { stored_precision(Utc::now()) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(column: &'static str, s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode { column, reason: e.to_string() })
}

fn decode_opt_dt(column: &'static str, s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(|s| decode_dt(column, s)).transpose()
}

// ─── Parsed columns ──────────────────────────────────────────────────────────

/// Decode a text column through the domain type's `FromStr`: enumerations
/// and confidence scores.
pub fn decode_parsed<T>(column: &'static str, s: &str) -> Result<T>
where
  T: FromStr<Err = triage_core::Error>,
{
  s.parse()
    .map_err(|e: triage_core::Error| Error::Decode { column, reason: e.to_string() })
}

// ─── Address lists ───────────────────────────────────────────────────────────

pub fn encode_list(list: &[String]) -> Result<String> { Ok(serde_json::to_string(list)?) }

pub fn encode_opt_list(list: Option<&[String]>) -> Result<Option<String>> {
  list.map(encode_list).transpose()
}

fn decode_list(s: &str) -> Result<Vec<String>> { Ok(serde_json::from_str(s)?) }

fn decode_opt_list(s: Option<&str>) -> Result<Option<Vec<String>>> {
  s.map(decode_list).transpose()
}

// ─── Metadata ────────────────────────────────────────────────────────────────

pub fn encode_metadata(metadata: Option<&Metadata>) -> Result<Option<String>> {
  Ok(metadata.map(serde_json::to_string).transpose()?)
}

fn decode_metadata(s: Option<&str>) -> Result<Option<Metadata>> {
  Ok(s.map(serde_json::from_str).transpose()?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// A raw row read with one of the `*_COLUMNS` lists below, in that order.
pub trait FromRow: Sized {
  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

pub const USER_COLUMNS: &str = "id, email, name, role, created_at, updated_at";

pub struct RawUser {
  pub id:         i64,
  pub email:      String,
  pub name:       String,
  pub role:       String,
  pub created_at: String,
  pub updated_at: String,
}

impl FromRow for RawUser {
  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      email:      row.get(1)?,
      name:       row.get(2)?,
      role:       row.get(3)?,
      created_at: row.get(4)?,
      updated_at: row.get(5)?,
    })
  }
}

impl RawUser {
  pub fn into_user(self) -> Result<User> {
    Ok(User {
      id:         self.id.into(),
      email:      self.email,
      name:       self.name,
      role:       decode_parsed("users.role", &self.role)?,
      created_at: decode_dt("users.created_at", &self.created_at)?,
      updated_at: decode_dt("users.updated_at", &self.updated_at)?,
    })
  }
}

pub const THREAD_COLUMNS: &str =
  "id, subject, participant_emails, status, last_activity_at, created_at, updated_at";

pub struct RawThread {
  pub id:                 i64,
  pub subject:            String,
  pub participant_emails: String,
  pub status:             String,
  pub last_activity_at:   String,
  pub created_at:         String,
  pub updated_at:         String,
}

impl FromRow for RawThread {
  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                 row.get(0)?,
      subject:            row.get(1)?,
      participant_emails: row.get(2)?,
      status:             row.get(3)?,
      last_activity_at:   row.get(4)?,
      created_at:         row.get(5)?,
      updated_at:         row.get(6)?,
    })
  }
}

impl RawThread {
  pub fn into_thread(self) -> Result<Thread> {
    Ok(Thread {
      id:                 self.id.into(),
      subject:            self.subject,
      participant_emails: decode_list(&self.participant_emails)?,
      status:             decode_parsed("threads.status", &self.status)?,
      last_activity_at:   decode_dt("threads.last_activity_at", &self.last_activity_at)?,
      created_at:         decode_dt("threads.created_at", &self.created_at)?,
      updated_at:         decode_dt("threads.updated_at", &self.updated_at)?,
    })
  }
}

pub const EMAIL_COLUMNS: &str = "id, thread_id, from_email, to_emails, cc_emails, bcc_emails, \
   subject, body_text, body_html, direction, is_draft, sent_at, created_at, updated_at";

pub struct RawEmail {
  pub id:         i64,
  pub thread_id:  i64,
  pub from_email: String,
  pub to_emails:  String,
  pub cc_emails:  Option<String>,
  pub bcc_emails: Option<String>,
  pub subject:    String,
  pub body_text:  Option<String>,
  pub body_html:  Option<String>,
  pub direction:  String,
  pub is_draft:   bool,
  pub sent_at:    Option<String>,
  pub created_at: String,
  pub updated_at: String,
}

impl FromRow for RawEmail {
  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      thread_id:  row.get(1)?,
      from_email: row.get(2)?,
      to_emails:  row.get(3)?,
      cc_emails:  row.get(4)?,
      bcc_emails: row.get(5)?,
      subject:    row.get(6)?,
      body_text:  row.get(7)?,
      body_html:  row.get(8)?,
      direction:  row.get(9)?,
      is_draft:   row.get(10)?,
      sent_at:    row.get(11)?,
      created_at: row.get(12)?,
      updated_at: row.get(13)?,
    })
  }
}

impl RawEmail {
  pub fn into_email(self) -> Result<Email> {
    Ok(Email {
      id:         self.id.into(),
      thread_id:  self.thread_id.into(),
      from_email: self.from_email,
      to_emails:  decode_list(&self.to_emails)?,
      cc_emails:  decode_opt_list(self.cc_emails.as_deref())?,
      bcc_emails: decode_opt_list(self.bcc_emails.as_deref())?,
      subject:    self.subject,
      body_text:  self.body_text,
      body_html:  self.body_html,
      direction:  decode_parsed("emails.direction", &self.direction)?,
      is_draft:   self.is_draft,
      sent_at:    decode_opt_dt("emails.sent_at", self.sent_at.as_deref())?,
      created_at: decode_dt("emails.created_at", &self.created_at)?,
      updated_at: decode_dt("emails.updated_at", &self.updated_at)?,
    })
  }
}

pub const DRAFT_COLUMNS: &str = "id, email_id, thread_id, generated_content, status, \
   created_by_user_id, version, parent_draft_id, confidence_score, created_at, updated_at";

pub struct RawDraft {
  pub id:                 i64,
  pub email_id:           i64,
  pub thread_id:          i64,
  pub generated_content:  String,
  pub status:             String,
  pub created_by_user_id: Option<i64>,
  pub version:            i32,
  pub parent_draft_id:    Option<i64>,
  pub confidence_score:   Option<String>,
  pub created_at:         String,
  pub updated_at:         String,
}

impl FromRow for RawDraft {
  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                 row.get(0)?,
      email_id:           row.get(1)?,
      thread_id:          row.get(2)?,
      generated_content:  row.get(3)?,
      status:             row.get(4)?,
      created_by_user_id: row.get(5)?,
      version:            row.get(6)?,
      parent_draft_id:    row.get(7)?,
      confidence_score:   row.get(8)?,
      created_at:         row.get(9)?,
      updated_at:         row.get(10)?,
    })
  }
}

impl RawDraft {
  pub fn into_draft(self) -> Result<DraftResponse> {
    let confidence_score = self
      .confidence_score
      .as_deref()
      .map(|s| decode_parsed("draft_responses.confidence_score", s))
      .transpose()?;

    Ok(DraftResponse {
      id: self.id.into(),
      email_id: self.email_id.into(),
      thread_id: self.thread_id.into(),
      generated_content: self.generated_content,
      status: decode_parsed("draft_responses.status", &self.status)?,
      created_by_user_id: self.created_by_user_id.map(Into::into),
      version: self.version,
      parent_draft_id: self.parent_draft_id.map(Into::into),
      confidence_score,
      created_at: decode_dt("draft_responses.created_at", &self.created_at)?,
      updated_at: decode_dt("draft_responses.updated_at", &self.updated_at)?,
    })
  }
}

pub const ACTION_COLUMNS: &str = "id, thread_id, email_id, draft_response_id, actor_user_id, \
   action, metadata, ip_address, created_at";

pub struct RawAction {
  pub id:                i64,
  pub thread_id:         i64,
  pub email_id:          Option<i64>,
  pub draft_response_id: Option<i64>,
  pub actor_user_id:     Option<i64>,
  pub action:            String,
  pub metadata:          Option<String>,
  pub ip_address:        Option<String>,
  pub created_at:        String,
}

impl FromRow for RawAction {
  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                row.get(0)?,
      thread_id:         row.get(1)?,
      email_id:          row.get(2)?,
      draft_response_id: row.get(3)?,
      actor_user_id:     row.get(4)?,
      action:            row.get(5)?,
      metadata:          row.get(6)?,
      ip_address:        row.get(7)?,
      created_at:        row.get(8)?,
    })
  }
}

impl RawAction {
  pub fn into_action(self) -> Result<AgentAction> {
    Ok(AgentAction {
      id:                self.id.into(),
      thread_id:         self.thread_id.into(),
      email_id:          self.email_id.map(Into::into),
      draft_response_id: self.draft_response_id.map(Into::into),
      actor:             Actor::from(self.actor_user_id.map(Into::into)),
      action:            decode_parsed("agent_actions.action", &self.action)?,
      metadata:          decode_metadata(self.metadata.as_deref())?,
      ip_address:        self.ip_address,
      created_at:        decode_dt("agent_actions.created_at", &self.created_at)?,
    })
  }
}
