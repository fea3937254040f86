//! Agent actions: the append-only audit log of everything that happens to a
//! thread.
//!
//! An action always belongs to a thread. It may additionally point at an
//! email, a draft response and the user who performed it; each of those
//! pointers is independently optional, and deleting the referenced row clears
//! only that pointer. Rows are never updated or deleted otherwise.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{ActionId, DraftId, EmailId, Error, Result, ThreadId, UserId};

/// Longest textual IP representation accepted (IPv6 with an embedded IPv4
/// tail is 45 characters).
pub const IP_ADDRESS_MAX_LEN: usize = 45;

/// Free-form key/value context attached to an action.
pub type Metadata = Map<String, Value>;

// ─── Kind ────────────────────────────────────────────────────────────────────

/// The closed set of recognised events. There is no free-text escape hatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
  EmailRead,
  EmailForwarded,
  DraftCreated,
  DraftEdited,
  DraftApproved,
  DraftRejected,
  DraftSent,
  ThreadAssigned,
  ThreadStatusChanged,
  ThreadArchived,
}

impl ActionKind {
  pub const ALL: [ActionKind; 10] = [
    Self::EmailRead,
    Self::EmailForwarded,
    Self::DraftCreated,
    Self::DraftEdited,
    Self::DraftApproved,
    Self::DraftRejected,
    Self::DraftSent,
    Self::ThreadAssigned,
    Self::ThreadStatusChanged,
    Self::ThreadArchived,
  ];

  /// The string stored in the `action` column.
  pub const fn as_str(self) -> &'static str {
    match self {
      Self::EmailRead => "email_read",
      Self::EmailForwarded => "email_forwarded",
      Self::DraftCreated => "draft_created",
      Self::DraftEdited => "draft_edited",
      Self::DraftApproved => "draft_approved",
      Self::DraftRejected => "draft_rejected",
      Self::DraftSent => "draft_sent",
      Self::ThreadAssigned => "thread_assigned",
      Self::ThreadStatusChanged => "thread_status_changed",
      Self::ThreadArchived => "thread_archived",
    }
  }
}

impl fmt::Display for ActionKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ActionKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    Self::ALL.into_iter().find(|k| k.as_str() == s).ok_or_else(|| {
      Error::validation("action", format!("unknown action {s:?}"))
    })
  }
}

// ─── Actor ───────────────────────────────────────────────────────────────────

/// Who performed an action. `System` is stored as a NULL actor column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "user_id", rename_all = "snake_case")]
pub enum Actor {
  /// An identified human user.
  Human(UserId),
  /// The automated pipeline, e.g. the draft generator.
  #[default]
  System,
}

impl Actor {
  pub fn user_id(self) -> Option<UserId> {
    match self {
      Self::Human(id) => Some(id),
      Self::System => None,
    }
  }

  pub fn is_system(self) -> bool { matches!(self, Self::System) }
}

impl From<Option<UserId>> for Actor {
  fn from(user: Option<UserId>) -> Self {
    user.map_or(Self::System, Self::Human)
  }
}

// ─── AgentAction ─────────────────────────────────────────────────────────────

/// One immutable audit event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentAction {
  pub id:                ActionId,
  pub thread_id:         ThreadId,
  pub email_id:          Option<EmailId>,
  pub draft_response_id: Option<DraftId>,
  pub actor:             Actor,
  pub action:            ActionKind,
  pub metadata:          Option<Metadata>,
  pub ip_address:        Option<String>,
  /// Server-assigned; callers cannot backdate events.
  pub created_at:        DateTime<Utc>,
}

// ─── NewAgentAction ──────────────────────────────────────────────────────────

/// Input to [`crate::store::TriageStore::log_action`].
/// `id` and `created_at` are always assigned by the store.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAgentAction {
  pub thread_id:         ThreadId,
  pub action:            ActionKind,
  #[serde(default)]
  pub email_id:          Option<EmailId>,
  #[serde(default)]
  pub draft_response_id: Option<DraftId>,
  #[serde(default)]
  pub actor:             Actor,
  /// Must be a JSON object when present.
  #[serde(default)]
  pub metadata:          Option<Value>,
  #[serde(default)]
  pub ip_address:        Option<String>,
}

impl NewAgentAction {
  /// A system-originated action with no optional links.
  pub fn new(thread_id: ThreadId, action: ActionKind) -> Self {
    Self {
      thread_id,
      action,
      email_id: None,
      draft_response_id: None,
      actor: Actor::System,
      metadata: None,
      ip_address: None,
    }
  }

  /// Like [`NewAgentAction::new`], parsing the action from its stored form.
  pub fn parse(thread_id: ThreadId, action: &str) -> Result<Self> {
    Ok(Self::new(thread_id, action.parse()?))
  }

  pub fn email(mut self, email_id: EmailId) -> Self {
    self.email_id = Some(email_id);
    self
  }

  pub fn draft(mut self, draft_id: DraftId) -> Self {
    self.draft_response_id = Some(draft_id);
    self
  }

  pub fn by(mut self, user_id: UserId) -> Self {
    self.actor = Actor::Human(user_id);
    self
  }

  pub fn metadata(mut self, metadata: Value) -> Self {
    self.metadata = Some(metadata);
    self
  }

  pub fn ip_address(mut self, ip: impl Into<String>) -> Self {
    self.ip_address = Some(ip.into());
    self
  }

  /// Check everything that can be checked without the store and return the
  /// metadata as an object.
  pub fn validate(&self) -> Result<Option<Metadata>> {
    if let Some(ip) = &self.ip_address {
      let len = ip.chars().count();
      if len > IP_ADDRESS_MAX_LEN {
        return Err(Error::validation(
          "ip_address",
          format!("{len} characters exceeds the limit of {IP_ADDRESS_MAX_LEN}"),
        ));
      }
    }

    match &self.metadata {
      None | Some(Value::Null) => Ok(None),
      Some(Value::Object(map)) => Ok(Some(map.clone())),
      Some(other) => Err(Error::validation(
        "metadata",
        format!("expected a JSON object, got {}", json_type(other)),
      )),
    }
  }
}

fn json_type(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::ErrorKind;

  #[test]
  fn every_kind_parses_from_its_storage_form() {
    for kind in ActionKind::ALL {
      assert_eq!(kind.as_str().parse::<ActionKind>().unwrap(), kind);
    }
  }

  #[test]
  fn unknown_kind_is_a_validation_error() {
    let err = NewAgentAction::parse(ThreadId(1), "email_deleted").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("email_deleted"));
  }

  #[test]
  fn serde_uses_snake_case_names() {
    let json = serde_json::to_string(&ActionKind::ThreadStatusChanged).unwrap();
    assert_eq!(json, "\"thread_status_changed\"");
    assert!(serde_json::from_str::<ActionKind>("\"EmailRead\"").is_err());
  }

  #[test]
  fn missing_actor_means_system() {
    assert_eq!(Actor::from(None), Actor::System);
    assert_eq!(Actor::from(Some(UserId(4))), Actor::Human(UserId(4)));
    assert_eq!(Actor::Human(UserId(4)).user_id(), Some(UserId(4)));

    let input: NewAgentAction =
      serde_json::from_value(json!({ "thread_id": 1, "action": "draft_created" }))
        .unwrap();
    assert!(input.actor.is_system());
  }

  #[test]
  fn actor_serialises_with_a_kind_tag() {
    let human = serde_json::to_value(Actor::Human(UserId(7))).unwrap();
    assert_eq!(human, json!({ "kind": "human", "user_id": 7 }));
    let system = serde_json::to_value(Actor::System).unwrap();
    assert_eq!(system, json!({ "kind": "system" }));
  }

  #[test]
  fn metadata_must_be_an_object() {
    let ok = NewAgentAction::new(ThreadId(1), ActionKind::EmailRead)
      .metadata(json!({ "device": "desktop" }));
    assert_eq!(ok.validate().unwrap().unwrap()["device"], "desktop");

    let bad = NewAgentAction::new(ThreadId(1), ActionKind::EmailRead)
      .metadata(json!(["not", "an", "object"]));
    assert!(matches!(
      bad.validate(),
      Err(Error::Validation { field: "metadata", .. })
    ));
  }

  #[test]
  fn ip_address_length_is_capped() {
    let ipv6 = "0000:0000:0000:0000:0000:ffff:192.168.100.228";
    assert_eq!(ipv6.len(), 45);
    let ok = NewAgentAction::new(ThreadId(1), ActionKind::EmailRead).ip_address(ipv6);
    assert!(ok.validate().is_ok());

    let bad = NewAgentAction::new(ThreadId(1), ActionKind::EmailRead)
      .ip_address(format!("{ipv6}0"));
    assert!(matches!(
      bad.validate(),
      Err(Error::Validation { field: "ip_address", .. })
    ));
  }
}
