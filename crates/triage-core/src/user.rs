//! Users: the humans who read threads, approve drafts and appear as actors
//! on the action log.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, UserId, error::ensure_text};

pub const EMAIL_MAX_LEN: usize = 255;
pub const NAME_MAX_LEN: usize = 255;

/// Access level of a user. Changing it is an admin action.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  #[default]
  Agent,
  Manager,
  Admin,
}

impl Role {
  pub const ALL: [Role; 3] = [Role::Agent, Role::Manager, Role::Admin];

  /// The string stored in the `role` column.
  pub const fn as_str(self) -> &'static str {
    match self {
      Self::Agent => "agent",
      Self::Manager => "manager",
      Self::Admin => "admin",
    }
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Role {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    Self::ALL
      .into_iter()
      .find(|r| r.as_str() == s)
      .ok_or_else(|| Error::validation("role", format!("unknown role {s:?}")))
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id:         UserId,
  /// Unique across all users; compared byte-for-byte.
  pub email:      String,
  pub name:       String,
  pub role:       Role,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Input to [`crate::store::TriageStore::create_user`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
  pub email: String,
  pub name:  String,
  #[serde(default)]
  pub role:  Role,
}

impl NewUser {
  pub fn new(email: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
    Self { email: email.into(), name: name.into(), role }
  }

  pub fn validate(&self) -> Result<()> {
    ensure_text("email", &self.email, EMAIL_MAX_LEN)?;
    ensure_text("name", &self.name, NAME_MAX_LEN)
  }
}
