//! Row identifiers.
//!
//! Every table uses an auto-incrementing integer key. Each gets its own
//! newtype so a thread id can never be passed where an email id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! row_id {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(
      Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
      Deserialize,
    )]
    #[serde(transparent)]
    pub struct $name(pub i64);

    impl $name {
      pub fn get(self) -> i64 { self.0 }
    }

    impl From<i64> for $name {
      fn from(raw: i64) -> Self { Self(raw) }
    }

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
      }
    }
  };
}

row_id!(
  /// Primary key of `users`.
  UserId
);
row_id!(
  /// Primary key of `threads`.
  ThreadId
);
row_id!(
  /// Primary key of `emails`.
  EmailId
);
row_id!(
  /// Primary key of `draft_responses`.
  DraftId
);
row_id!(
  /// Primary key of `agent_actions`.
  ActionId
);
