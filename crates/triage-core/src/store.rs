//! The `TriageStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `triage-store-sqlite`).
//! Callers receive a store handle explicitly; there is no process-wide
//! connection.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  ActionId, DraftId, EmailId, ThreadId, UserId,
  action::{AgentAction, NewAgentAction},
  draft::{DraftResponse, DraftRevision, DraftStatus, NewDraft},
  email::{Email, NewEmail},
  thread::{NewThread, Thread, ThreadStatus},
  user::{NewUser, Role, User},
};

/// Default page size for timeline reads.
pub const DEFAULT_TIMELINE_LIMIT: usize = 50;

/// Abstraction over a triage store backend.
///
/// Referential rules are part of the contract: deleting a thread that has
/// recorded actions fails, while deleting a user, email or draft that an
/// action points at succeeds and clears only that pointer on the action.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes.
pub trait TriageStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Users ─────────────────────────────────────────────────────────────

  fn create_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: UserId,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn list_users(
    &self,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;

  fn set_user_role(
    &self,
    id: UserId,
    role: Role,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  /// Delete a user. Actions they performed survive with a cleared actor.
  fn delete_user(
    &self,
    id: UserId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Threads ───────────────────────────────────────────────────────────

  fn create_thread(
    &self,
    input: NewThread,
  ) -> impl Future<Output = Result<Thread, Self::Error>> + Send + '_;

  fn get_thread(
    &self,
    id: ThreadId,
  ) -> impl Future<Output = Result<Option<Thread>, Self::Error>> + Send + '_;

  /// List threads, most recently active first.
  fn list_threads(
    &self,
    status: Option<ThreadStatus>,
  ) -> impl Future<Output = Result<Vec<Thread>, Self::Error>> + Send + '_;

  fn set_thread_status(
    &self,
    id: ThreadId,
    status: ThreadStatus,
  ) -> impl Future<Output = Result<Thread, Self::Error>> + Send + '_;

  /// Advance `last_activity_at`. Never moves it backwards.
  fn touch_thread(
    &self,
    id: ThreadId,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Thread, Self::Error>> + Send + '_;

  /// Delete a thread. Fails while anything (in particular an action)
  /// still references it.
  fn delete_thread(
    &self,
    id: ThreadId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Emails ────────────────────────────────────────────────────────────

  fn record_email(
    &self,
    input: NewEmail,
  ) -> impl Future<Output = Result<Email, Self::Error>> + Send + '_;

  fn get_email(
    &self,
    id: EmailId,
  ) -> impl Future<Output = Result<Option<Email>, Self::Error>> + Send + '_;

  /// Emails of a thread in creation order.
  fn list_emails(
    &self,
    thread_id: ThreadId,
  ) -> impl Future<Output = Result<Vec<Email>, Self::Error>> + Send + '_;

  /// Promote a draft email to sent, stamping `sent_at`. Fails if the email
  /// has already been sent.
  fn mark_email_sent(
    &self,
    id: EmailId,
  ) -> impl Future<Output = Result<Email, Self::Error>> + Send + '_;

  fn delete_email(
    &self,
    id: EmailId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Drafts ────────────────────────────────────────────────────────────

  /// Record a first-version draft for an email.
  fn create_draft(
    &self,
    input: NewDraft,
  ) -> impl Future<Output = Result<DraftResponse, Self::Error>> + Send + '_;

  /// Record a revision of `parent`: same email and thread, version + 1.
  fn revise_draft(
    &self,
    parent: DraftId,
    revision: DraftRevision,
  ) -> impl Future<Output = Result<DraftResponse, Self::Error>> + Send + '_;

  fn get_draft(
    &self,
    id: DraftId,
  ) -> impl Future<Output = Result<Option<DraftResponse>, Self::Error>> + Send + '_;

  /// Move a draft along its workflow; see [`DraftStatus::can_transition_to`].
  fn set_draft_status(
    &self,
    id: DraftId,
    status: DraftStatus,
  ) -> impl Future<Output = Result<DraftResponse, Self::Error>> + Send + '_;

  /// The revision chain ending at `id`, newest first, down to the root.
  fn draft_history(
    &self,
    id: DraftId,
  ) -> impl Future<Output = Result<Vec<DraftResponse>, Self::Error>> + Send + '_;

  fn delete_draft(
    &self,
    id: DraftId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Action log (append-only) ─────────────────────────────────────────

  /// Append one action and return the stored row. `id` and `created_at` are
  /// assigned by the store. Resolution of every reference and the insert
  /// happen atomically.
  ///
  /// Does not touch the thread's `last_activity_at`.
  fn log_action(
    &self,
    input: NewAgentAction,
  ) -> impl Future<Output = Result<AgentAction, Self::Error>> + Send + '_;

  fn get_action(
    &self,
    id: ActionId,
  ) -> impl Future<Output = Result<Option<AgentAction>, Self::Error>> + Send + '_;

  /// Most recent actions on a thread, newest first.
  fn thread_timeline(
    &self,
    thread_id: ThreadId,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<AgentAction>, Self::Error>> + Send + '_;

  /// Most recent actions performed by a user, newest first.
  fn actions_by_actor(
    &self,
    user_id: UserId,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<AgentAction>, Self::Error>> + Send + '_;
}
