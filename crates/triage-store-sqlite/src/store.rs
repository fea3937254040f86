//! [`SqliteStore`], the SQLite implementation of [`TriageStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use triage_core::{
  ActionId, DraftId, EmailId, ThreadId, UserId,
  action::{AgentAction, NewAgentAction},
  draft::{DraftResponse, DraftRevision, DraftStatus, NewDraft},
  email::{Email, NewEmail},
  store::TriageStore,
  thread::{NewThread, Thread, ThreadStatus},
  user::{NewUser, Role, User},
};

use crate::{
  Error, Result, queries,
  schema::{DROP_ALL, SCHEMA},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A triage store backed by a single SQLite database.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Remove every row from every table (actions, drafts, emails, threads,
  /// users, in that order) by dropping and recreating the schema.
  ///
  /// This is the only path that removes agent actions; it exists for the
  /// seed routine and for tests.
  pub async fn reset(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        let tx = conn.transaction()?;
        tx.execute_batch(DROP_ALL)?;
        tx.commit()?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    tracing::info!("store reset");
    Ok(())
  }

  /// Run one unit of work from [`queries`] on the connection thread.
  async fn run<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&mut rusqlite::Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }

  /// Execute raw SQL, bypassing every check in [`queries`].
  #[cfg(test)]
  pub(crate) async fn execute_raw(&self, sql: impl Into<String>) -> Result<usize> {
    let sql = sql.into();
    self.run(move |conn| Ok(conn.execute(&sql, [])?)).await
  }

  #[cfg(test)]
  pub(crate) async fn count_rows(&self, table: &'static str) -> Result<i64> {
    self
      .run(move |conn| {
        Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?)
      })
      .await
  }
}

// ─── TriageStore impl ────────────────────────────────────────────────────────

impl TriageStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn create_user(&self, input: NewUser) -> Result<User> {
    input.validate()?;
    self.run(move |conn| queries::insert_user(conn, input)).await
  }

  async fn get_user(&self, id: UserId) -> Result<Option<User>> {
    self.run(move |conn| queries::get_user(conn, id)).await
  }

  async fn list_users(&self) -> Result<Vec<User>> {
    self.run(|conn| queries::list_users(conn)).await
  }

  async fn set_user_role(&self, id: UserId, role: Role) -> Result<User> {
    self.run(move |conn| queries::set_user_role(conn, id, role)).await
  }

  async fn delete_user(&self, id: UserId) -> Result<()> {
    self.run(move |conn| queries::delete_user(conn, id)).await
  }

  // ── Threads ───────────────────────────────────────────────────────────────

  async fn create_thread(&self, input: NewThread) -> Result<Thread> {
    input.validate()?;
    self.run(move |conn| queries::insert_thread(conn, input)).await
  }

  async fn get_thread(&self, id: ThreadId) -> Result<Option<Thread>> {
    self.run(move |conn| queries::get_thread(conn, id)).await
  }

  async fn list_threads(&self, status: Option<ThreadStatus>) -> Result<Vec<Thread>> {
    self.run(move |conn| queries::list_threads(conn, status)).await
  }

  async fn set_thread_status(&self, id: ThreadId, status: ThreadStatus) -> Result<Thread> {
    self.run(move |conn| queries::set_thread_status(conn, id, status)).await
  }

  async fn touch_thread(&self, id: ThreadId, at: DateTime<Utc>) -> Result<Thread> {
    self.run(move |conn| queries::touch_thread(conn, id, at)).await
  }

  async fn delete_thread(&self, id: ThreadId) -> Result<()> {
    self.run(move |conn| queries::delete_thread(conn, id)).await
  }

  // ── Emails ────────────────────────────────────────────────────────────────

  async fn record_email(&self, input: NewEmail) -> Result<Email> {
    input.validate()?;
    self.run(move |conn| queries::insert_email(conn, input)).await
  }

  async fn get_email(&self, id: EmailId) -> Result<Option<Email>> {
    self.run(move |conn| queries::get_email(conn, id)).await
  }

  async fn list_emails(&self, thread_id: ThreadId) -> Result<Vec<Email>> {
    self.run(move |conn| queries::list_emails(conn, thread_id)).await
  }

  async fn mark_email_sent(&self, id: EmailId) -> Result<Email> {
    self.run(move |conn| queries::mark_email_sent(conn, id)).await
  }

  async fn delete_email(&self, id: EmailId) -> Result<()> {
    self.run(move |conn| queries::delete_email(conn, id)).await
  }

  // ── Drafts ────────────────────────────────────────────────────────────────

  async fn create_draft(&self, input: NewDraft) -> Result<DraftResponse> {
    input.validate()?;
    self.run(move |conn| queries::insert_draft(conn, input)).await
  }

  async fn revise_draft(&self, parent: DraftId, revision: DraftRevision) -> Result<DraftResponse> {
    revision.validate()?;
    self.run(move |conn| queries::revise_draft(conn, parent, revision)).await
  }

  async fn get_draft(&self, id: DraftId) -> Result<Option<DraftResponse>> {
    self.run(move |conn| queries::get_draft(conn, id)).await
  }

  async fn set_draft_status(&self, id: DraftId, status: DraftStatus) -> Result<DraftResponse> {
    self.run(move |conn| queries::set_draft_status(conn, id, status)).await
  }

  async fn draft_history(&self, id: DraftId) -> Result<Vec<DraftResponse>> {
    self.run(move |conn| queries::draft_history(conn, id)).await
  }

  async fn delete_draft(&self, id: DraftId) -> Result<()> {
    self.run(move |conn| queries::delete_draft(conn, id)).await
  }

  // ── Action log (append-only) ─────────────────────────────────────────────

  async fn log_action(&self, input: NewAgentAction) -> Result<AgentAction> {
    let thread_id = input.thread_id;
    let kind = input.action;
    let result = self.run(move |conn| queries::insert_action(conn, input)).await;

    match &result {
      Ok(action) => tracing::debug!(
        action_id = %action.id,
        %thread_id,
        action = %kind,
        system = action.actor.is_system(),
        "agent action appended"
      ),
      Err(e) => tracing::warn!(%thread_id, action = %kind, error = %e, "agent action rejected"),
    }
    result
  }

  async fn get_action(&self, id: ActionId) -> Result<Option<AgentAction>> {
    self.run(move |conn| queries::get_action(conn, id)).await
  }

  async fn thread_timeline(&self, thread_id: ThreadId, limit: usize) -> Result<Vec<AgentAction>> {
    self.run(move |conn| queries::thread_timeline(conn, thread_id, limit)).await
  }

  async fn actions_by_actor(&self, user_id: UserId, limit: usize) -> Result<Vec<AgentAction>> {
    self.run(move |conn| queries::actions_by_actor(conn, user_id, limit)).await
  }
}
