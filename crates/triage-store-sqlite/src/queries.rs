//! Synchronous statement bodies run on the connection thread.
//!
//! Each function is one unit of work for [`crate::SqliteStore`]. Writes that
//! need to resolve references first open a transaction so the check and the
//! write commit together.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _, params};
use triage_core::{
  ActionId, DraftId, EmailId, ThreadId, UserId,
  action::{AgentAction, NewAgentAction},
  draft::{DraftResponse, DraftRevision, DraftStatus, NewDraft},
  email::{Email, NewEmail},
  thread::{NewThread, Thread, ThreadStatus},
  user::{NewUser, Role, User},
};

use crate::{
  Result,
  encode::{
    ACTION_COLUMNS, DRAFT_COLUMNS, EMAIL_COLUMNS, FromRow, RawAction, RawDraft,
    RawEmail, RawThread, RawUser, THREAD_COLUMNS, USER_COLUMNS, encode_dt,
    encode_list, encode_metadata, encode_opt_list, now, stored_precision,
  },
};

type CoreError = triage_core::Error;

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn query_one<T: FromRow>(conn: &Connection, sql: &str, id: i64) -> Result<Option<T>> {
  Ok(conn.query_row(sql, params![id], T::from_row).optional()?)
}

fn query_many<T: FromRow>(
  conn: &Connection,
  sql: &str,
  params: impl rusqlite::Params,
) -> Result<Vec<T>> {
  let mut stmt = conn.prepare(sql)?;
  let rows = stmt
    .query_map(params, T::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

fn exists(conn: &Connection, table: &str, id: i64) -> Result<bool> {
  Ok(
    conn
      .query_row(
        &format!("SELECT 1 FROM {table} WHERE id = ?1"),
        params![id],
        |_| Ok(true),
      )
      .optional()?
      .unwrap_or(false),
  )
}

/// The thread a row of `table` (emails or draft_responses) belongs to.
fn owning_thread(conn: &Connection, table: &str, id: i64) -> Result<Option<i64>> {
  Ok(
    conn
      .query_row(
        &format!("SELECT thread_id FROM {table} WHERE id = ?1"),
        params![id],
        |r| r.get(0),
      )
      .optional()?,
  )
}

/// Resolve an optional email or draft link and check it belongs to `thread`.
fn check_thread_link(
  conn: &Connection,
  field: &'static str,
  table: &str,
  id: i64,
  thread: i64,
) -> Result<()> {
  match owning_thread(conn, table, id)? {
    None => Err(CoreError::MissingReference { field, id }.into()),
    Some(actual) if actual != thread => Err(
      CoreError::ThreadMismatch { field, id, expected: thread, actual }.into(),
    ),
    Some(_) => Ok(()),
  }
}

fn require(conn: &Connection, field: &'static str, table: &str, id: i64) -> Result<()> {
  if exists(conn, table, id)? {
    Ok(())
  } else {
    Err(CoreError::MissingReference { field, id }.into())
  }
}

fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
  matches!(
    err,
    rusqlite::Error::SqliteFailure(e, _)
      if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
  )
}

/// Delete one row by id, translating a blocked delete into
/// [`CoreError::Restricted`] and a missing row into [`CoreError::NotFound`].
fn delete_row(
  conn: &Connection,
  table: &str,
  entity: &'static str,
  id: i64,
  blocked_by: &str,
) -> Result<()> {
  match conn.execute(&format!("DELETE FROM {table} WHERE id = ?1"), params![id]) {
    Ok(0) => Err(CoreError::NotFound { entity, id }.into()),
    Ok(_) => Ok(()),
    Err(e) if is_foreign_key_violation(&e) => Err(
      CoreError::Restricted { entity, id, reason: format!("{blocked_by} still reference it") }
        .into(),
    ),
    Err(e) => Err(e.into()),
  }
}

// ─── Users ───────────────────────────────────────────────────────────────────

pub fn get_user(conn: &Connection, id: UserId) -> Result<Option<User>> {
  query_one::<RawUser>(
    conn,
    &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
    id.get(),
  )?
  .map(RawUser::into_user)
  .transpose()
}

fn require_user(conn: &Connection, id: UserId) -> Result<User> {
  get_user(conn, id)?
    .ok_or_else(|| CoreError::NotFound { entity: "user", id: id.get() }.into())
}

pub fn insert_user(conn: &Connection, input: NewUser) -> Result<User> {
  let at = now();
  conn.execute(
    "INSERT INTO users (email, name, role, created_at, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?4)",
    params![input.email, input.name, input.role.as_str(), encode_dt(at)],
  )?;

  Ok(User {
    id:         conn.last_insert_rowid().into(),
    email:      input.email,
    name:       input.name,
    role:       input.role,
    created_at: at,
    updated_at: at,
  })
}

pub fn list_users(conn: &Connection) -> Result<Vec<User>> {
  query_many::<RawUser>(conn, &format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"), [])?
    .into_iter()
    .map(RawUser::into_user)
    .collect()
}

pub fn set_user_role(conn: &mut Connection, id: UserId, role: Role) -> Result<User> {
  let tx = conn.transaction()?;
  tx.execute(
    "UPDATE users SET role = ?2, updated_at = ?3 WHERE id = ?1",
    params![id.get(), role.as_str(), encode_dt(now())],
  )?;
  let user = require_user(&tx, id)?;
  tx.commit()?;
  Ok(user)
}

pub fn delete_user(conn: &Connection, id: UserId) -> Result<()> {
  delete_row(conn, "users", "user", id.get(), "draft responses")
}

// ─── Threads ─────────────────────────────────────────────────────────────────

pub fn get_thread(conn: &Connection, id: ThreadId) -> Result<Option<Thread>> {
  query_one::<RawThread>(
    conn,
    &format!("SELECT {THREAD_COLUMNS} FROM threads WHERE id = ?1"),
    id.get(),
  )?
  .map(RawThread::into_thread)
  .transpose()
}

fn require_thread(conn: &Connection, id: ThreadId) -> Result<Thread> {
  get_thread(conn, id)?
    .ok_or_else(|| CoreError::NotFound { entity: "thread", id: id.get() }.into())
}

pub fn insert_thread(conn: &Connection, input: NewThread) -> Result<Thread> {
  let at = now();
  let last_activity_at = input.last_activity_at.map_or(at, stored_precision);

  conn.execute(
    "INSERT INTO threads (
       subject, participant_emails, status, last_activity_at, created_at, updated_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
    params![
      input.subject,
      encode_list(&input.participant_emails)?,
      input.status.as_str(),
      encode_dt(last_activity_at),
      encode_dt(at),
    ],
  )?;

  Ok(Thread {
    id: conn.last_insert_rowid().into(),
    subject: input.subject,
    participant_emails: input.participant_emails,
    status: input.status,
    last_activity_at,
    created_at: at,
    updated_at: at,
  })
}

pub fn list_threads(conn: &Connection, status: Option<ThreadStatus>) -> Result<Vec<Thread>> {
  let raws = match status {
    Some(s) => query_many::<RawThread>(
      conn,
      &format!(
        "SELECT {THREAD_COLUMNS} FROM threads WHERE status = ?1
         ORDER BY last_activity_at DESC, id DESC"
      ),
      params![s.as_str()],
    )?,
    None => query_many::<RawThread>(
      conn,
      &format!("SELECT {THREAD_COLUMNS} FROM threads ORDER BY last_activity_at DESC, id DESC"),
      [],
    )?,
  };
  raws.into_iter().map(RawThread::into_thread).collect()
}

pub fn set_thread_status(
  conn: &mut Connection,
  id: ThreadId,
  status: ThreadStatus,
) -> Result<Thread> {
  let tx = conn.transaction()?;
  tx.execute(
    "UPDATE threads SET status = ?2, updated_at = ?3 WHERE id = ?1",
    params![id.get(), status.as_str(), encode_dt(now())],
  )?;
  let thread = require_thread(&tx, id)?;
  tx.commit()?;
  Ok(thread)
}

pub fn touch_thread(conn: &mut Connection, id: ThreadId, at: DateTime<Utc>) -> Result<Thread> {
  let tx = conn.transaction()?;
  tx.execute(
    "UPDATE threads
     SET last_activity_at = max(last_activity_at, ?2), updated_at = ?3
     WHERE id = ?1",
    params![id.get(), encode_dt(stored_precision(at)), encode_dt(now())],
  )?;
  let thread = require_thread(&tx, id)?;
  tx.commit()?;
  Ok(thread)
}

pub fn delete_thread(conn: &mut Connection, id: ThreadId) -> Result<()> {
  let tx = conn.transaction()?;
  let actions: i64 = tx.query_row(
    "SELECT COUNT(*) FROM agent_actions WHERE thread_id = ?1",
    params![id.get()],
    |r| r.get(0),
  )?;
  if actions > 0 {
    return Err(
      CoreError::Restricted {
        entity: "thread",
        id:     id.get(),
        reason: format!("{actions} recorded actions reference it"),
      }
      .into(),
    );
  }
  delete_row(&tx, "threads", "thread", id.get(), "emails or draft responses")?;
  tx.commit()?;
  Ok(())
}

// ─── Emails ──────────────────────────────────────────────────────────────────

pub fn get_email(conn: &Connection, id: EmailId) -> Result<Option<Email>> {
  query_one::<RawEmail>(
    conn,
    &format!("SELECT {EMAIL_COLUMNS} FROM emails WHERE id = ?1"),
    id.get(),
  )?
  .map(RawEmail::into_email)
  .transpose()
}

pub fn insert_email(conn: &mut Connection, input: NewEmail) -> Result<Email> {
  let at = now();
  let sent_at = input.sent_at.map(stored_precision);

  let tx = conn.transaction()?;
  require(&tx, "thread_id", "threads", input.thread_id.get())?;
  tx.execute(
    "INSERT INTO emails (
       thread_id, from_email, to_emails, cc_emails, bcc_emails, subject,
       body_text, body_html, direction, is_draft, sent_at, created_at, updated_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
    params![
      input.thread_id.get(),
      input.from_email,
      encode_list(&input.to_emails)?,
      encode_opt_list(input.cc_emails.as_deref())?,
      encode_opt_list(input.bcc_emails.as_deref())?,
      input.subject,
      input.body_text,
      input.body_html,
      input.direction.as_str(),
      input.is_draft,
      sent_at.map(encode_dt),
      encode_dt(at),
    ],
  )?;
  let id = tx.last_insert_rowid();
  tx.commit()?;

  Ok(Email {
    id: id.into(),
    thread_id: input.thread_id,
    from_email: input.from_email,
    to_emails: input.to_emails,
    cc_emails: input.cc_emails,
    bcc_emails: input.bcc_emails,
    subject: input.subject,
    body_text: input.body_text,
    body_html: input.body_html,
    direction: input.direction,
    is_draft: input.is_draft,
    sent_at,
    created_at: at,
    updated_at: at,
  })
}

pub fn list_emails(conn: &Connection, thread_id: ThreadId) -> Result<Vec<Email>> {
  query_many::<RawEmail>(
    conn,
    &format!("SELECT {EMAIL_COLUMNS} FROM emails WHERE thread_id = ?1 ORDER BY id"),
    params![thread_id.get()],
  )?
  .into_iter()
  .map(RawEmail::into_email)
  .collect()
}

pub fn mark_email_sent(conn: &mut Connection, id: EmailId) -> Result<Email> {
  let tx = conn.transaction()?;
  let email = get_email(&tx, id)?
    .ok_or(CoreError::NotFound { entity: "email", id: id.get() })?;
  if let Some(sent_at) = email.sent_at {
    return Err(
      CoreError::validation("sent_at", format!("email {id} was already sent at {sent_at}"))
        .into(),
    );
  }

  let at = encode_dt(now());
  tx.execute(
    "UPDATE emails SET is_draft = 0, sent_at = ?2, updated_at = ?2 WHERE id = ?1",
    params![id.get(), at],
  )?;
  let sent = get_email(&tx, id)?
    .ok_or(CoreError::NotFound { entity: "email", id: id.get() })?;
  tx.commit()?;
  Ok(sent)
}

pub fn delete_email(conn: &Connection, id: EmailId) -> Result<()> {
  delete_row(conn, "emails", "email", id.get(), "draft responses")
}

// ─── Drafts ──────────────────────────────────────────────────────────────────

pub fn get_draft(conn: &Connection, id: DraftId) -> Result<Option<DraftResponse>> {
  query_one::<RawDraft>(
    conn,
    &format!("SELECT {DRAFT_COLUMNS} FROM draft_responses WHERE id = ?1"),
    id.get(),
  )?
  .map(RawDraft::into_draft)
  .transpose()
}

fn require_draft(conn: &Connection, id: DraftId) -> Result<DraftResponse> {
  get_draft(conn, id)?
    .ok_or_else(|| CoreError::NotFound { entity: "draft response", id: id.get() }.into())
}

/// Insert a fully-built draft (id ignored) and return it with its new id.
fn insert_draft_row(conn: &Connection, mut draft: DraftResponse) -> Result<DraftResponse> {
  conn.execute(
    "INSERT INTO draft_responses (
       email_id, thread_id, generated_content, status, created_by_user_id,
       version, parent_draft_id, confidence_score, created_at, updated_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
    params![
      draft.email_id.get(),
      draft.thread_id.get(),
      draft.generated_content,
      draft.status.as_str(),
      draft.created_by_user_id.map(UserId::get),
      draft.version,
      draft.parent_draft_id.map(DraftId::get),
      draft.confidence_score.map(|c| c.to_string()),
      encode_dt(draft.created_at),
    ],
  )?;
  draft.id = conn.last_insert_rowid().into();
  Ok(draft)
}

pub fn insert_draft(conn: &mut Connection, input: NewDraft) -> Result<DraftResponse> {
  let at = now();
  let tx = conn.transaction()?;

  require(&tx, "thread_id", "threads", input.thread_id.get())?;
  check_thread_link(&tx, "email_id", "emails", input.email_id.get(), input.thread_id.get())?;
  if let Some(user) = input.created_by_user_id {
    require(&tx, "created_by_user_id", "users", user.get())?;
  }

  let draft = insert_draft_row(&tx, DraftResponse {
    id: DraftId(0),
    email_id: input.email_id,
    thread_id: input.thread_id,
    generated_content: input.generated_content,
    status: DraftStatus::Pending,
    created_by_user_id: input.created_by_user_id,
    version: 1,
    parent_draft_id: None,
    confidence_score: input.confidence_score,
    created_at: at,
    updated_at: at,
  })?;
  tx.commit()?;
  Ok(draft)
}

pub fn revise_draft(
  conn: &mut Connection,
  parent_id: DraftId,
  revision: DraftRevision,
) -> Result<DraftResponse> {
  let at = now();
  let tx = conn.transaction()?;

  let parent = get_draft(&tx, parent_id)?
    .ok_or(CoreError::MissingReference { field: "parent_draft_id", id: parent_id.get() })?;
  if let Some(user) = revision.created_by_user_id {
    require(&tx, "created_by_user_id", "users", user.get())?;
  }

  let child = DraftResponse {
    id: DraftId(0),
    email_id: parent.email_id,
    thread_id: parent.thread_id,
    generated_content: revision.generated_content,
    status: DraftStatus::Pending,
    created_by_user_id: revision.created_by_user_id,
    version: parent.version + 1,
    parent_draft_id: Some(parent.id),
    confidence_score: revision.confidence_score,
    created_at: at,
    updated_at: at,
  };
  child.check_parent(&parent)?;

  let child = insert_draft_row(&tx, child)?;
  tx.commit()?;
  Ok(child)
}

pub fn set_draft_status(
  conn: &mut Connection,
  id: DraftId,
  status: DraftStatus,
) -> Result<DraftResponse> {
  let tx = conn.transaction()?;
  let current = require_draft(&tx, id)?;
  current.status.transition(status)?;

  tx.execute(
    "UPDATE draft_responses SET status = ?2, updated_at = ?3 WHERE id = ?1",
    params![id.get(), status.as_str(), encode_dt(now())],
  )?;
  let updated = require_draft(&tx, id)?;
  tx.commit()?;
  Ok(updated)
}

pub fn draft_history(conn: &Connection, id: DraftId) -> Result<Vec<DraftResponse>> {
  let mut chain = vec![require_draft(conn, id)?];
  while let Some(parent_id) = chain.last().and_then(|d| d.parent_draft_id) {
    // Versions strictly decrease towards the root, so a cycle would show up
    // here as a parent that is not older than its child.
    let parent = require_draft(conn, parent_id)?;
    if let Some(child) = chain.last() {
      child.check_parent(&parent)?;
    }
    chain.push(parent);
  }
  Ok(chain)
}

pub fn delete_draft(conn: &Connection, id: DraftId) -> Result<()> {
  delete_row(conn, "draft_responses", "draft response", id.get(), "later revisions")
}

// ─── Action log ──────────────────────────────────────────────────────────────

/// Resolve every reference of `input` and append it, all in one transaction.
pub fn insert_action(conn: &mut Connection, input: NewAgentAction) -> Result<AgentAction> {
  let metadata = input.validate()?;
  let thread = input.thread_id.get();
  let at = now();

  let tx = conn.transaction()?;

  require(&tx, "thread_id", "threads", thread)?;
  if let Some(email) = input.email_id {
    check_thread_link(&tx, "email_id", "emails", email.get(), thread)?;
  }
  if let Some(draft) = input.draft_response_id {
    check_thread_link(&tx, "draft_response_id", "draft_responses", draft.get(), thread)?;
  }
  if let Some(user) = input.actor.user_id() {
    require(&tx, "actor_user_id", "users", user.get())?;
  }

  tx.execute(
    "INSERT INTO agent_actions (
       thread_id, email_id, draft_response_id, actor_user_id,
       action, metadata, ip_address, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    params![
      thread,
      input.email_id.map(EmailId::get),
      input.draft_response_id.map(DraftId::get),
      input.actor.user_id().map(UserId::get),
      input.action.as_str(),
      encode_metadata(metadata.as_ref())?,
      input.ip_address,
      encode_dt(at),
    ],
  )?;
  let id = tx.last_insert_rowid();
  tx.commit()?;

  Ok(AgentAction {
    id: id.into(),
    thread_id: input.thread_id,
    email_id: input.email_id,
    draft_response_id: input.draft_response_id,
    actor: input.actor,
    action: input.action,
    metadata,
    ip_address: input.ip_address,
    created_at: at,
  })
}

pub fn get_action(conn: &Connection, id: ActionId) -> Result<Option<AgentAction>> {
  query_one::<RawAction>(
    conn,
    &format!("SELECT {ACTION_COLUMNS} FROM agent_actions WHERE id = ?1"),
    id.get(),
  )?
  .map(RawAction::into_action)
  .transpose()
}

/// Served by `thread_timeline_idx`.
pub fn thread_timeline(
  conn: &Connection,
  thread_id: ThreadId,
  limit: usize,
) -> Result<Vec<AgentAction>> {
  query_many::<RawAction>(
    conn,
    &format!(
      "SELECT {ACTION_COLUMNS} FROM agent_actions
       WHERE thread_id = ?1
       ORDER BY created_at DESC, id DESC
       LIMIT ?2"
    ),
    params![thread_id.get(), limit as i64],
  )?
  .into_iter()
  .map(RawAction::into_action)
  .collect()
}

/// Served by `actor_idx`.
pub fn actions_by_actor(
  conn: &Connection,
  user_id: UserId,
  limit: usize,
) -> Result<Vec<AgentAction>> {
  query_many::<RawAction>(
    conn,
    &format!(
      "SELECT {ACTION_COLUMNS} FROM agent_actions
       WHERE actor_user_id = ?1
       ORDER BY created_at DESC, id DESC
       LIMIT ?2"
    ),
    params![user_id.get(), limit as i64],
  )?
  .into_iter()
  .map(RawAction::into_action)
  .collect()
}
