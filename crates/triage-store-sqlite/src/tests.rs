//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, Utc};
use serde_json::json;
use triage_core::{
  ErrorKind,
  action::{ActionKind, Actor, NewAgentAction},
  draft::{ConfidenceScore, DraftRevision, DraftStatus, NewDraft},
  email::{Email, NewEmail},
  store::TriageStore,
  thread::{NewThread, Thread, ThreadStatus},
  user::{NewUser, Role, User},
  DraftId, EmailId, ThreadId, UserId,
};

use crate::{Error, SqliteStore};

type CoreError = triage_core::Error;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

struct Fixture {
  user:   User,
  thread: Thread,
  email:  Email,
}

/// An agent, an active thread and one inbound email on it.
async fn fixture(s: &SqliteStore) -> Fixture {
  let user = s
    .create_user(NewUser::new("john.agent@company.com", "John Agent", Role::Agent))
    .await
    .unwrap();
  let thread = s
    .create_thread(NewThread {
      participant_emails: vec![
        "customer1@example.com".into(),
        "john.agent@company.com".into(),
      ],
      ..NewThread::new("Product Support: Login Issues")
    })
    .await
    .unwrap();
  let email = s
    .record_email(NewEmail::inbound(
      thread.id,
      "customer1@example.com",
      vec!["john.agent@company.com".into()],
      "Product Support: Login Issues",
      Utc::now(),
    ))
    .await
    .unwrap();
  Fixture { user, thread, email }
}

fn draft_for(email: &Email) -> NewDraft {
  NewDraft {
    email_id:           email.id,
    thread_id:          email.thread_id,
    generated_content:  "Please try resetting your password.".into(),
    created_by_user_id: None,
    confidence_score:   Some("0.85".parse().unwrap()),
  }
}

fn revision(content: &str) -> DraftRevision {
  DraftRevision {
    generated_content:  content.into(),
    created_by_user_id: None,
    confidence_score:   None,
  }
}

fn assert_kind<T: std::fmt::Debug>(result: crate::Result<T>, kind: ErrorKind) -> Error {
  let err = result.unwrap_err();
  assert_eq!(err.kind(), kind, "unexpected error: {err}");
  err
}

// ─── Action log: happy path ──────────────────────────────────────────────────

#[tokio::test]
async fn human_email_read_is_appended_verbatim() {
  let s = store().await;
  let f = fixture(&s).await;

  let before = Utc::now() - Duration::seconds(1);
  let action = s
    .log_action(
      NewAgentAction::new(f.thread.id, ActionKind::EmailRead)
        .email(f.email.id)
        .by(f.user.id)
        .metadata(json!({ "read_duration_seconds": 45, "device": "desktop" }))
        .ip_address("192.168.1.100"),
    )
    .await
    .unwrap();

  assert_eq!(action.thread_id, f.thread.id);
  assert_eq!(action.email_id, Some(f.email.id));
  assert_eq!(action.draft_response_id, None);
  assert_eq!(action.actor, Actor::Human(f.user.id));
  assert_eq!(action.action, ActionKind::EmailRead);
  assert_eq!(action.ip_address.as_deref(), Some("192.168.1.100"));
  assert_eq!(action.metadata.as_ref().unwrap()["device"], "desktop");
  assert!(action.created_at >= before);

  let stored = s.get_action(action.id).await.unwrap().unwrap();
  assert_eq!(stored, action);

  // Logging does not touch the thread.
  let thread = s.get_thread(f.thread.id).await.unwrap().unwrap();
  assert_eq!(thread, f.thread);
  assert_eq!(thread.status, ThreadStatus::Active);
}

#[tokio::test]
async fn omitted_actor_is_stored_as_system() {
  let s = store().await;
  let f = fixture(&s).await;
  let draft = s.create_draft(draft_for(&f.email)).await.unwrap();

  let action = s
    .log_action(
      NewAgentAction::new(f.thread.id, ActionKind::DraftCreated)
        .email(f.email.id)
        .draft(draft.id)
        .metadata(json!({ "model": "gpt-4", "tokens_used": 342 })),
    )
    .await
    .unwrap();

  assert_eq!(action.actor, Actor::System);
  let stored = s.get_action(action.id).await.unwrap().unwrap();
  assert!(stored.actor.is_system());
  assert_eq!(stored.draft_response_id, Some(draft.id));
}

#[tokio::test]
async fn each_append_gets_a_fresh_id() {
  let s = store().await;
  let f = fixture(&s).await;

  let a = s
    .log_action(NewAgentAction::new(f.thread.id, ActionKind::EmailRead))
    .await
    .unwrap();
  let b = s
    .log_action(NewAgentAction::new(f.thread.id, ActionKind::EmailRead))
    .await
    .unwrap();

  assert!(b.id > a.id);
  assert!(b.created_at >= a.created_at);
  assert_eq!(s.count_rows("agent_actions").await.unwrap(), 2);
}

#[tokio::test]
async fn nested_metadata_round_trips() {
  let s = store().await;
  let f = fixture(&s).await;

  let metadata = json!({
    "old_status": "active",
    "new_status": "closed",
    "reviewers": [1, 2, 3],
    "context": { "reason": "Issue resolved", "automated": false }
  });
  let action = s
    .log_action(
      NewAgentAction::new(f.thread.id, ActionKind::ThreadStatusChanged)
        .metadata(metadata.clone()),
    )
    .await
    .unwrap();

  let stored = s.get_action(action.id).await.unwrap().unwrap();
  assert_eq!(serde_json::Value::Object(stored.metadata.unwrap()), metadata);
}

#[tokio::test]
async fn concurrent_appends_all_land() {
  let s = store().await;
  let f = fixture(&s).await;

  let mut handles = Vec::new();
  for _ in 0..20 {
    let s = s.clone();
    let thread_id = f.thread.id;
    handles.push(tokio::spawn(async move {
      s.log_action(NewAgentAction::new(thread_id, ActionKind::EmailRead))
        .await
        .unwrap()
    }));
  }

  let mut ids = Vec::new();
  for handle in handles {
    ids.push(handle.await.unwrap().id);
  }
  ids.sort();
  ids.dedup();
  assert_eq!(ids.len(), 20);
  assert_eq!(s.thread_timeline(f.thread.id, 100).await.unwrap().len(), 20);
}

// ─── Action log: rejected writes ─────────────────────────────────────────────

#[tokio::test]
async fn missing_thread_is_referential_and_writes_nothing() {
  let s = store().await;
  fixture(&s).await;

  let err = assert_kind(
    s.log_action(NewAgentAction::new(ThreadId(9999), ActionKind::EmailRead))
      .await,
    ErrorKind::Referential,
  );
  assert!(matches!(
    err,
    Error::Core(CoreError::MissingReference { field: "thread_id", id: 9999 })
  ));
  assert_eq!(s.count_rows("agent_actions").await.unwrap(), 0);
}

#[tokio::test]
async fn missing_optional_references_name_the_field() {
  let s = store().await;
  let f = fixture(&s).await;
  let base = || NewAgentAction::new(f.thread.id, ActionKind::EmailRead);

  let cases = [
    (base().email(EmailId(404)), "email_id"),
    (base().draft(DraftId(404)), "draft_response_id"),
    (base().by(UserId(404)), "actor_user_id"),
  ];
  for (input, expected) in cases {
    let err = assert_kind(s.log_action(input).await, ErrorKind::Referential);
    assert!(
      matches!(err, Error::Core(CoreError::MissingReference { field, id: 404 }) if field == expected),
      "unexpected error: {err}"
    );
  }
  assert_eq!(s.count_rows("agent_actions").await.unwrap(), 0);
}

#[tokio::test]
async fn email_from_another_thread_is_rejected() {
  let s = store().await;
  let f = fixture(&s).await;
  let other = s.create_thread(NewThread::new("Billing")).await.unwrap();

  let err = assert_kind(
    s.log_action(NewAgentAction::new(other.id, ActionKind::EmailForwarded).email(f.email.id))
      .await,
    ErrorKind::Referential,
  );
  assert!(matches!(
    err,
    Error::Core(CoreError::ThreadMismatch { field: "email_id", .. })
  ));
  assert_eq!(s.count_rows("agent_actions").await.unwrap(), 0);
}

#[tokio::test]
async fn unknown_action_never_reaches_the_table() {
  let s = store().await;
  let f = fixture(&s).await;

  let err = NewAgentAction::parse(f.thread.id, "email_deleted").unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);

  // Even a raw insert bypassing the enum is refused.
  let raw = s
    .execute_raw(format!(
      "INSERT INTO agent_actions (thread_id, action, created_at)
       VALUES ({}, 'email_deleted', '2024-01-01T00:00:00.000000Z')",
      f.thread.id
    ))
    .await;
  assert_kind(raw, ErrorKind::Storage);
  assert_eq!(s.count_rows("agent_actions").await.unwrap(), 0);
}

#[tokio::test]
async fn non_object_metadata_is_a_validation_error() {
  let s = store().await;
  let f = fixture(&s).await;

  let err = assert_kind(
    s.log_action(NewAgentAction::new(f.thread.id, ActionKind::EmailRead).metadata(json!("text")))
      .await,
    ErrorKind::Validation,
  );
  assert!(matches!(
    err,
    Error::Core(CoreError::Validation { field: "metadata", .. })
  ));
  assert_eq!(s.count_rows("agent_actions").await.unwrap(), 0);
}

#[tokio::test]
async fn over_long_ip_address_is_a_validation_error() {
  let s = store().await;
  let f = fixture(&s).await;

  assert_kind(
    s.log_action(
      NewAgentAction::new(f.thread.id, ActionKind::EmailRead).ip_address("1".repeat(46)),
    )
    .await,
    ErrorKind::Validation,
  );
  assert_eq!(s.count_rows("agent_actions").await.unwrap(), 0);
}

// ─── Action log: immutability and referential rules ──────────────────────────

#[tokio::test]
async fn actions_cannot_be_rewritten_or_removed() {
  let s = store().await;
  let f = fixture(&s).await;
  let action = s
    .log_action(NewAgentAction::new(f.thread.id, ActionKind::EmailRead).by(f.user.id))
    .await
    .unwrap();

  assert_kind(
    s.execute_raw("UPDATE agent_actions SET action = 'email_forwarded'").await,
    ErrorKind::Storage,
  );
  assert_kind(
    s.execute_raw("UPDATE agent_actions SET created_at = '2000-01-01T00:00:00.000000Z'")
      .await,
    ErrorKind::Storage,
  );
  assert_kind(s.execute_raw("DELETE FROM agent_actions").await, ErrorKind::Storage);

  assert_eq!(s.get_action(action.id).await.unwrap().unwrap(), action);
}

#[tokio::test]
async fn pointers_cannot_be_cleared_while_their_rows_exist() {
  let s = store().await;
  let f = fixture(&s).await;
  let draft = s.create_draft(draft_for(&f.email)).await.unwrap();
  let action = s
    .log_action(
      NewAgentAction::new(f.thread.id, ActionKind::DraftApproved)
        .email(f.email.id)
        .draft(draft.id)
        .by(f.user.id),
    )
    .await
    .unwrap();

  for column in ["actor_user_id", "email_id", "draft_response_id"] {
    assert_kind(
      s.execute_raw(format!("UPDATE agent_actions SET {column} = NULL"))
        .await,
      ErrorKind::Storage,
    );
  }
  assert_kind(
    s.execute_raw("UPDATE agent_actions SET actor_user_id = NULL, email_id = NULL")
      .await,
    ErrorKind::Storage,
  );

  let stored = s.get_action(action.id).await.unwrap().unwrap();
  assert_eq!(stored.actor, Actor::Human(f.user.id));
  assert_eq!(stored, action);
}

#[tokio::test]
async fn thread_with_actions_cannot_be_deleted() {
  let s = store().await;
  let thread = s.create_thread(NewThread::new("Escalation")).await.unwrap();
  s.log_action(NewAgentAction::new(thread.id, ActionKind::ThreadAssigned))
    .await
    .unwrap();

  let err = assert_kind(s.delete_thread(thread.id).await, ErrorKind::Referential);
  assert!(matches!(
    err,
    Error::Core(CoreError::Restricted { entity: "thread", .. })
  ));

  // The foreign key enforces the same rule for raw deletes.
  assert_kind(
    s.execute_raw(format!("DELETE FROM threads WHERE id = {}", thread.id))
      .await,
    ErrorKind::Storage,
  );

  assert!(s.get_thread(thread.id).await.unwrap().is_some());
  assert_eq!(s.thread_timeline(thread.id, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn thread_without_references_can_be_deleted() {
  let s = store().await;
  let thread = s.create_thread(NewThread::new("Spam")).await.unwrap();

  s.delete_thread(thread.id).await.unwrap();
  assert!(s.get_thread(thread.id).await.unwrap().is_none());

  let err = assert_kind(s.delete_thread(thread.id).await, ErrorKind::Referential);
  assert!(matches!(err, Error::Core(CoreError::NotFound { .. })));
}

#[tokio::test]
async fn deleting_actor_clears_only_the_actor() {
  let s = store().await;
  let f = fixture(&s).await;
  let action = s
    .log_action(
      NewAgentAction::new(f.thread.id, ActionKind::EmailRead)
        .email(f.email.id)
        .by(f.user.id)
        .ip_address("10.0.0.1"),
    )
    .await
    .unwrap();

  s.delete_user(f.user.id).await.unwrap();
  assert!(s.get_user(f.user.id).await.unwrap().is_none());

  let stored = s.get_action(action.id).await.unwrap().unwrap();
  assert_eq!(stored.actor, Actor::System);
  assert_eq!(
    stored,
    triage_core::action::AgentAction { actor: Actor::System, ..action }
  );
}

#[tokio::test]
async fn deleting_email_clears_only_the_email() {
  let s = store().await;
  let f = fixture(&s).await;
  let action = s
    .log_action(
      NewAgentAction::new(f.thread.id, ActionKind::EmailRead)
        .email(f.email.id)
        .by(f.user.id),
    )
    .await
    .unwrap();

  s.delete_email(f.email.id).await.unwrap();

  let stored = s.get_action(action.id).await.unwrap().unwrap();
  assert_eq!(
    stored,
    triage_core::action::AgentAction { email_id: None, ..action }
  );
}

#[tokio::test]
async fn deleting_draft_clears_only_the_draft() {
  let s = store().await;
  let f = fixture(&s).await;
  let draft = s.create_draft(draft_for(&f.email)).await.unwrap();
  let action = s
    .log_action(
      NewAgentAction::new(f.thread.id, ActionKind::DraftCreated)
        .email(f.email.id)
        .draft(draft.id),
    )
    .await
    .unwrap();

  s.delete_draft(draft.id).await.unwrap();

  let stored = s.get_action(action.id).await.unwrap().unwrap();
  assert_eq!(
    stored,
    triage_core::action::AgentAction { draft_response_id: None, ..action }
  );
}

#[tokio::test]
async fn email_with_drafts_cannot_be_deleted() {
  let s = store().await;
  let f = fixture(&s).await;
  s.create_draft(draft_for(&f.email)).await.unwrap();

  let err = assert_kind(s.delete_email(f.email.id).await, ErrorKind::Referential);
  assert!(matches!(
    err,
    Error::Core(CoreError::Restricted { entity: "email", .. })
  ));
}

// ─── Action log: reads ───────────────────────────────────────────────────────

#[tokio::test]
async fn timeline_is_newest_first_and_scoped_to_the_thread() {
  let s = store().await;
  let f = fixture(&s).await;
  let other = s.create_thread(NewThread::new("Other")).await.unwrap();

  let mut logged = Vec::new();
  for kind in [
    ActionKind::EmailRead,
    ActionKind::ThreadAssigned,
    ActionKind::ThreadStatusChanged,
  ] {
    logged.push(s.log_action(NewAgentAction::new(f.thread.id, kind)).await.unwrap());
  }
  s.log_action(NewAgentAction::new(other.id, ActionKind::ThreadArchived))
    .await
    .unwrap();

  let timeline = s.thread_timeline(f.thread.id, 10).await.unwrap();
  let ids: Vec<_> = timeline.iter().map(|a| a.id).collect();
  let expected: Vec<_> = logged.iter().rev().map(|a| a.id).collect();
  assert_eq!(ids, expected);

  let page = s.thread_timeline(f.thread.id, 2).await.unwrap();
  assert_eq!(page.len(), 2);
  assert_eq!(page[0].action, ActionKind::ThreadStatusChanged);
}

#[tokio::test]
async fn actions_by_actor_excludes_others_and_system() {
  let s = store().await;
  let f = fixture(&s).await;
  let manager = s
    .create_user(NewUser::new("sarah.manager@company.com", "Sarah Manager", Role::Manager))
    .await
    .unwrap();

  s.log_action(NewAgentAction::new(f.thread.id, ActionKind::EmailRead).by(f.user.id))
    .await
    .unwrap();
  s.log_action(NewAgentAction::new(f.thread.id, ActionKind::ThreadAssigned).by(manager.id))
    .await
    .unwrap();
  s.log_action(NewAgentAction::new(f.thread.id, ActionKind::DraftCreated))
    .await
    .unwrap();

  let mine = s.actions_by_actor(f.user.id, 10).await.unwrap();
  assert_eq!(mine.len(), 1);
  assert_eq!(mine[0].action, ActionKind::EmailRead);
  assert_eq!(mine[0].actor, Actor::Human(f.user.id));
}

// ─── Drafts ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn draft_starts_pending_at_version_one() {
  let s = store().await;
  let f = fixture(&s).await;

  let draft = s.create_draft(draft_for(&f.email)).await.unwrap();
  assert_eq!(draft.status, DraftStatus::Pending);
  assert_eq!(draft.version, 1);
  assert!(draft.parent_draft_id.is_none());
  assert!(draft.is_machine_generated());

  let stored = s.get_draft(draft.id).await.unwrap().unwrap();
  assert_eq!(stored, draft);
  assert_eq!(stored.confidence_score.unwrap().to_string(), "0.850");
}

#[tokio::test]
async fn draft_must_match_its_email_thread() {
  let s = store().await;
  let f = fixture(&s).await;
  let other = s.create_thread(NewThread::new("Other")).await.unwrap();

  let err = assert_kind(
    s.create_draft(NewDraft { thread_id: other.id, ..draft_for(&f.email) })
      .await,
    ErrorKind::Referential,
  );
  assert!(matches!(
    err,
    Error::Core(CoreError::ThreadMismatch { field: "email_id", .. })
  ));
  assert_eq!(s.count_rows("draft_responses").await.unwrap(), 0);
}

#[tokio::test]
async fn revisions_chain_with_increasing_versions() {
  let s = store().await;
  let f = fixture(&s).await;

  let v1 = s.create_draft(draft_for(&f.email)).await.unwrap();
  let v2 = s
    .revise_draft(v1.id, DraftRevision {
      created_by_user_id: Some(f.user.id),
      ..revision("Second attempt.")
    })
    .await
    .unwrap();
  let v3 = s.revise_draft(v2.id, revision("Third attempt.")).await.unwrap();

  assert_eq!((v2.version, v2.parent_draft_id), (2, Some(v1.id)));
  assert_eq!((v3.version, v3.parent_draft_id), (3, Some(v2.id)));
  assert_eq!(v3.email_id, v1.email_id);
  assert_eq!(v3.thread_id, v1.thread_id);
  assert_eq!(v2.created_by_user_id, Some(f.user.id));

  let history = s.draft_history(v3.id).await.unwrap();
  let versions: Vec<_> = history.iter().map(|d| d.version).collect();
  assert_eq!(versions, [3, 2, 1]);

  // A draft with revisions keeps its place in the chain.
  assert_kind(s.delete_draft(v1.id).await, ErrorKind::Referential);
}

#[tokio::test]
async fn history_rejects_a_parent_on_another_email() {
  let s = store().await;
  let f = fixture(&s).await;
  let other = s
    .record_email(NewEmail::inbound(
      f.thread.id,
      "customer1@example.com",
      vec!["john.agent@company.com".into()],
      "Follow-up",
      Utc::now(),
    ))
    .await
    .unwrap();
  let v1 = s.create_draft(draft_for(&f.email)).await.unwrap();

  s.execute_raw(format!(
    "INSERT INTO draft_responses
       (email_id, thread_id, generated_content, version, parent_draft_id, created_at, updated_at)
     VALUES ({}, {}, 'x', 2, {}, '2024-01-01T00:00:00.000000Z', '2024-01-01T00:00:00.000000Z')",
    other.id, f.thread.id, v1.id
  ))
  .await
  .unwrap();

  let err = assert_kind(s.draft_history(DraftId(v1.id.get() + 1)).await, ErrorKind::Referential);
  assert!(matches!(
    err,
    Error::Core(CoreError::EmailMismatch { field: "parent_draft_id", .. })
  ));
}

#[tokio::test]
async fn revising_a_missing_draft_is_referential() {
  let s = store().await;
  fixture(&s).await;

  let err = assert_kind(
    s.revise_draft(DraftId(77), revision("orphan")).await,
    ErrorKind::Referential,
  );
  assert!(matches!(
    err,
    Error::Core(CoreError::MissingReference { field: "parent_draft_id", id: 77 })
  ));
}

#[tokio::test]
async fn draft_workflow_is_enforced() {
  let s = store().await;
  let f = fixture(&s).await;
  let draft = s.create_draft(draft_for(&f.email)).await.unwrap();

  let err = assert_kind(
    s.set_draft_status(draft.id, DraftStatus::Sent).await,
    ErrorKind::Validation,
  );
  assert!(matches!(err, Error::Core(CoreError::InvalidTransition { .. })));

  let approved = s.set_draft_status(draft.id, DraftStatus::Approved).await.unwrap();
  assert_eq!(approved.status, DraftStatus::Approved);
  let sent = s.set_draft_status(draft.id, DraftStatus::Sent).await.unwrap();
  assert_eq!(sent.status, DraftStatus::Sent);

  assert_kind(
    s.set_draft_status(draft.id, DraftStatus::Approved).await,
    ErrorKind::Validation,
  );
  let stored = s.get_draft(draft.id).await.unwrap().unwrap();
  assert_eq!(stored.status, DraftStatus::Sent);
}

#[tokio::test]
async fn confidence_outside_unit_interval_is_refused_by_the_table() {
  let s = store().await;
  let f = fixture(&s).await;

  assert!(ConfidenceScore::try_from(1.5).is_err());
  for raw in ["1.5", "1.500", "abc", "0.85", ""] {
    assert_kind(
      s.execute_raw(format!(
        "INSERT INTO draft_responses
           (email_id, thread_id, generated_content, confidence_score, created_at, updated_at)
         VALUES ({}, {}, 'x', '{raw}', '2024-01-01T00:00:00.000000Z', \
         '2024-01-01T00:00:00.000000Z')",
        f.email.id, f.thread.id
      ))
      .await,
      ErrorKind::Storage,
    );
  }
  assert_eq!(s.count_rows("draft_responses").await.unwrap(), 0);

  // The stored form is accepted and reads back.
  s.execute_raw(format!(
    "INSERT INTO draft_responses
       (email_id, thread_id, generated_content, confidence_score, created_at, updated_at)
     VALUES ({}, {}, 'x', '1.000', '2024-01-01T00:00:00.000000Z', '2024-01-01T00:00:00.000000Z')",
    f.email.id, f.thread.id
  ))
  .await
  .unwrap();
  let draft = s.get_draft(DraftId(1)).await.unwrap().unwrap();
  assert_eq!(draft.confidence_score.unwrap().thousandths(), 1000);
}

// ─── Emails ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn email_on_missing_thread_is_referential() {
  let s = store().await;

  let err = assert_kind(
    s.record_email(NewEmail::inbound(
      ThreadId(5),
      "a@example.com",
      vec!["b@example.com".into()],
      "hi",
      Utc::now(),
    ))
    .await,
    ErrorKind::Referential,
  );
  assert!(matches!(
    err,
    Error::Core(CoreError::MissingReference { field: "thread_id", id: 5 })
  ));
}

#[tokio::test]
async fn draft_email_is_sent_exactly_once() {
  let s = store().await;
  let f = fixture(&s).await;

  let mut input = NewEmail::outbound_draft(
    f.thread.id,
    "john.agent@company.com",
    vec!["customer1@example.com".into()],
    "Re: Product Support: Login Issues",
  );
  input.cc_emails = Some(vec!["billing@company.com".into()]);
  input.body_text = Some("Can you try resetting your password?".into());
  let draft = s.record_email(input).await.unwrap();
  assert!(draft.is_draft);
  assert!(draft.sent_at.is_none());
  assert_eq!(s.get_email(draft.id).await.unwrap().unwrap(), draft);

  let sent = s.mark_email_sent(draft.id).await.unwrap();
  assert!(!sent.is_draft);
  assert!(sent.sent_at.is_some());
  assert_eq!(sent.cc_emails, draft.cc_emails);

  let err = assert_kind(s.mark_email_sent(draft.id).await, ErrorKind::Validation);
  assert!(matches!(
    err,
    Error::Core(CoreError::Validation { field: "sent_at", .. })
  ));
  assert_eq!(s.get_email(draft.id).await.unwrap().unwrap().sent_at, sent.sent_at);

  let emails = s.list_emails(f.thread.id).await.unwrap();
  assert_eq!(emails.len(), 2);
}

// ─── Threads and users ───────────────────────────────────────────────────────

#[tokio::test]
async fn touch_thread_only_moves_forward() {
  let s = store().await;
  let f = fixture(&s).await;

  let later = f.thread.last_activity_at + Duration::hours(1);
  let touched = s.touch_thread(f.thread.id, later).await.unwrap();
  assert_eq!(touched.last_activity_at, later);
  assert_eq!(touched.created_at, f.thread.created_at);

  let earlier = f.thread.last_activity_at - Duration::days(1);
  let untouched = s.touch_thread(f.thread.id, earlier).await.unwrap();
  assert_eq!(untouched.last_activity_at, later);
}

#[tokio::test]
async fn thread_status_filter_and_ordering() {
  let s = store().await;
  let now = Utc::now();
  let old = s
    .create_thread(NewThread {
      status: ThreadStatus::NeedsAttention,
      last_activity_at: Some(now - Duration::days(2)),
      ..NewThread::new("Old")
    })
    .await
    .unwrap();
  let recent = s
    .create_thread(NewThread {
      status: ThreadStatus::NeedsAttention,
      last_activity_at: Some(now - Duration::days(1)),
      ..NewThread::new("Recent")
    })
    .await
    .unwrap();
  s.create_thread(NewThread::new("Active")).await.unwrap();

  let flagged = s
    .list_threads(Some(ThreadStatus::NeedsAttention))
    .await
    .unwrap();
  let ids: Vec<_> = flagged.iter().map(|t| t.id).collect();
  assert_eq!(ids, [recent.id, old.id]);
  assert_eq!(s.list_threads(None).await.unwrap().len(), 3);

  let closed = s.set_thread_status(old.id, ThreadStatus::Closed).await.unwrap();
  assert_eq!(closed.status, ThreadStatus::Closed);

  let err = assert_kind(
    s.set_thread_status(ThreadId(999), ThreadStatus::Closed).await,
    ErrorKind::Referential,
  );
  assert!(matches!(err, Error::Core(CoreError::NotFound { entity: "thread", .. })));
}

#[tokio::test]
async fn user_roles_and_uniqueness() {
  let s = store().await;
  let f = fixture(&s).await;

  let promoted = s.set_user_role(f.user.id, Role::Admin).await.unwrap();
  assert_eq!(promoted.role, Role::Admin);
  assert_eq!(promoted.email, f.user.email);

  // Duplicate email is a constraint violation surfaced from the engine.
  assert_kind(
    s.create_user(NewUser::new(f.user.email.clone(), "Someone Else", Role::Agent))
      .await,
    ErrorKind::Storage,
  );
  assert_eq!(s.list_users().await.unwrap().len(), 1);

  assert_kind(
    s.create_user(NewUser::new("", "Nameless", Role::Agent)).await,
    ErrorKind::Validation,
  );
}

#[tokio::test]
async fn user_who_authored_drafts_cannot_be_deleted() {
  let s = store().await;
  let f = fixture(&s).await;
  s.create_draft(NewDraft {
    created_by_user_id: Some(f.user.id),
    ..draft_for(&f.email)
  })
  .await
  .unwrap();

  let err = assert_kind(s.delete_user(f.user.id).await, ErrorKind::Referential);
  assert!(matches!(err, Error::Core(CoreError::Restricted { entity: "user", .. })));
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn reset_clears_every_table() {
  let s = store().await;
  let f = fixture(&s).await;
  let draft = s.create_draft(draft_for(&f.email)).await.unwrap();
  s.revise_draft(draft.id, revision("again")).await.unwrap();
  s.log_action(NewAgentAction::new(f.thread.id, ActionKind::DraftEdited).draft(draft.id))
    .await
    .unwrap();

  s.reset().await.unwrap();

  for table in ["agent_actions", "draft_responses", "emails", "threads", "users"] {
    assert_eq!(s.count_rows(table).await.unwrap(), 0, "{table} not empty");
  }
  // The schema, including the append-only guard, is back in place.
  let f = fixture(&s).await;
  s.log_action(NewAgentAction::new(f.thread.id, ActionKind::EmailRead))
    .await
    .unwrap();
  assert_kind(s.execute_raw("DELETE FROM agent_actions").await, ErrorKind::Storage);
}

#[tokio::test]
async fn reset_leaves_no_transaction_open() {
  let s = store().await;
  fixture(&s).await;

  s.reset().await.unwrap();
  s.reset().await.unwrap();

  // Starting a transaction fails if one is still open on the connection.
  s.execute_raw("BEGIN").await.unwrap();
  s.execute_raw("COMMIT").await.unwrap();
  fixture(&s).await;
}

#[tokio::test]
async fn file_backed_store_persists_across_reopen() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("triage.db");

  let action_id = {
    let s = SqliteStore::open(&path).await.unwrap();
    let f = fixture(&s).await;
    s.log_action(NewAgentAction::new(f.thread.id, ActionKind::EmailRead).by(f.user.id))
      .await
      .unwrap()
      .id
  };

  let s = SqliteStore::open(&path).await.unwrap();
  let action = s.get_action(action_id).await.unwrap().unwrap();
  assert_eq!(action.action, ActionKind::EmailRead);
  assert!(!action.actor.is_system());
}
