//! Sample data for local development.
//!
//! [`run`] wipes the store and loads a small, fixed data set: one user per
//! role, one thread per status, a handful of emails (one still a draft), a
//! draft for every workflow state and a few logged actions.

use std::fmt;

use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::json;
use triage_core::{
  action::{ActionKind, NewAgentAction},
  draft::{ConfidenceScore, DraftRevision, DraftStatus, NewDraft},
  email::{Direction, NewEmail},
  store::TriageStore,
  thread::{NewThread, ThreadStatus},
  user::{NewUser, Role},
};
use triage_store_sqlite::{Result, SqliteStore};

/// Row counts written by [`run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
  pub users:   usize,
  pub threads: usize,
  pub emails:  usize,
  pub drafts:  usize,
  pub actions: usize,
}

impl fmt::Display for SeedSummary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "users:           {} (agent, manager, admin)", self.users)?;
    writeln!(f, "threads:         {} (active, needs_attention, closed)", self.threads)?;
    writeln!(f, "emails:          {} (inbound and outbound, 1 unsent draft)", self.emails)?;
    writeln!(f, "draft responses: {} (pending, approved, rejected, sent)", self.drafts)?;
    write!(
      f,
      "agent actions:   {} (email_read, draft_created, draft_approved, thread_status_changed)",
      self.actions
    )
  }
}

fn confidence(s: &str) -> Result<ConfidenceScore> { Ok(s.parse::<ConfidenceScore>()?) }

fn addresses(list: &[&str]) -> Vec<String> { list.iter().map(|s| s.to_string()).collect() }

fn outbound(
  thread: triage_core::ThreadId,
  from: &str,
  to: &str,
  subject: &str,
  sent_at: chrono::DateTime<Utc>,
) -> NewEmail {
  NewEmail {
    direction: Direction::Outbound,
    ..NewEmail::inbound(thread, from, addresses(&[to]), subject, sent_at)
  }
}

fn with_body(mut email: NewEmail, text: &str, html: bool) -> NewEmail {
  email.body_html = html.then(|| format!("<p>{text}</p>"));
  email.body_text = Some(text.to_string());
  email
}

/// Clear every table and load the sample data set.
pub async fn run(store: &SqliteStore) -> Result<SeedSummary> {
  tracing::info!("clearing existing data");
  store.reset().await?;
  let mut summary = SeedSummary::default();

  let now = Utc::now();
  let day = Duration::days(1);

  // Users.
  let john = store
    .create_user(NewUser::new("john.agent@company.com", "John Agent", Role::Agent))
    .await?;
  summary.users += 1;
  let sarah = store
    .create_user(NewUser::new("sarah.manager@company.com", "Sarah Manager", Role::Manager))
    .await?;
  summary.users += 1;
  let mike = store
    .create_user(NewUser::new("mike.admin@company.com", "Mike Admin", Role::Admin))
    .await?;
  summary.users += 1;
  tracing::info!(count = summary.users, "inserted users");

  // Threads.
  let login = store
    .create_thread(NewThread {
      participant_emails: addresses(&["customer1@example.com", "john.agent@company.com"]),
      status: ThreadStatus::Active,
      last_activity_at: Some(now),
      ..NewThread::new("Product Support: Login Issues")
    })
    .await?;
  summary.threads += 1;
  let billing = store
    .create_thread(NewThread {
      participant_emails: addresses(&["customer2@example.com", "sarah.manager@company.com"]),
      status: ThreadStatus::NeedsAttention,
      last_activity_at: Some(now - day),
      ..NewThread::new("Billing Question: Subscription Renewal")
    })
    .await?;
  summary.threads += 1;
  let docs = store
    .create_thread(NewThread {
      participant_emails: addresses(&["customer3@example.com", "mike.admin@company.com"]),
      status: ThreadStatus::Closed,
      last_activity_at: Some(now - day * 2),
      ..NewThread::new("Feature Request: API Documentation")
    })
    .await?;
  summary.threads += 1;
  tracing::info!(count = summary.threads, "inserted threads");

  // Emails.
  let login_question = store
    .record_email(with_body(
      NewEmail::inbound(
        login.id,
        "customer1@example.com",
        addresses(&["john.agent@company.com"]),
        "Product Support: Login Issues",
        now,
      ),
      "Hi, I'm having trouble logging into my account. Can you help?",
      true,
    ))
    .await?;
  summary.emails += 1;
  store
    .record_email(with_body(
      outbound(
        login.id,
        "john.agent@company.com",
        "customer1@example.com",
        "Re: Product Support: Login Issues",
        now,
      ),
      "Hello! I'd be happy to help you with your login issues. Can you try resetting your \
       password?",
      true,
    ))
    .await?;
  summary.emails += 1;
  let billing_question = store
    .record_email(with_body(
      NewEmail {
        cc_emails: Some(addresses(&["billing@company.com"])),
        ..NewEmail::inbound(
          billing.id,
          "customer2@example.com",
          addresses(&["sarah.manager@company.com"]),
          "Billing Question: Subscription Renewal",
          now - day,
        )
      },
      "When will my subscription renew and what's the cost?",
      true,
    ))
    .await?;
  summary.emails += 1;
  let docs_request = store
    .record_email(with_body(
      NewEmail::inbound(
        docs.id,
        "customer3@example.com",
        addresses(&["mike.admin@company.com"]),
        "Feature Request: API Documentation",
        now - day * 2,
      ),
      "Could you provide more detailed API documentation with examples?",
      true,
    ))
    .await?;
  summary.emails += 1;
  store
    .record_email(with_body(
      outbound(
        docs.id,
        "mike.admin@company.com",
        "customer3@example.com",
        "Re: Feature Request: API Documentation",
        now - day * 2 + Duration::hours(1),
      ),
      "Thank you for your feedback. We've updated our API documentation with more examples.",
      true,
    ))
    .await?;
  summary.emails += 1;
  store
    .record_email(with_body(
      NewEmail::outbound_draft(
        billing.id,
        "sarah.manager@company.com",
        addresses(&["customer2@example.com"]),
        "Re: Billing Question: Subscription Renewal",
      ),
      "Your subscription will renew on the 15th of next month for $49.99.",
      false,
    ))
    .await?;
  summary.emails += 1;
  tracing::info!(count = summary.emails, "inserted emails");

  // Draft responses: one per workflow state, the last a revision of the
  // rejected one.
  let pending = store
    .create_draft(NewDraft {
      email_id:           login_question.id,
      thread_id:          login.id,
      generated_content:  "Thank you for contacting support. I can help you resolve your login \
                           issues. Please try the following steps: 1) Clear your browser cache, \
                           2) Try a different browser, 3) Reset your password using the forgot \
                           password link."
        .into(),
      created_by_user_id: None,
      confidence_score:   Some(confidence("0.85")?),
    })
    .await?;
  summary.drafts += 1;

  let approved = store
    .create_draft(NewDraft {
      email_id:           billing_question.id,
      thread_id:          billing.id,
      generated_content:  "Hi there! Your subscription is set to auto-renew on the 15th of next \
                           month. The renewal cost will be $49.99. You can manage your \
                           subscription settings in your account dashboard."
        .into(),
      created_by_user_id: Some(sarah.id),
      confidence_score:   Some(confidence("0.92")?),
    })
    .await?;
  summary.drafts += 1;
  store.set_draft_status(approved.id, DraftStatus::Approved).await?;

  let rejected = store
    .create_draft(NewDraft {
      email_id:           docs_request.id,
      thread_id:          docs.id,
      generated_content:  "Thank you for your feature request. We appreciate your feedback about \
                           our API documentation. Our development team is working on improving \
                           the documentation with more comprehensive examples."
        .into(),
      created_by_user_id: Some(mike.id),
      confidence_score:   Some(confidence("0.78")?),
    })
    .await?;
  summary.drafts += 1;
  store.set_draft_status(rejected.id, DraftStatus::Rejected).await?;

  let revised = store
    .revise_draft(rejected.id, DraftRevision {
      generated_content:  "Thank you for your valuable feedback regarding our API documentation. \
                           We've reviewed your request and have updated our documentation with \
                           additional examples and use cases. You can find the updated \
                           documentation at docs.company.com/api."
        .into(),
      created_by_user_id: Some(mike.id),
      confidence_score:   Some(confidence("0.94")?),
    })
    .await?;
  summary.drafts += 1;
  store.set_draft_status(revised.id, DraftStatus::Approved).await?;
  store.set_draft_status(revised.id, DraftStatus::Sent).await?;
  tracing::info!(count = summary.drafts, "inserted draft responses");

  // Agent actions.
  store
    .log_action(
      NewAgentAction::new(login.id, ActionKind::EmailRead)
        .email(login_question.id)
        .by(john.id)
        .metadata(json!({ "read_duration_seconds": 45, "device": "desktop" }))
        .ip_address("192.168.1.100"),
    )
    .await?;
  summary.actions += 1;
  store
    .log_action(
      NewAgentAction::new(login.id, ActionKind::DraftCreated)
        .email(login_question.id)
        .draft(pending.id)
        .metadata(json!({
          "model": "gpt-4",
          "confidence_score": "0.85",
          "processing_time_ms": 1250,
          "tokens_used": 342
        })),
    )
    .await?;
  summary.actions += 1;
  store
    .log_action(
      NewAgentAction::new(billing.id, ActionKind::DraftApproved)
        .email(billing_question.id)
        .draft(approved.id)
        .by(sarah.id)
        .metadata(json!({
          "approval_notes": "Looks good, send it out",
          "reviewed_duration_seconds": 120
        }))
        .ip_address("192.168.1.101"),
    )
    .await?;
  summary.actions += 1;
  store
    .log_action(
      NewAgentAction::new(docs.id, ActionKind::ThreadStatusChanged)
        .by(mike.id)
        .metadata(json!({
          "old_status": "active",
          "new_status": "closed",
          "reason": "Issue resolved"
        }))
        .ip_address("192.168.1.102"),
    )
    .await?;
  summary.actions += 1;
  tracing::info!(count = summary.actions, "inserted agent actions");

  tracing::info!("seed complete");
  Ok(summary)
}
