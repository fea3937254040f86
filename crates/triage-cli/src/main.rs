//! `triage`: command-line access to the support-triage store.
//!
//! # Usage
//!
//! ```text
//! DATABASE_URL=sqlite://triage.db triage migrate
//! triage seed
//! triage log-action --thread 1 --action email_read --actor 1 --metadata '{"device":"desktop"}'
//! triage timeline --thread 1
//! triage actor-actions --user 1 --limit 10
//! ```
//!
//! Settings are read from `triage.toml` (or `--config`) and the environment;
//! a `.env` file in the working directory is loaded first.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use triage_cli::{AppConfig, seed};
use triage_core::{
  DraftId, EmailId, ThreadId, UserId,
  action::NewAgentAction,
  store::{DEFAULT_TIMELINE_LIMIT, TriageStore},
};
use triage_store_sqlite::SqliteStore;

#[derive(Parser)]
#[command(name = "triage", author, version, about = "Support-triage store tooling")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "triage.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Create the schema if it does not exist yet.
  Migrate,

  /// Replace all data with the sample data set.
  Seed,

  /// Append one entry to the agent action log.
  LogAction {
    #[arg(long)]
    thread:   i64,
    /// One of the action kinds, e.g. `email_read` or `draft_approved`.
    #[arg(long)]
    action:   String,
    #[arg(long)]
    email:    Option<i64>,
    #[arg(long)]
    draft:    Option<i64>,
    /// Acting user; omit for a system action.
    #[arg(long)]
    actor:    Option<i64>,
    /// A JSON object.
    #[arg(long)]
    metadata: Option<String>,
    #[arg(long)]
    ip:       Option<String>,
  },

  /// Show a thread's actions, newest first.
  Timeline {
    #[arg(long)]
    thread: i64,
    #[arg(long, default_value_t = DEFAULT_TIMELINE_LIMIT)]
    limit:  usize,
  },

  /// Show the actions taken by one user, newest first.
  ActorActions {
    #[arg(long)]
    user:  i64,
    #[arg(long, default_value_t = DEFAULT_TIMELINE_LIMIT)]
    limit: usize,
  },
}

#[tokio::main]
async fn main() {
  // A missing .env is fine.
  dotenvy::dotenv().ok();

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if let Err(e) = run(cli).await {
    tracing::error!("{e:#}");
    std::process::exit(1);
  }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
  let cfg = AppConfig::load(&cli.config).context("invalid configuration")?;
  let location = cfg.storage()?;
  tracing::debug!(app_env = %cfg.app_env, ?location, "configuration loaded");

  let store = location
    .open()
    .await
    .with_context(|| format!("failed to open store at {location:?}"))?;

  match cli.command {
    Command::Migrate => {
      tracing::info!("schema is up to date");
    }
    Command::Seed => {
      let summary = seed::run(&store).await.context("seed failed")?;
      println!("{summary}");
    }
    Command::LogAction { thread, action, email, draft, actor, metadata, ip } => {
      let mut input = NewAgentAction::parse(ThreadId(thread), &action)?;
      if let Some(id) = email {
        input = input.email(EmailId(id));
      }
      if let Some(id) = draft {
        input = input.draft(DraftId(id));
      }
      if let Some(id) = actor {
        input = input.by(UserId(id));
      }
      if let Some(raw) = metadata {
        let value = serde_json::from_str(&raw).context("--metadata is not valid JSON")?;
        input = input.metadata(value);
      }
      if let Some(ip) = ip {
        input = input.ip_address(ip);
      }
      let logged = store.log_action(input).await.context("failed to log action")?;
      print_json(&logged)?;
    }
    Command::Timeline { thread, limit } => {
      print_json(&timeline(&store, ThreadId(thread), limit).await?)?;
    }
    Command::ActorActions { user, limit } => {
      let actions = store.actions_by_actor(UserId(user), limit).await?;
      print_json(&actions)?;
    }
  }

  Ok(())
}

async fn timeline(
  store: &SqliteStore,
  thread: ThreadId,
  limit: usize,
) -> anyhow::Result<Vec<triage_core::action::AgentAction>> {
  if store.get_thread(thread).await?.is_none() {
    anyhow::bail!("thread {thread} does not exist");
  }
  Ok(store.thread_timeline(thread, limit).await?)
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
