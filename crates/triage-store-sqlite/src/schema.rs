//! SQL schema for the triage SQLite store.
//!
//! Executed once at connection startup. Every enumeration is restated as a
//! CHECK constraint so that a raw insert bypassing the Rust types still fails.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    email       TEXT NOT NULL UNIQUE CHECK (length(email) <= 255),
    name        TEXT NOT NULL CHECK (length(name) <= 255),
    role        TEXT NOT NULL DEFAULT 'agent'
                CHECK (role IN ('agent', 'manager', 'admin')),
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS threads (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    subject            TEXT NOT NULL CHECK (length(subject) <= 500),
    participant_emails TEXT NOT NULL DEFAULT '[]',   -- JSON array of strings
    status             TEXT NOT NULL DEFAULT 'active'
                       CHECK (status IN ('active', 'closed', 'needs_attention')),
    last_activity_at   TEXT NOT NULL,
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS emails (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    thread_id   INTEGER NOT NULL REFERENCES threads(id),
    from_email  TEXT NOT NULL CHECK (length(from_email) <= 255),
    to_emails   TEXT NOT NULL,                       -- JSON array of strings
    cc_emails   TEXT,
    bcc_emails  TEXT,
    subject     TEXT NOT NULL CHECK (length(subject) <= 500),
    body_text   TEXT,
    body_html   TEXT,
    direction   TEXT NOT NULL CHECK (direction IN ('inbound', 'outbound')),
    is_draft    INTEGER NOT NULL DEFAULT 0 CHECK (is_draft IN (0, 1)),
    sent_at     TEXT,                                -- NULL while a draft
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    CHECK (is_draft = 0 OR sent_at IS NULL)
);

CREATE TABLE IF NOT EXISTS draft_responses (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    email_id           INTEGER NOT NULL REFERENCES emails(id),
    thread_id          INTEGER NOT NULL REFERENCES threads(id),
    generated_content  TEXT NOT NULL,
    status             TEXT NOT NULL DEFAULT 'pending'
                       CHECK (status IN ('pending', 'approved', 'rejected', 'sent')),
    created_by_user_id INTEGER REFERENCES users(id), -- NULL: machine-generated
    version            INTEGER NOT NULL DEFAULT 1 CHECK (version >= 1),
    parent_draft_id    INTEGER REFERENCES draft_responses(id),
    confidence_score   TEXT                          -- decimal(4,3) as text
                       CHECK (confidence_score IS NULL
                              OR (confidence_score GLOB '[01].[0-9][0-9][0-9]'
                                  AND CAST(confidence_score AS REAL) BETWEEN 0 AND 1)),
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL
);

-- Agent actions are strictly append-only. Deleting a referenced email, draft
-- or user clears that one pointer; deleting a thread with actions is refused.
CREATE TABLE IF NOT EXISTS agent_actions (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    thread_id         INTEGER NOT NULL
                      REFERENCES threads(id) ON DELETE RESTRICT,
    email_id          INTEGER
                      REFERENCES emails(id) ON DELETE SET NULL,
    draft_response_id INTEGER
                      REFERENCES draft_responses(id) ON DELETE SET NULL,
    actor_user_id     INTEGER                        -- NULL: system action
                      REFERENCES users(id) ON DELETE SET NULL,
    action            TEXT NOT NULL CHECK (action IN (
                        'email_read', 'email_forwarded',
                        'draft_created', 'draft_edited', 'draft_approved',
                        'draft_rejected', 'draft_sent',
                        'thread_assigned', 'thread_status_changed',
                        'thread_archived'
                      )),
    metadata          TEXT CHECK (metadata IS NULL OR json_type(metadata) = 'object'),
    ip_address        TEXT CHECK (ip_address IS NULL OR length(ip_address) <= 45),
    created_at        TEXT NOT NULL                  -- RFC 3339 UTC, server-assigned
);

CREATE INDEX IF NOT EXISTS thread_timeline_idx
    ON agent_actions(thread_id, created_at DESC);
CREATE INDEX IF NOT EXISTS actor_idx
    ON agent_actions(actor_user_id);
CREATE INDEX IF NOT EXISTS emails_thread_idx
    ON emails(thread_id);
CREATE INDEX IF NOT EXISTS drafts_email_idx
    ON draft_responses(email_id);

CREATE TRIGGER IF NOT EXISTS agent_actions_no_delete
BEFORE DELETE ON agent_actions
BEGIN
    SELECT RAISE(ABORT, 'agent_actions is append-only');
END;

-- The only permitted update is a foreign-key action clearing a pointer. By
-- the time ON DELETE SET NULL runs the parent row is gone, so clearing a
-- pointer whose parent still exists is refused.
CREATE TRIGGER IF NOT EXISTS agent_actions_no_update
BEFORE UPDATE ON agent_actions
WHEN NEW.id         IS NOT OLD.id
  OR NEW.thread_id  IS NOT OLD.thread_id
  OR NEW.action     IS NOT OLD.action
  OR NEW.metadata   IS NOT OLD.metadata
  OR NEW.ip_address IS NOT OLD.ip_address
  OR NEW.created_at IS NOT OLD.created_at
  OR (NEW.email_id          IS NOT OLD.email_id          AND NEW.email_id          IS NOT NULL)
  OR (NEW.draft_response_id IS NOT OLD.draft_response_id AND NEW.draft_response_id IS NOT NULL)
  OR (NEW.actor_user_id     IS NOT OLD.actor_user_id     AND NEW.actor_user_id     IS NOT NULL)
  OR (NEW.email_id IS NULL AND OLD.email_id IS NOT NULL
      AND EXISTS (SELECT 1 FROM emails WHERE id = OLD.email_id))
  OR (NEW.draft_response_id IS NULL AND OLD.draft_response_id IS NOT NULL
      AND EXISTS (SELECT 1 FROM draft_responses WHERE id = OLD.draft_response_id))
  OR (NEW.actor_user_id IS NULL AND OLD.actor_user_id IS NOT NULL
      AND EXISTS (SELECT 1 FROM users WHERE id = OLD.actor_user_id))
BEGIN
    SELECT RAISE(ABORT, 'agent_actions is append-only');
END;

PRAGMA user_version = 1;
"#;

/// Drops every table, children before parents. Dropping a table removes its
/// triggers before the implicit row deletion, so the append-only guard does
/// not fire. Run inside a transaction.
pub const DROP_ALL: &str = "
DROP TABLE IF EXISTS agent_actions;
DROP TABLE IF EXISTS draft_responses;
DROP TABLE IF EXISTS emails;
DROP TABLE IF EXISTS threads;
DROP TABLE IF EXISTS users;
";
