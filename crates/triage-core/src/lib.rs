//! Core types and trait definitions for the support-triage data model.
//!
//! This crate is deliberately free of database and CLI dependencies. Storage
//! backends implement [`store::TriageStore`]; everything else depends on that
//! abstraction rather than on a concrete backend.

pub mod action;
pub mod draft;
pub mod email;
pub mod error;
pub mod id;
pub mod store;
pub mod thread;
pub mod user;

pub use error::{Error, ErrorKind, Result};
pub use id::{ActionId, DraftId, EmailId, ThreadId, UserId};
