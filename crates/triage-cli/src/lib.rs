//! Configuration and seeding for the `triage` binary.
//!
//! The binary itself only parses arguments and dispatches; everything worth
//! testing lives here.

pub mod config;
pub mod error;
pub mod seed;

pub use config::{AppConfig, StorageLocation};
pub use error::ConfigError;
