//! Core domain models and synchronization logic for groupvault.
//!
//! This crate owns the sync engine, the retry/orchestration layer, the error
//! taxonomy, and the traits (`MessageSource`, `HistoryStore`) implemented by
//! the API client and storage crates. It performs no HTTP and no SQL itself;
//! collaborators are constructor-injected, which keeps the engine testable
//! against in-memory fakes.

pub mod analytics;
pub mod errors;
pub mod sync;

pub use errors::{Error, Result};
