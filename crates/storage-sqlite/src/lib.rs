//! SQLite persistence for group history backups.
//!
//! All mutating SQL funnels through a single writer actor so batches commit
//! as one immediate transaction; reads go through an r2d2 pool. The
//! [`backup::BackupRepository`] implements the core `HistoryStore` trait and
//! [`analytics::AnalyticsRepository`] serves the read-only queries.

pub mod analytics;
pub mod backup;
pub mod db;
pub mod errors;
pub mod schema;

pub use errors::StorageError;
