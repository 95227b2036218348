//! Backup storage: groups, users, messages, favorites, attachments,
//! mentions, and the sync audit log.

mod model;
mod repository;
mod upsert;

pub use model::{GroupDB, MessageDB, SyncLogDB, UserDB};
pub use repository::BackupRepository;

pub(crate) use model::{parse_db_timestamp, to_db_timestamp};
