//! Collaborator traits implemented by the API client and storage crates.

use async_trait::async_trait;

use crate::errors::Result;
use crate::sync::{BatchReport, GroupProfile, MessageRecord, PageCursor, SyncLogEntry};

/// Source of remote conversation history (the GroupMe API client).
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Fetch metadata for a single group.
    async fn fetch_group(&self, group_id: &str) -> Result<GroupProfile>;

    /// Fetch every group visible to the credential, across all pages.
    async fn fetch_all_groups(&self) -> Result<Vec<GroupProfile>>;

    /// Fetch one page of messages, newest-first as the API delivers them.
    ///
    /// `limit` is capped at [`crate::sync::MESSAGE_PAGE_LIMIT`] by
    /// implementations.
    async fn fetch_messages(
        &self,
        group_id: &str,
        cursor: PageCursor,
        limit: usize,
    ) -> Result<Vec<MessageRecord>>;
}

/// Durable store for groups, messages, and the sync audit log.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Load a group row, including its checkpoint fields.
    async fn load_group(&self, group_id: &str) -> Result<Option<GroupProfile>>;

    /// Insert a group row fetched from the API.
    async fn insert_group(&self, group: &GroupProfile) -> Result<()>;

    /// Persist a batch of records (oldest-first) through the entity-upsert
    /// layer and advance the group's checkpoint to the batch's last record,
    /// as one atomic unit. Records whose natural key already exists are
    /// skipped, not updated.
    async fn persist_batch(&self, group_id: &str, records: &[MessageRecord])
        -> Result<BatchReport>;

    /// Clear the group's checkpoint so the next sync performs a full
    /// bootstrap walk.
    async fn reset_checkpoint(&self, group_id: &str) -> Result<()>;

    /// Append one audit row. Never mutates existing rows.
    async fn append_sync_log(&self, entry: SyncLogEntry) -> Result<()>;
}
