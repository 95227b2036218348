//! Domain models for group history synchronization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum messages per API page (GroupMe caps `limit` at 100).
pub const MESSAGE_PAGE_LIMIT: usize = 100;

/// Records per checkpointed commit in the default (safety) mode.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Records per checkpointed commit in fast mode. Larger batches trade a
/// wider re-fetchable loss window on interruption for throughput.
pub const FAST_BATCH_SIZE: usize = 5000;

/// Group metadata together with the sync checkpoint.
///
/// `last_synced_message_id`, when set, always references a message already
/// durably persisted for this group. Only the engine's batch commit mutates
/// the checkpoint fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupProfile {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub creator_user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub group_type: Option<String>,
    pub share_url: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_synced_message_id: Option<String>,
}

/// One message as fetched from the API, already validated at the boundary.
///
/// `sender_name`/`sender_avatar_url` are the sender's display values at send
/// time and are persisted denormalized on the message row, independent of the
/// live user row which is overwritten last-write-wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: String,
    pub source_guid: Option<String>,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub text: Option<String>,
    pub system: bool,
    pub sender_name: Option<String>,
    pub sender_avatar_url: Option<String>,
    pub favorited_by: Vec<String>,
    pub attachments: Vec<AttachmentPayload>,
}

/// Attachment payload, parsed once on ingestion into a tagged union.
///
/// Every variant carries the raw JSON value so unknown fields survive into
/// storage. A `Mentions` payload is never stored as an attachment row; the
/// upsert layer expands it into mention rows instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "payload_kind", rename_all = "snake_case")]
pub enum AttachmentPayload {
    Image {
        url: Option<String>,
        raw: Value,
    },
    Location {
        name: Option<String>,
        latitude: Option<f64>,
        longitude: Option<f64>,
        raw: Value,
    },
    SplitPayment {
        token: Option<String>,
        raw: Value,
    },
    Emoji {
        placeholder: Option<String>,
        charmap: Option<Value>,
        raw: Value,
    },
    Mentions {
        user_ids: Vec<String>,
        /// Positional `(start, length)` descriptors; `None` where the loci
        /// entry at the same index was missing or malformed.
        loci: Vec<Option<(i32, i32)>>,
        raw: Value,
    },
    Other {
        kind: String,
        raw: Value,
    },
}

/// Pagination cursor for a message fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCursor {
    /// Newest page, no cursor.
    Start,
    /// Messages strictly older than this id (bootstrap walk).
    Before(String),
    /// Messages strictly newer than this id (incremental fetch).
    Since(String),
}

/// Outcome of one checkpointed batch commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Records newly inserted by this batch.
    pub inserted: usize,
    /// Records skipped because their natural key already existed.
    pub skipped: usize,
}

/// Status of a sync attempt in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Running,
    Completed,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Kind of sync that produced an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncKind {
    Incremental,
    Full,
}

impl SyncKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incremental => "incremental",
            Self::Full => "full",
        }
    }
}

/// One append-only audit row per sync attempt.
///
/// `group_id` is optional because a failed attempt may predate the group row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncLogEntry {
    pub group_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub messages_fetched: i64,
    pub status: SyncStatus,
    pub error_message: Option<String>,
    pub sync_kind: SyncKind,
}

/// Per-group result reported by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub messages_fetched: usize,
    pub error: Option<String>,
}

impl SyncReport {
    pub fn succeeded(messages_fetched: usize) -> Self {
        Self {
            messages_fetched,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            messages_fetched: 0,
            error: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}
