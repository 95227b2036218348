//! Database models for the backup tables.
//!
//! Timestamps are stored as RFC 3339 TEXT; conversions to and from the
//! domain models live next to each struct.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use groupvault_core::sync::{GroupProfile, SyncLogEntry};

pub(crate) fn to_db_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339()
}

pub(crate) fn parse_db_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

fn parse_optional_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    value.map(parse_db_timestamp)
}

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(table_name = crate::schema::groups)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct GroupDB {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub creator_user_id: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub group_type: Option<String>,
    pub share_url: Option<String>,
    pub last_synced_at: Option<String>,
    pub last_synced_message_id: Option<String>,
}

impl From<GroupDB> for GroupProfile {
    fn from(db: GroupDB) -> Self {
        GroupProfile {
            id: db.id,
            name: db.name,
            description: db.description,
            image_url: db.image_url,
            creator_user_id: db.creator_user_id,
            created_at: parse_db_timestamp(&db.created_at),
            updated_at: parse_optional_timestamp(db.updated_at.as_deref()),
            group_type: db.group_type,
            share_url: db.share_url,
            last_synced_at: parse_optional_timestamp(db.last_synced_at.as_deref()),
            last_synced_message_id: db.last_synced_message_id,
        }
    }
}

impl From<&GroupProfile> for GroupDB {
    fn from(group: &GroupProfile) -> Self {
        GroupDB {
            id: group.id.clone(),
            name: group.name.clone(),
            description: group.description.clone(),
            image_url: group.image_url.clone(),
            creator_user_id: group.creator_user_id.clone(),
            created_at: to_db_timestamp(&group.created_at),
            updated_at: group.updated_at.as_ref().map(to_db_timestamp),
            group_type: group.group_type.clone(),
            share_url: group.share_url.clone(),
            last_synced_at: group.last_synced_at.as_ref().map(to_db_timestamp),
            last_synced_message_id: group.last_synced_message_id.clone(),
        }
    }
}

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct UserDB {
    pub id: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    /// Set once when the user is first observed, never updated afterwards.
    pub first_seen_at: String,
    pub last_seen_at: String,
}

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(table_name = crate::schema::messages)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MessageDB {
    pub id: String,
    pub group_id: String,
    pub user_id: Option<String>,
    pub source_guid: Option<String>,
    pub created_at: String,
    pub text: Option<String>,
    pub system: bool,
    pub sender_name: Option<String>,
    pub sender_avatar_url: Option<String>,
}

#[derive(Queryable, Identifiable, Insertable, Selectable, Debug, Clone)]
#[diesel(primary_key(message_id, user_id))]
#[diesel(table_name = crate::schema::message_favorites)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct FavoriteDB {
    pub message_id: String,
    pub user_id: String,
}

#[derive(Queryable, Identifiable, Selectable, Debug, Clone)]
#[diesel(table_name = crate::schema::attachments)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AttachmentDB {
    pub id: i32,
    pub message_id: String,
    pub kind: String,
    pub url: Option<String>,
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub token: Option<String>,
    pub placeholder: Option<String>,
    pub charmap: Option<String>,
    pub raw: String,
}

#[derive(Insertable, Debug, Clone, Default)]
#[diesel(table_name = crate::schema::attachments)]
pub struct NewAttachmentDB {
    pub message_id: String,
    pub kind: String,
    pub url: Option<String>,
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub token: Option<String>,
    pub placeholder: Option<String>,
    pub charmap: Option<String>,
    pub raw: String,
}

#[derive(Queryable, Identifiable, Selectable, Debug, Clone)]
#[diesel(table_name = crate::schema::mentions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MentionDB {
    pub id: i32,
    pub message_id: String,
    pub user_id: String,
    pub start_index: Option<i32>,
    pub length: Option<i32>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::mentions)]
pub struct NewMentionDB {
    pub message_id: String,
    pub user_id: String,
    pub start_index: Option<i32>,
    pub length: Option<i32>,
}

#[derive(Queryable, Identifiable, Selectable, Debug, Clone)]
#[diesel(table_name = crate::schema::sync_logs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SyncLogDB {
    pub id: i32,
    pub group_id: Option<String>,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub messages_fetched: i64,
    pub status: String,
    pub error_message: Option<String>,
    pub sync_kind: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::sync_logs)]
pub struct NewSyncLogDB {
    pub group_id: Option<String>,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub messages_fetched: i64,
    pub status: String,
    pub error_message: Option<String>,
    pub sync_kind: String,
}

impl From<SyncLogEntry> for NewSyncLogDB {
    fn from(entry: SyncLogEntry) -> Self {
        NewSyncLogDB {
            group_id: entry.group_id,
            started_at: to_db_timestamp(&entry.started_at),
            completed_at: entry.completed_at.as_ref().map(to_db_timestamp),
            messages_fetched: entry.messages_fetched,
            status: entry.status.as_str().to_string(),
            error_message: entry.error_message,
            sync_kind: entry.sync_kind.as_str().to_string(),
        }
    }
}
