//! Result models for the read-only analytics queries.
//!
//! The queries themselves live in the storage crate; these are the typed
//! rows they return.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message ranked by favorite count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopularMessage {
    pub message_id: String,
    pub text: Option<String>,
    pub sender_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub favorite_count: i64,
}

/// A sender ranked by message count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPoster {
    pub user_id: Option<String>,
    pub name: Option<String>,
    pub message_count: i64,
}

/// Message volume for one day of the week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekdayActivity {
    pub weekday: String,
    pub message_count: i64,
}

/// Longest run of consecutive messages by a single sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostingStreak {
    pub user_id: Option<String>,
    pub name: Option<String>,
    pub consecutive_count: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

/// A sender ranked by how many favorites their messages collected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikedUser {
    pub user_id: Option<String>,
    pub name: Option<String>,
    pub total_likes: i64,
}

/// Whole-group totals and date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupStatistics {
    pub group_name: String,
    pub total_messages: i64,
    pub total_users: i64,
    pub total_likes: i64,
    pub first_message_at: Option<DateTime<Utc>>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub avg_messages_per_day: f64,
    pub last_synced_at: Option<DateTime<Utc>>,
}
