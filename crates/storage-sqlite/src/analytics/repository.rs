//! Analytics over stored history.
//!
//! These queries lean on SQL (aggregation, window functions) rather than
//! loading rows into memory, so they run as raw statements with typed rows.

use std::sync::Arc;

use chrono::{Duration, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Nullable, Text};

use groupvault_core::analytics::{
    GroupStatistics, LikedUser, PopularMessage, PostingStreak, TopPoster, WeekdayActivity,
};
use groupvault_core::errors::Result;

use crate::backup::{parse_db_timestamp, to_db_timestamp, GroupDB};
use crate::db::{get_connection, DbPool};
use crate::errors::StorageError;
use crate::schema::groups;

pub struct AnalyticsRepository {
    pool: Arc<DbPool>,
}

/// RFC 3339 lower bound for a `days`-long look-back window.
fn window_start(days: i64) -> String {
    to_db_timestamp(&(Utc::now() - Duration::days(days)))
}

#[derive(QueryableByName)]
struct PopularMessageRow {
    #[diesel(sql_type = Text)]
    message_id: String,
    #[diesel(sql_type = Nullable<Text>)]
    text: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    sender_name: Option<String>,
    #[diesel(sql_type = Text)]
    created_at: String,
    #[diesel(sql_type = BigInt)]
    favorite_count: i64,
}

#[derive(QueryableByName)]
struct TopPosterRow {
    #[diesel(sql_type = Nullable<Text>)]
    user_id: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    name: Option<String>,
    #[diesel(sql_type = BigInt)]
    message_count: i64,
}

#[derive(QueryableByName)]
struct LikedUserRow {
    #[diesel(sql_type = Nullable<Text>)]
    user_id: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    name: Option<String>,
    #[diesel(sql_type = BigInt)]
    total_likes: i64,
}

#[derive(QueryableByName)]
struct WeekdayActivityRow {
    #[diesel(sql_type = Text)]
    weekday: String,
    #[diesel(sql_type = BigInt)]
    message_count: i64,
}

#[derive(QueryableByName)]
struct PostingStreakRow {
    #[diesel(sql_type = Nullable<Text>)]
    user_id: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    name: Option<String>,
    #[diesel(sql_type = BigInt)]
    consecutive_count: i64,
    #[diesel(sql_type = Text)]
    started_at: String,
    #[diesel(sql_type = Text)]
    ended_at: String,
}

#[derive(QueryableByName)]
struct GroupTotalsRow {
    #[diesel(sql_type = BigInt)]
    total_messages: i64,
    #[diesel(sql_type = BigInt)]
    total_users: i64,
    #[diesel(sql_type = Nullable<Text>)]
    first_message_at: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    last_message_at: Option<String>,
}

#[derive(QueryableByName)]
struct LikeTotalRow {
    #[diesel(sql_type = BigInt)]
    total_likes: i64,
}

impl AnalyticsRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        AnalyticsRepository { pool }
    }

    /// Messages from the last `days` days ranked by favorite count. System
    /// messages and messages with no favorites are omitted.
    pub fn most_popular_messages(
        &self,
        group_id: &str,
        days: i64,
        limit: i64,
    ) -> Result<Vec<PopularMessage>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = diesel::sql_query(
            "SELECT m.id AS message_id, m.text, m.sender_name, m.created_at, \
                    COUNT(f.user_id) AS favorite_count \
             FROM messages m \
             JOIN message_favorites f ON f.message_id = m.id \
             WHERE m.group_id = ? AND m.system = 0 AND m.created_at >= ? \
             GROUP BY m.id, m.text, m.sender_name, m.created_at \
             ORDER BY favorite_count DESC, m.created_at ASC \
             LIMIT ?",
        )
        .bind::<Text, _>(group_id)
        .bind::<Text, _>(window_start(days))
        .bind::<BigInt, _>(limit)
        .load::<PopularMessageRow>(&mut conn)
        .map_err(StorageError::from)?;

        Ok(rows
            .into_iter()
            .map(|row| PopularMessage {
                message_id: row.message_id,
                text: row.text,
                sender_name: row.sender_name,
                created_at: parse_db_timestamp(&row.created_at),
                favorite_count: row.favorite_count,
            })
            .collect())
    }

    /// Senders ranked by message count in the last `days` days, system
    /// messages excluded. The name prefers the live user row and falls back
    /// to the message snapshot.
    pub fn top_posters(&self, group_id: &str, days: i64, limit: i64) -> Result<Vec<TopPoster>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = diesel::sql_query(
            "SELECT m.user_id, COALESCE(u.name, m.sender_name) AS name, \
                    COUNT(*) AS message_count \
             FROM messages m \
             LEFT JOIN users u ON u.id = m.user_id \
             WHERE m.group_id = ? AND m.system = 0 AND m.created_at >= ? \
             GROUP BY m.user_id, name \
             ORDER BY message_count DESC \
             LIMIT ?",
        )
        .bind::<Text, _>(group_id)
        .bind::<Text, _>(window_start(days))
        .bind::<BigInt, _>(limit)
        .load::<TopPosterRow>(&mut conn)
        .map_err(StorageError::from)?;

        Ok(rows
            .into_iter()
            .map(|row| TopPoster {
                user_id: row.user_id,
                name: row.name,
                message_count: row.message_count,
            })
            .collect())
    }

    /// Senders ranked by favorites received on their messages in the last
    /// `days` days.
    pub fn most_liked_users(
        &self,
        group_id: &str,
        days: i64,
        limit: i64,
    ) -> Result<Vec<LikedUser>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = diesel::sql_query(
            "SELECT m.user_id, COALESCE(u.name, m.sender_name) AS name, \
                    COUNT(f.user_id) AS total_likes \
             FROM messages m \
             JOIN message_favorites f ON f.message_id = m.id \
             LEFT JOIN users u ON u.id = m.user_id \
             WHERE m.group_id = ? AND m.system = 0 AND m.created_at >= ? \
                   AND m.user_id IS NOT NULL \
             GROUP BY m.user_id, name \
             ORDER BY total_likes DESC \
             LIMIT ?",
        )
        .bind::<Text, _>(group_id)
        .bind::<Text, _>(window_start(days))
        .bind::<BigInt, _>(limit)
        .load::<LikedUserRow>(&mut conn)
        .map_err(StorageError::from)?;

        Ok(rows
            .into_iter()
            .map(|row| LikedUser {
                user_id: row.user_id,
                name: row.name,
                total_likes: row.total_likes,
            })
            .collect())
    }

    /// Message volume bucketed by day of week, Sunday first.
    pub fn activity_by_weekday(&self, group_id: &str) -> Result<Vec<WeekdayActivity>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = diesel::sql_query(
            "SELECT CASE strftime('%w', m.created_at) \
                    WHEN '0' THEN 'Sunday' \
                    WHEN '1' THEN 'Monday' \
                    WHEN '2' THEN 'Tuesday' \
                    WHEN '3' THEN 'Wednesday' \
                    WHEN '4' THEN 'Thursday' \
                    WHEN '5' THEN 'Friday' \
                    ELSE 'Saturday' END AS weekday, \
                    COUNT(*) AS message_count \
             FROM messages m \
             WHERE m.group_id = ? \
             GROUP BY strftime('%w', m.created_at) \
             ORDER BY strftime('%w', m.created_at)",
        )
        .bind::<Text, _>(group_id)
        .load::<WeekdayActivityRow>(&mut conn)
        .map_err(StorageError::from)?;

        Ok(rows
            .into_iter()
            .map(|row| WeekdayActivity {
                weekday: row.weekday,
                message_count: row.message_count,
            })
            .collect())
    }

    /// Longest run of consecutive messages by one sender, found with the
    /// classic gaps-and-islands row-number difference.
    pub fn longest_posting_streak(&self, group_id: &str) -> Result<Option<PostingStreak>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = diesel::sql_query(
            "WITH ordered AS ( \
                 SELECT m.user_id, m.created_at, \
                        ROW_NUMBER() OVER (ORDER BY m.created_at, m.id) AS rn, \
                        ROW_NUMBER() OVER (PARTITION BY m.user_id \
                                           ORDER BY m.created_at, m.id) AS rn_user \
                 FROM messages m \
                 WHERE m.group_id = ? AND m.user_id IS NOT NULL AND m.system = 0 \
             ), runs AS ( \
                 SELECT user_id, COUNT(*) AS consecutive_count, \
                        MIN(created_at) AS started_at, MAX(created_at) AS ended_at \
                 FROM ordered \
                 GROUP BY user_id, rn - rn_user \
             ) \
             SELECT r.user_id, u.name, r.consecutive_count, r.started_at, r.ended_at \
             FROM runs r \
             LEFT JOIN users u ON u.id = r.user_id \
             ORDER BY r.consecutive_count DESC, r.started_at ASC \
             LIMIT 1",
        )
        .bind::<Text, _>(group_id)
        .load::<PostingStreakRow>(&mut conn)
        .map_err(StorageError::from)?;

        Ok(rows.into_iter().next().map(|row| PostingStreak {
            user_id: row.user_id,
            name: row.name,
            consecutive_count: row.consecutive_count,
            started_at: parse_db_timestamp(&row.started_at),
            ended_at: parse_db_timestamp(&row.ended_at),
        }))
    }

    /// Whole-group totals, date range, and posting pace. `None` when the
    /// group is not stored. System messages are excluded from message and
    /// user counts.
    pub fn group_statistics(&self, group_id: &str) -> Result<Option<GroupStatistics>> {
        let mut conn = get_connection(&self.pool)?;
        let group = groups::table
            .find(group_id)
            .first::<GroupDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        let Some(group) = group else {
            return Ok(None);
        };

        let totals = diesel::sql_query(
            "SELECT COUNT(*) AS total_messages, \
                    COUNT(DISTINCT m.user_id) AS total_users, \
                    MIN(m.created_at) AS first_message_at, \
                    MAX(m.created_at) AS last_message_at \
             FROM messages m \
             WHERE m.group_id = ? AND m.system = 0",
        )
        .bind::<Text, _>(group_id)
        .get_result::<GroupTotalsRow>(&mut conn)
        .map_err(StorageError::from)?;

        let likes = diesel::sql_query(
            "SELECT COUNT(*) AS total_likes \
             FROM message_favorites f \
             JOIN messages m ON m.id = f.message_id \
             WHERE m.group_id = ?",
        )
        .bind::<Text, _>(group_id)
        .get_result::<LikeTotalRow>(&mut conn)
        .map_err(StorageError::from)?;

        let first_message_at = totals.first_message_at.as_deref().map(parse_db_timestamp);
        let last_message_at = totals.last_message_at.as_deref().map(parse_db_timestamp);
        let avg_messages_per_day = match (first_message_at, last_message_at) {
            (Some(first), Some(last)) => {
                let days_span = (last - first).num_days() + 1;
                totals.total_messages as f64 / days_span as f64
            }
            _ => 0.0,
        };

        Ok(Some(GroupStatistics {
            group_name: group.name,
            total_messages: totals.total_messages,
            total_users: totals.total_users,
            total_likes: likes.total_likes,
            first_message_at,
            last_message_at,
            avg_messages_per_day,
            last_synced_at: group.last_synced_at.as_deref().map(parse_db_timestamp),
        }))
    }
}
