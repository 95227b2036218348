//! Per-record upsert steps, all running on the writer connection inside the
//! surrounding batch transaction.

use std::collections::HashSet;

use chrono::Utc;
use diesel::dsl::{exists, select};
use diesel::prelude::*;

use groupvault_core::errors::Result;
use groupvault_core::sync::{AttachmentPayload, MessageRecord};

use crate::errors::StorageError;
use crate::schema::{attachments, mentions, message_favorites, messages, users};

use super::model::{
    to_db_timestamp, FavoriteDB, MessageDB, NewAttachmentDB, NewMentionDB, UserDB,
};

/// Insert one record with all of its satellite rows.
///
/// Returns `false` without writing anything when a message with this id is
/// already stored; re-delivered records are the normal case when resuming a
/// bootstrap.
pub(crate) fn upsert_record(
    conn: &mut SqliteConnection,
    group_id: &str,
    record: &MessageRecord,
) -> Result<bool> {
    if let Some(user_id) = &record.user_id {
        upsert_user(
            conn,
            user_id,
            record.sender_name.as_deref(),
            record.sender_avatar_url.as_deref(),
        )?;
    }

    let already_stored: bool = select(exists(
        messages::table.filter(messages::id.eq(&record.id)),
    ))
    .get_result(conn)
    .map_err(StorageError::from)?;
    if already_stored {
        return Ok(false);
    }

    let message = MessageDB {
        id: record.id.clone(),
        group_id: group_id.to_string(),
        user_id: record.user_id.clone(),
        source_guid: record.source_guid.clone(),
        created_at: to_db_timestamp(&record.created_at),
        text: record.text.clone(),
        system: record.system,
        sender_name: record.sender_name.clone(),
        sender_avatar_url: record.sender_avatar_url.clone(),
    };
    diesel::insert_into(messages::table)
        .values(&message)
        .execute(conn)
        .map_err(StorageError::from)?;

    insert_favorites(conn, record)?;
    insert_attachments(conn, record)?;

    Ok(true)
}

/// Last-write-wins user upsert: present values overwrite, absent values keep
/// whatever the row already holds. `first_seen_at` is written once on insert;
/// every later sighting only refreshes `last_seen_at`.
fn upsert_user(
    conn: &mut SqliteConnection,
    user_id: &str,
    name: Option<&str>,
    avatar_url: Option<&str>,
) -> Result<()> {
    let now = to_db_timestamp(&Utc::now());
    let existing = users::table
        .find(user_id)
        .first::<UserDB>(conn)
        .optional()
        .map_err(StorageError::from)?;

    match existing {
        Some(mut user) => {
            if name.is_some() {
                user.name = name.map(str::to_string);
            }
            if avatar_url.is_some() {
                user.avatar_url = avatar_url.map(str::to_string);
            }
            user.last_seen_at = now;
            diesel::update(users::table.find(user_id))
                .set((
                    users::name.eq(&user.name),
                    users::avatar_url.eq(&user.avatar_url),
                    users::last_seen_at.eq(&user.last_seen_at),
                ))
                .execute(conn)
                .map_err(StorageError::from)?;
        }
        None => {
            let user = UserDB {
                id: user_id.to_string(),
                name: name.map(str::to_string),
                avatar_url: avatar_url.map(str::to_string),
                first_seen_at: now.clone(),
                last_seen_at: now,
            };
            diesel::insert_into(users::table)
                .values(&user)
                .execute(conn)
                .map_err(StorageError::from)?;
        }
    }
    Ok(())
}

/// Insert a bare user row if the id is unknown, leaving existing rows alone.
/// Used for ids that appear only as favoriters or mention targets.
fn ensure_placeholder_user(conn: &mut SqliteConnection, user_id: &str) -> Result<()> {
    let now = to_db_timestamp(&Utc::now());
    let user = UserDB {
        id: user_id.to_string(),
        name: None,
        avatar_url: None,
        first_seen_at: now.clone(),
        last_seen_at: now,
    };
    diesel::insert_into(users::table)
        .values(&user)
        .on_conflict(users::id)
        .do_nothing()
        .execute(conn)
        .map_err(StorageError::from)?;
    Ok(())
}

fn insert_favorites(conn: &mut SqliteConnection, record: &MessageRecord) -> Result<()> {
    let mut seen = HashSet::new();
    for user_id in &record.favorited_by {
        if !seen.insert(user_id.as_str()) {
            continue;
        }
        ensure_placeholder_user(conn, user_id)?;
        let edge = FavoriteDB {
            message_id: record.id.clone(),
            user_id: user_id.clone(),
        };
        diesel::insert_into(message_favorites::table)
            .values(&edge)
            .on_conflict((message_favorites::message_id, message_favorites::user_id))
            .do_nothing()
            .execute(conn)
            .map_err(StorageError::from)?;
    }
    Ok(())
}

fn insert_attachments(conn: &mut SqliteConnection, record: &MessageRecord) -> Result<()> {
    for payload in &record.attachments {
        match payload {
            // Mentions become mention rows, never attachment rows.
            AttachmentPayload::Mentions { user_ids, loci, .. } => {
                for (index, user_id) in user_ids.iter().enumerate() {
                    ensure_placeholder_user(conn, user_id)?;
                    let locus = loci.get(index).copied().flatten();
                    let mention = NewMentionDB {
                        message_id: record.id.clone(),
                        user_id: user_id.clone(),
                        start_index: locus.map(|(start, _)| start),
                        length: locus.map(|(_, length)| length),
                    };
                    diesel::insert_into(mentions::table)
                        .values(&mention)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
            }
            other => {
                let row = attachment_row(&record.id, other)?;
                diesel::insert_into(attachments::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
            }
        }
    }
    Ok(())
}

fn attachment_row(message_id: &str, payload: &AttachmentPayload) -> Result<NewAttachmentDB> {
    let mut row = NewAttachmentDB {
        message_id: message_id.to_string(),
        ..Default::default()
    };
    match payload {
        AttachmentPayload::Image { url, raw } => {
            row.kind = "image".to_string();
            row.url = url.clone();
            row.raw = serde_json::to_string(raw)?;
        }
        AttachmentPayload::Location {
            name,
            latitude,
            longitude,
            raw,
        } => {
            row.kind = "location".to_string();
            row.name = name.clone();
            row.latitude = *latitude;
            row.longitude = *longitude;
            row.raw = serde_json::to_string(raw)?;
        }
        AttachmentPayload::SplitPayment { token, raw } => {
            row.kind = "split".to_string();
            row.token = token.clone();
            row.raw = serde_json::to_string(raw)?;
        }
        AttachmentPayload::Emoji {
            placeholder,
            charmap,
            raw,
        } => {
            row.kind = "emoji".to_string();
            row.placeholder = placeholder.clone();
            row.charmap = charmap
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            row.raw = serde_json::to_string(raw)?;
        }
        AttachmentPayload::Other { kind, raw } => {
            row.kind = kind.clone();
            row.raw = serde_json::to_string(raw)?;
        }
        AttachmentPayload::Mentions { .. } => {
            unreachable!("mentions are expanded into mention rows")
        }
    }
    Ok(row)
}
