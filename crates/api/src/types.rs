//! Wire types for the GroupMe v3 API and their conversions into domain
//! models.
//!
//! GroupMe wraps every payload in `{"response": ..., "meta": ...}`; we ignore
//! `meta` and deserialize only the envelope body. Timestamps come over the
//! wire as unix seconds and attachments as loosely-typed JSON objects keyed
//! by a `type` tag.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use groupvault_core::sync::{AttachmentPayload, GroupProfile, MessageRecord};

/// Standard `{"response": ...}` wrapper.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub response: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawGroup {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub creator_user_id: Option<String>,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
    #[serde(rename = "type")]
    pub group_type: Option<String>,
    pub share_url: Option<String>,
}

impl RawGroup {
    pub fn into_profile(self) -> GroupProfile {
        GroupProfile {
            id: self.id,
            name: self.name.unwrap_or_default(),
            description: self.description,
            image_url: self.image_url,
            creator_user_id: self.creator_user_id,
            created_at: self
                .created_at
                .and_then(from_unix_seconds)
                .unwrap_or_else(Utc::now),
            updated_at: self.updated_at.and_then(from_unix_seconds),
            group_type: self.group_type,
            share_url: self.share_url,
            last_synced_at: None,
            last_synced_message_id: None,
        }
    }
}

/// Body of the messages endpoint; `count` is redundant and ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct MessagesBody {
    #[serde(default)]
    pub messages: Vec<RawMessage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawMessage {
    pub id: String,
    pub source_guid: Option<String>,
    pub created_at: i64,
    pub user_id: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub text: Option<String>,
    #[serde(default)]
    pub system: bool,
    #[serde(default)]
    pub favorited_by: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<Value>,
}

impl RawMessage {
    pub fn into_record(self) -> MessageRecord {
        let attachments = self.attachments.iter().map(parse_attachment).collect();
        MessageRecord {
            id: self.id,
            source_guid: self.source_guid,
            user_id: self.user_id,
            created_at: from_unix_seconds(self.created_at).unwrap_or_default(),
            text: self.text,
            system: self.system,
            sender_name: self.name,
            sender_avatar_url: self.avatar_url,
            favorited_by: self.favorited_by,
            attachments,
        }
    }
}

fn from_unix_seconds(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0)
}

/// Classify one raw attachment object by its `type` tag.
///
/// Unknown tags are preserved as `Other` rather than dropped; every variant
/// keeps the raw JSON so fields we do not model survive into storage.
pub(crate) fn parse_attachment(raw: &Value) -> AttachmentPayload {
    let kind = raw.get("type").and_then(Value::as_str).unwrap_or("unknown");
    match kind {
        "image" => AttachmentPayload::Image {
            url: string_field(raw, "url"),
            raw: raw.clone(),
        },
        "location" => AttachmentPayload::Location {
            name: string_field(raw, "name"),
            latitude: numeric_field(raw, "lat"),
            longitude: numeric_field(raw, "lng"),
            raw: raw.clone(),
        },
        "split" => AttachmentPayload::SplitPayment {
            token: string_field(raw, "token"),
            raw: raw.clone(),
        },
        "emoji" => AttachmentPayload::Emoji {
            placeholder: string_field(raw, "placeholder"),
            charmap: raw.get("charmap").cloned(),
            raw: raw.clone(),
        },
        "mentions" => AttachmentPayload::Mentions {
            user_ids: raw
                .get("user_ids")
                .and_then(Value::as_array)
                .map(|ids| {
                    ids.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            loci: raw
                .get("loci")
                .and_then(Value::as_array)
                .map(|loci| loci.iter().map(parse_locus).collect())
                .unwrap_or_default(),
            raw: raw.clone(),
        },
        other => AttachmentPayload::Other {
            kind: other.to_string(),
            raw: raw.clone(),
        },
    }
}

fn string_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key).and_then(Value::as_str).map(str::to_string)
}

/// GroupMe serializes coordinates inconsistently: sometimes numbers,
/// sometimes numeric strings.
fn numeric_field(raw: &Value, key: &str) -> Option<f64> {
    match raw.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A well-formed locus is `[start, length]`; anything else becomes `None` so
/// positions stay index-aligned with `user_ids`.
fn parse_locus(value: &Value) -> Option<(i32, i32)> {
    let pair = value.as_array()?;
    if pair.len() != 2 {
        return None;
    }
    let start = pair[0].as_i64()?;
    let length = pair[1].as_i64()?;
    Some((i32::try_from(start).ok()?, i32::try_from(length).ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn image_attachment_keeps_url_and_raw_json() {
        let raw = json!({"type": "image", "url": "https://i.groupme.com/abc"});
        match parse_attachment(&raw) {
            AttachmentPayload::Image { url, raw: kept } => {
                assert_eq!(url.as_deref(), Some("https://i.groupme.com/abc"));
                assert_eq!(kept, raw);
            }
            other => panic!("expected image, got {:?}", other),
        }
    }

    #[test]
    fn location_coordinates_parse_from_strings_and_numbers() {
        let raw = json!({"type": "location", "name": "HQ", "lat": "44.97", "lng": -93.26});
        match parse_attachment(&raw) {
            AttachmentPayload::Location {
                name,
                latitude,
                longitude,
                ..
            } => {
                assert_eq!(name.as_deref(), Some("HQ"));
                assert_eq!(latitude, Some(44.97));
                assert_eq!(longitude, Some(-93.26));
            }
            other => panic!("expected location, got {:?}", other),
        }
    }

    #[test]
    fn mentions_keep_malformed_loci_as_none() {
        let raw = json!({
            "type": "mentions",
            "user_ids": ["u1", "u2", "u3"],
            "loci": [[0, 5], "bogus", [7]]
        });
        match parse_attachment(&raw) {
            AttachmentPayload::Mentions { user_ids, loci, .. } => {
                assert_eq!(user_ids, vec!["u1", "u2", "u3"]);
                assert_eq!(loci, vec![Some((0, 5)), None, None]);
            }
            other => panic!("expected mentions, got {:?}", other),
        }
    }

    #[test]
    fn unknown_attachment_type_is_preserved_as_other() {
        let raw = json!({"type": "poll", "poll_id": "p1"});
        match parse_attachment(&raw) {
            AttachmentPayload::Other { kind, raw: kept } => {
                assert_eq!(kind, "poll");
                assert_eq!(kept["poll_id"], "p1");
            }
            other => panic!("expected other, got {:?}", other),
        }
    }

    #[test]
    fn raw_message_converts_to_domain_record() {
        let raw: RawMessage = serde_json::from_value(json!({
            "id": "m1",
            "source_guid": "guid-1",
            "created_at": 1700000000,
            "user_id": "u1",
            "name": "Alice",
            "avatar_url": null,
            "text": "hello",
            "favorited_by": ["u2"],
            "attachments": [{"type": "image", "url": "https://i.groupme.com/x"}]
        }))
        .expect("deserialize message");

        let record = raw.into_record();
        assert_eq!(record.id, "m1");
        assert_eq!(record.created_at.timestamp(), 1_700_000_000);
        assert!(!record.system);
        assert_eq!(record.favorited_by, vec!["u2"]);
        assert_eq!(record.attachments.len(), 1);
    }

    #[test]
    fn raw_group_without_timestamps_defaults_created_at_to_now() {
        let raw: RawGroup = serde_json::from_value(json!({
            "id": "g1",
            "name": "Test Group",
            "type": "private"
        }))
        .expect("deserialize group");

        let before = Utc::now();
        let profile = raw.into_profile();
        assert_eq!(profile.id, "g1");
        assert_eq!(profile.group_type.as_deref(), Some("private"));
        assert!(profile.created_at >= before);
        assert!(profile.last_synced_message_id.is_none());
    }
}
