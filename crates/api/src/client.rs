//! GroupMe REST client.
//!
//! Every request passes through the sliding-window limiter before it is sent,
//! including transport-level retries. 5xx responses are retried here with
//! exponential backoff and jitter; 429 and the terminal classes surface
//! immediately so the orchestrator decides pacing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use rand::Rng;
use serde_json::Value;
use tokio::time::sleep;

use groupvault_core::errors::{ApiError, Result};
use groupvault_core::sync::{
    GroupProfile, MessageRecord, MessageSource, PageCursor, MESSAGE_PAGE_LIMIT,
};

use crate::rate_limit::SlidingWindowLimiter;
use crate::types::{Envelope, MessagesBody, RawGroup, RawMessage};

/// Public GroupMe v3 endpoint.
const DEFAULT_BASE_URL: &str = "https://api.groupme.com/v3";
/// Default request timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// GroupMe allows roughly this many calls per minute per token.
const DEFAULT_RATE_LIMIT_CALLS: usize = 100;
const DEFAULT_RATE_LIMIT_PERIOD: Duration = Duration::from_secs(60);
/// Group listing page size; also the short-page stop condition.
const GROUPS_PAGE_SIZE: usize = 100;
const MAX_LOG_BODY_CHARS: usize = 512;
const TRANSPORT_MAX_ATTEMPTS: usize = 3;
const TRANSPORT_BASE_BACKOFF_MS: u64 = 500;
const TRANSPORT_MAX_BACKOFF_MS: u64 = 8_000;

fn backoff_with_jitter(attempt: usize) -> Duration {
    let exp = (attempt.saturating_sub(1) as u32).min(8);
    let backoff =
        (TRANSPORT_BASE_BACKOFF_MS.saturating_mul(1_u64 << exp)).min(TRANSPORT_MAX_BACKOFF_MS);
    let jitter = rand::thread_rng().gen_range(0..=(backoff / 5).max(1));
    Duration::from_millis(backoff.saturating_add(jitter))
}

fn body_preview(body: &str) -> String {
    let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
    if body.chars().count() > MAX_LOG_BODY_CHARS {
        preview.push_str("...");
    }
    preview
}

/// Configuration for [`GroupMeClient`].
#[derive(Debug, Clone)]
pub struct GroupMeClientConfig {
    pub access_token: String,
    pub base_url: String,
    pub rate_limit_calls: usize,
    pub rate_limit_period: Duration,
}

impl GroupMeClientConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            rate_limit_calls: DEFAULT_RATE_LIMIT_CALLS,
            rate_limit_period: DEFAULT_RATE_LIMIT_PERIOD,
        }
    }
}

/// Rate-limited client for the GroupMe v3 API.
#[derive(Debug, Clone)]
pub struct GroupMeClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
    limiter: Arc<SlidingWindowLimiter>,
}

impl GroupMeClient {
    pub fn new(config: GroupMeClientConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token,
            limiter: Arc::new(SlidingWindowLimiter::new(
                config.rate_limit_calls,
                config.rate_limit_period,
            )),
        }
    }

    /// GET a JSON endpoint. `Ok(None)` means HTTP 304 (nothing new).
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Option<Value>> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 1_usize;

        loop {
            // Each attempt counts against the window, retries included.
            self.limiter.acquire().await;

            let send_result = self
                .client
                .get(&url)
                .query(&[("token", self.access_token.as_str())])
                .query(query)
                .send()
                .await;

            let response = match send_result {
                Ok(response) => response,
                Err(err) => {
                    return Err(ApiError::Other {
                        status: err.status().map(|s| s.as_u16()),
                        message: format!("Request to {} failed: {}", path, err),
                    }
                    .into());
                }
            };

            let status = response.status().as_u16();
            if status == 304 {
                debug!("GET {} -> 304 Not Modified", path);
                return Ok(None);
            }

            let body = response.text().await.map_err(|err| ApiError::Other {
                status: Some(status),
                message: format!("Could not read response body: {}", err),
            })?;

            match status {
                200 => {
                    debug!("GET {} -> 200 ({} bytes)", path, body.len());
                    return Ok(Some(serde_json::from_str(&body)?));
                }
                401 => {
                    return Err(ApiError::Authentication(
                        "Invalid or expired access token".to_string(),
                    )
                    .into());
                }
                404 => {
                    return Err(ApiError::NotFound(format!("{} does not exist", path)).into());
                }
                429 => {
                    return Err(ApiError::RateLimitExceeded(format!(
                        "GET {} rejected: {}",
                        path,
                        body_preview(&body)
                    ))
                    .into());
                }
                500..=599 => {
                    if attempt < TRANSPORT_MAX_ATTEMPTS {
                        let backoff = backoff_with_jitter(attempt);
                        warn!(
                            "GET {} -> {} (attempt {}/{}), retrying in {:?}",
                            path, status, attempt, TRANSPORT_MAX_ATTEMPTS, backoff
                        );
                        sleep(backoff).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(ApiError::Server(format!(
                        "GET {} returned {} after {} attempts: {}",
                        path,
                        status,
                        TRANSPORT_MAX_ATTEMPTS,
                        body_preview(&body)
                    ))
                    .into());
                }
                other => {
                    return Err(ApiError::Other {
                        status: Some(other),
                        message: format!("GET {} returned {}: {}", path, other, body_preview(&body)),
                    }
                    .into());
                }
            }
        }
    }

    /// Fetch one group's metadata.
    ///
    /// GET /groups/{group_id}
    pub async fn get_group(&self, group_id: &str) -> Result<GroupProfile> {
        let path = format!("/groups/{}", group_id);
        let value = self
            .get_json(&path, &[])
            .await?
            .ok_or_else(|| ApiError::Other {
                status: Some(304),
                message: format!("Unexpected 304 for {}", path),
            })?;
        let envelope: Envelope<RawGroup> = serde_json::from_value(value)?;
        Ok(envelope.response.into_profile())
    }

    /// Fetch one page of the group listing.
    ///
    /// GET /groups?page={page}&per_page=100&omit=memberships
    pub async fn get_groups(&self, page: usize) -> Result<Vec<GroupProfile>> {
        let query = [
            ("page", page.to_string()),
            ("per_page", GROUPS_PAGE_SIZE.to_string()),
            ("omit", "memberships".to_string()),
        ];
        let Some(value) = self.get_json("/groups", &query).await? else {
            return Ok(Vec::new());
        };
        let envelope: Envelope<Vec<RawGroup>> = serde_json::from_value(value)?;
        Ok(envelope
            .response
            .into_iter()
            .map(RawGroup::into_profile)
            .collect())
    }

    /// Fetch the complete group listing, paging until a short page.
    pub async fn get_all_groups(&self) -> Result<Vec<GroupProfile>> {
        let mut groups = Vec::new();
        let mut page = 1_usize;
        loop {
            let batch = self.get_groups(page).await?;
            let exhausted = batch.len() < GROUPS_PAGE_SIZE;
            groups.extend(batch);
            if exhausted {
                break;
            }
            page += 1;
        }
        Ok(groups)
    }

    /// Fetch one page of messages for a group, newest first.
    ///
    /// GET /groups/{group_id}/messages with `before_id`/`since_id` per the
    /// cursor. A 304 (nothing new, or cursor past the oldest message) is an
    /// empty page.
    pub async fn get_messages(
        &self,
        group_id: &str,
        cursor: &PageCursor,
        limit: usize,
    ) -> Result<Vec<MessageRecord>> {
        let path = format!("/groups/{}/messages", group_id);
        let mut query = vec![("limit", limit.clamp(1, MESSAGE_PAGE_LIMIT).to_string())];
        match cursor {
            PageCursor::Start => {}
            PageCursor::Before(id) => query.push(("before_id", id.clone())),
            PageCursor::Since(id) => query.push(("since_id", id.clone())),
        }

        let Some(value) = self.get_json(&path, &query).await? else {
            return Ok(Vec::new());
        };
        let envelope: Envelope<MessagesBody> = serde_json::from_value(value)?;
        Ok(envelope
            .response
            .messages
            .into_iter()
            .map(RawMessage::into_record)
            .collect())
    }
}

#[async_trait]
impl MessageSource for GroupMeClient {
    async fn fetch_group(&self, group_id: &str) -> Result<GroupProfile> {
        self.get_group(group_id).await
    }

    async fn fetch_all_groups(&self) -> Result<Vec<GroupProfile>> {
        self.get_all_groups().await
    }

    async fn fetch_messages(
        &self,
        group_id: &str,
        cursor: PageCursor,
        limit: usize,
    ) -> Result<Vec<MessageRecord>> {
        self.get_messages(group_id, &cursor, limit).await
    }
}
