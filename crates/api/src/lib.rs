//! GroupMe API client with sliding-window rate limiting.
//!
//! Wraps the GroupMe v3 REST endpoints for group listing, group detail, and
//! message pagination. Responses are classified into the error taxonomy of
//! [`groupvault_core::errors::ApiError`]; 5xx responses are retried here with
//! bounded exponential backoff, while 429 surfaces to the caller so the
//! orchestrator's coarser policy governs pacing.

mod client;
mod rate_limit;
mod types;

pub use client::{GroupMeClient, GroupMeClientConfig};
pub use rate_limit::SlidingWindowLimiter;
