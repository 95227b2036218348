//! Error types shared across the groupvault crates.

use thiserror::Error;

/// Result type alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// GroupMe API failure, classified by the client.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Storage failure.
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// GroupMe API error taxonomy.
///
/// `Authentication` and `NotFound` are configuration/programming errors and
/// are never retried. `RateLimitExceeded` and `Other` are retried by the
/// orchestrator's coarse policy. `Server` errors are retried inside the
/// client transport and surface here only once those attempts are exhausted.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid or expired access token (HTTP 401).
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Resource does not exist (HTTP 404).
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The API rejected the call for exceeding its rate limit (HTTP 429).
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Server-side failure (HTTP 5xx) that outlived the transport retries.
    #[error("Server error: {0}")]
    Server(String),

    /// Any other API or transport failure, with the HTTP status if one was
    /// received.
    #[error("API error: {message}")]
    Other { status: Option<u16>, message: String },
}

impl ApiError {
    /// HTTP status associated with this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Authentication(_) => Some(401),
            Self::NotFound(_) => Some(404),
            Self::RateLimitExceeded(_) => Some(429),
            Self::Server(_) => Some(500),
            Self::Other { status, .. } => *status,
        }
    }

    /// Whether the orchestrator-level retry policy may retry this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimitExceeded(_) | Self::Other { .. })
    }
}

/// Storage-layer error classes.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("{0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_generic_errors_are_retryable() {
        assert!(ApiError::RateLimitExceeded("throttled".into()).is_retryable());
        assert!(ApiError::Other {
            status: None,
            message: "connection reset".into()
        }
        .is_retryable());
    }

    #[test]
    fn auth_and_not_found_are_never_retryable() {
        assert!(!ApiError::Authentication("bad token".into()).is_retryable());
        assert!(!ApiError::NotFound("no such group".into()).is_retryable());
        assert!(!ApiError::Server("boom".into()).is_retryable());
    }

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(
            ApiError::Authentication("x".into()).status_code(),
            Some(401)
        );
        assert_eq!(ApiError::NotFound("x".into()).status_code(), Some(404));
        assert_eq!(
            ApiError::RateLimitExceeded("x".into()).status_code(),
            Some(429)
        );
        assert_eq!(
            ApiError::Other {
                status: Some(418),
                message: "teapot".into()
            }
            .status_code(),
            Some(418)
        );
    }
}
