//! Error types for the card sync crate.

use thiserror::Error;

use crate::engine::TransportError;

/// Result type alias for remote service calls.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Retry policy class for API failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiRetryClass {
    Retryable,
    Permanent,
    ReauthRequired,
}

/// Errors that can occur while talking to the notification service.
#[derive(Debug, Error)]
pub enum SyncError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success response from the notification service
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Authentication error (missing or invalid token)
    #[error("Authentication error: {0}")]
    Auth(String),
}

impl SyncError {
    /// Create an API error from status and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// HTTP status if this is an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classify error for retry policy.
    ///
    /// Everything but auth failures and 400/405 rejections is worth another
    /// attempt on the next cycle.
    pub fn retry_class(&self) -> ApiRetryClass {
        match self {
            Self::Api { status, .. } => match *status {
                401 | 403 => ApiRetryClass::ReauthRequired,
                400 | 405 => ApiRetryClass::Permanent,
                _ => ApiRetryClass::Retryable,
            },
            Self::Http(_) => ApiRetryClass::Retryable,
            Self::Json(_) => ApiRetryClass::Retryable,
            Self::Auth(_) => ApiRetryClass::ReauthRequired,
        }
    }
}

/// Errors surfaced by the sync engine's tasks.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Remote call failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// No usable auth token
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Persisted state could not be read or written
    #[error("Store error: {0}")]
    Store(cardsync_core::Error),

    /// Stored state broke an invariant the engine relies on
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// Dismissals remain queued after a flush attempt
    #[error("{remaining} dismissal(s) still pending")]
    DismissalsPending { remaining: usize },
}

impl From<cardsync_core::Error> for EngineError {
    fn from(err: cardsync_core::Error) -> Self {
        match err {
            cardsync_core::Error::Invariant(message) => Self::Invariant(message),
            other => Self::Store(other),
        }
    }
}
