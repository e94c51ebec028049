//! Error taxonomy for the client core.
//!
//! [`ApiError`] describes what went wrong talking to the backend.
//! [`ClientError`] is what orchestrators return to callers: local validation
//! failures are kept apart from transport and API failures so a caller can
//! tell "fix your input" from "try again".

use thiserror::Error;

/// Failures of a single backend round trip.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Network failure or timeout before a response was received.
    #[error("Transport error: {message}")]
    Transport { message: String, timed_out: bool },

    /// HTTP 401 or an envelope carrying code 401.
    #[error("Unauthorized: session is missing or expired")]
    Unauthorized,

    /// Non-2xx HTTP status, or an envelope whose code signals failure.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// A successful response whose body could not be decoded.
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn transport(message: impl Into<String>) -> Self {
        ApiError::Transport {
            message: message.into(),
            timed_out: false,
        }
    }

    /// Whether repeating the same request later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport { .. } | ApiError::Decode(_) => true,
            ApiError::Api { status, .. } => *status >= 500 || *status == 429,
            ApiError::Unauthorized => false,
        }
    }
}

/// Input rejected before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Source code must not be empty")]
    EmptySource,

    #[error("Unsupported language: {0}")]
    UnknownLanguage(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("No active language matches '{0}'")]
    LanguageNotFound(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Invalid client configuration: {0}")]
    Config(String),

    /// The same cache key was read back as a different payload type.
    #[error("Cached payload for '{0}' has an unexpected type")]
    CacheTypeMismatch(String),
}

impl ClientError {
    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation(_))
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
