//! Furigana Maker Error Types
//!
//! Error taxonomy for the annotation pipeline. API errors carry the
//! user-facing message as their `Display`, since that text ends up on the
//! page's status surface verbatim.

use thiserror::Error;

/// Failure of a single annotation request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Endpoint missing, or direct mode without a credential
    #[error("{0}")]
    Configuration(String),

    /// Network-level failure reaching the endpoint
    #[error("{0}")]
    Transport(String),

    /// Endpoint answered with a non-success status
    #[error("{0}")]
    Service(String),

    /// Response parsed but held no usable output text
    #[error("{0}")]
    EmptyResponse(String),
}

/// A page message could not be handed to the page agent
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("no receiver present in page")]
    NoReceiver,

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("agent injection failed: {0}")]
    InjectionFailed(String),

    #[error("send after injection failed: {0}")]
    RetryFailed(String),
}

/// Page-side failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("No text selection found on the page.")]
    NoSelection,

    #[error("DOM error: {0}")]
    Dom(String),

    #[error("Lock poisoned: {0}")]
    Lock(String),
}

/// Central error type for Furigana Maker
#[derive(Error, Debug)]
pub enum FuriganaError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for Furigana Maker operations
pub type FuriganaResult<T> = Result<T, FuriganaError>;

/// Helper to convert Mutex poison errors
impl<T> From<std::sync::PoisonError<T>> for AgentError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        AgentError::Lock(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display_is_verbatim() {
        let err = ApiError::Service("rate limited".to_string());
        assert_eq!(err.to_string(), "rate limited");
    }

    #[test]
    fn test_no_selection_message() {
        assert_eq!(
            AgentError::NoSelection.to_string(),
            "No text selection found on the page."
        );
    }
}
