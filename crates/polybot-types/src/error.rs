use thiserror::Error;

use crate::llm::LlmError;

/// Errors from session store operations (used by trait definitions in polybot-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("store connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors surfaced by the chat service.
///
/// Each variant is a distinct recovery class: persistence failures and
/// timeouts may be retried, inference failures are reported to the user,
/// invariant violations are rejected outright and change nothing.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("persistence failed: {0}")]
    Persistence(#[from] RepositoryError),

    #[error("inference failed: {0}")]
    Inference(#[from] LlmError),

    #[error("{0}")]
    InvariantViolation(String),

    #[error("{operation} timed out after {after_ms}ms")]
    Timeout { operation: String, after_ms: u64 },
}

impl ChatError {
    /// Whether the caller may retry the same operation.
    pub fn is_retryable(&self) -> bool {
        match self {
            ChatError::Persistence(RepositoryError::NotFound) => false,
            ChatError::Persistence(RepositoryError::Conflict(_)) => false,
            ChatError::Persistence(_) => true,
            ChatError::Inference(err) => err.is_transient(),
            ChatError::InvariantViolation(_) => false,
            ChatError::Timeout { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_chat_error_from_repository_error() {
        let err: ChatError = RepositoryError::Connection("refused".into()).into();
        assert!(matches!(err, ChatError::Persistence(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_invariant_violation_is_not_retryable() {
        let err = ChatError::InvariantViolation("cannot delete the last session".into());
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "cannot delete the last session");
    }

    #[test]
    fn test_timeout_display_and_retry() {
        let err = ChatError::Timeout {
            operation: "model invocation".into(),
            after_ms: 1500,
        };
        assert!(err.to_string().contains("1500ms"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_inference_retry_follows_llm_error() {
        let auth: ChatError = LlmError::AuthenticationFailed.into();
        assert!(!auth.is_retryable());
        let limited: ChatError = LlmError::RateLimited { retry_after_ms: Some(10) }.into();
        assert!(limited.is_retryable());
    }
}
