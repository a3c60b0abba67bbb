use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while running a tool or driving the agent. Tool failures are
/// reported back to the model in-band, everything else ends the loop invocation.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum AgentError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Tool execution failed: {0}")]
    ExecutionError(String),

    #[error(transparent)]
    Translate(#[from] TranslateError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Failures at the translation boundary between the conversation model and a
/// backend wire schema. These indicate a corrupt conversation and are never
/// swallowed.
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum TranslateError {
    #[error("Invalid tool call: {0}")]
    InvalidToolCall(String),

    #[error("Tool result references unknown tool call id '{0}'")]
    DanglingToolResult(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Could not interpret arguments for tool call {id}: {raw}")]
    ToolCallArgumentsInvalid { id: String, raw: String },

    #[error("Content cannot be sent to this backend: {0}")]
    UnsupportedContent(String),
}

pub type TranslateResult<T> = Result<T, TranslateError>;

/// Structured failures surfaced by a backend client.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Response failed validation: {0}")]
    Validation(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl ProviderError {
    /// Whether the backend client should try the request again
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Status { status, .. } => *status == 429 || *status >= 500,
            ProviderError::Transport(_) => true,
            ProviderError::Validation(_) => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::Validation(err.to_string())
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        let rate_limited = ProviderError::Status {
            status: 429,
            body: "slow down".into(),
        };
        let overloaded = ProviderError::Status {
            status: 529,
            body: "overloaded".into(),
        };
        let bad_request = ProviderError::Status {
            status: 400,
            body: "bad".into(),
        };
        assert!(rate_limited.is_retryable());
        assert!(overloaded.is_retryable());
        assert!(!bad_request.is_retryable());
        assert!(ProviderError::Transport("reset".into()).is_retryable());
        assert!(!ProviderError::Validation("not json".into()).is_retryable());
    }

    #[test]
    fn test_translate_error_wraps_into_agent_error() {
        let err: AgentError = TranslateError::DanglingToolResult("call_9".into()).into();
        assert_eq!(
            err.to_string(),
            "Tool result references unknown tool call id 'call_9'"
        );
    }
}
