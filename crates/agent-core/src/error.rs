//! Error Types

use std::time::Duration;

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM provider error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider unavailable or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Model call exceeded the caller's deadline
    #[error("Model call timed out after {}s", .0.as_secs())]
    ModelCallTimeout(Duration),

    /// Tool not found in catalog
    #[error("unknown tool: {0}")]
    ToolNotFound(String),

    /// Tool arguments did not satisfy the declared schema
    #[error("{0}")]
    ToolValidation(String),

    /// Tool handler failed
    #[error("{0}")]
    ToolExecution(String),

    /// Tool round-trip exceeded the caller's deadline
    #[error("Tool '{tool}' timed out after {}s", .after.as_secs())]
    ToolInvocationTimeout { tool: String, after: Duration },

    /// Session used before `connect` completed (or after `disconnect`)
    #[error("Session is not connected")]
    NotConnected,

    /// Channel-level failure (process died, pipe closed, ...)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Peer violated the wire protocol
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Too many tool-call rounds within one user turn
    #[error("Tool loop exceeded {0} rounds without a final answer")]
    ToolLoopExceeded(usize),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rate limited
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Errors that belong to a single tool call and are handed back to the
    /// model rather than aborting the user turn.
    pub fn is_tool_recoverable(&self) -> bool {
        matches!(
            self,
            AgentError::ToolNotFound(_)
                | AgentError::ToolValidation(_)
                | AgentError::ToolExecution(_)
                | AgentError::ToolInvocationTimeout { .. }
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Provider(msg) => format!("The AI service encountered an error: {msg}"),
            AgentError::ProviderUnavailable(_) => "The AI service is currently unavailable. Please try again.".into(),
            AgentError::ModelCallTimeout(_) => "The AI service took too long to answer. Please try again.".into(),
            AgentError::ToolNotFound(name) => format!("The tool '{name}' is not available."),
            AgentError::ToolValidation(msg) => format!("Invalid tool input: {msg}"),
            AgentError::ToolExecution(msg) => format!("Tool error: {msg}"),
            AgentError::ToolInvocationTimeout { tool, .. } => format!("The tool '{tool}' did not answer in time."),
            AgentError::NotConnected | AgentError::Transport(_) | AgentError::Protocol(_) => {
                "Lost connection to the tool server. Please restart the session.".into()
            }
            AgentError::ToolLoopExceeded(_) => "The request took too many tool calls. Please try a simpler query.".into(),
            AgentError::RateLimited(_) => "You've made too many requests. Please wait a moment.".into(),
            AgentError::Auth(_) => "Authentication failed. Please check your credentials.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_errors_are_recoverable() {
        assert!(AgentError::ToolValidation("missing required parameter: n".into()).is_tool_recoverable());
        assert!(AgentError::ToolInvocationTimeout {
            tool: "forecast_sales".into(),
            after: Duration::from_secs(5),
        }
        .is_tool_recoverable());
        assert!(!AgentError::NotConnected.is_tool_recoverable());
        assert!(!AgentError::ToolLoopExceeded(5).is_tool_recoverable());
    }

    #[test]
    fn test_display_matches_envelope_wording() {
        assert_eq!(AgentError::ToolNotFound("nope".into()).to_string(), "unknown tool: nope");
        assert_eq!(
            AgentError::ToolLoopExceeded(3).to_string(),
            "Tool loop exceeded 3 rounds without a final answer"
        );
    }
}
