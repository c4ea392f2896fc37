//! Error types and handling
//!
//! This module provides the error taxonomy used throughout the devagent engine.
//! All errors implement the `EngineErrorExt` trait which provides user-friendly
//! hints and indicates whether errors are recoverable.
//!
//! # Security
//!
//! Error messages never carry the publish credential or the Brain API key.
//! Callers that format remote payloads into errors must scrub them first.

use thiserror::Error;

/// Trait for engine error extensions
///
/// Provides additional context for errors, including a user-friendly hint and
/// recoverability information.
pub trait EngineErrorExt {
    /// Returns a user-friendly hint for the error
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried (for example by re-running the same
    /// task from the latest branch). Non-recoverable errors need a fix to the
    /// configuration or the environment first.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: Invalid or missing configuration
/// - **LLM Provider**: Brain API failures, timeouts
/// - **Transport**: Remote tool service unreachable or answering garbage
/// - **Tool execution**: Argument validation, missing identifiers, unknown tools
/// - **Orchestration**: Iteration bound reached without a final report
/// - **Publish**: Missing credential or lineage, failed publish step
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, EngineErrorExt};
///
/// let error = EngineError::Publish("missing GitHub token for publish step".into());
/// println!("Hint: {}", error.user_hint());
/// assert!(!error.is_recoverable());
///
/// let exhausted = EngineError::OrchestrationExhausted {
///     limit: 8,
///     publish: "published to branch b-9".into(),
/// };
/// assert!(exhausted.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // LLM provider errors
    #[error("LLM provider error: {0}")]
    LLMProvider(String),

    #[error("LLM call timed out")]
    LLMTimeout,

    // Remote tool service errors
    #[error("Transport error: {0}")]
    Transport(String),

    // Tool errors
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    // Orchestration loop errors
    #[error("Reached maximum iterations ({limit}) without final report; {publish}")]
    OrchestrationExhausted { limit: usize, publish: String },

    // Finalization errors
    #[error("Publish error: {0}")]
    Publish(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file and environment variables",
            Self::LLMProvider(_) => "LLM provider unavailable. Check your API key and endpoint",
            Self::LLMTimeout => "LLM provider took too long to respond. Try again",
            Self::Transport(_) => "Remote tool service unreachable. Check MCP_BASE_URL",
            Self::ToolExecution(_) => "Tool call rejected. Check the tool arguments",
            Self::OrchestrationExhausted { .. } => {
                "Workflow did not converge. Re-run from the latest branch"
            }
            Self::Publish(_) => "Publishing failed. Check GITHUB_ACCESS_TOKEN and branch lineage",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            // Non-recoverable errors
            Self::Config(_) | Self::Publish(_) => false,

            // All other errors are potentially recoverable
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_message_carries_publish_outcome() {
        let err = EngineError::OrchestrationExhausted {
            limit: 3,
            publish: "publish failed: no token".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("(3)"));
        assert!(msg.contains("publish failed: no token"));
    }

    #[test]
    fn test_every_variant_has_a_hint() {
        let errors = vec![
            EngineError::Config("x".into()),
            EngineError::LLMProvider("x".into()),
            EngineError::LLMTimeout,
            EngineError::Transport("x".into()),
            EngineError::ToolExecution("x".into()),
            EngineError::OrchestrationExhausted {
                limit: 1,
                publish: String::new(),
            },
            EngineError::Publish("x".into()),
            EngineError::Io(std::io::Error::other("x")),
        ];
        for err in errors {
            assert!(!err.user_hint().is_empty(), "missing hint for {:?}", err);
        }
    }
}
