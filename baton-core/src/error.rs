//! Error taxonomy for runs and sessions.

use crate::item::ConversationItem;
use thiserror::Error;

/// Session storage errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SessionError {
    /// The backing store failed.
    #[error("session backend error: {0}")]
    Backend(String),

    /// An item could not be serialized or deserialized.
    #[error("session serialization error: {0}")]
    Serialization(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Fatal conditions a run can end in.
///
/// Exactly one terminal [`crate::RunContext`]-scoped outcome exists per
/// run: either a result or one of these. None of them is retried by the
/// core — retry policy belongs to the caller.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RunError {
    /// The configured turn budget was exhausted. Carries the partial
    /// transcript produced before the budget ran out.
    #[error("max turns exceeded ({max_turns})")]
    MaxTurnsExceeded {
        /// The configured budget.
        max_turns: u32,
        /// Items produced before the run was aborted.
        items: Vec<ConversationItem>,
    },

    /// The model produced output the core cannot interpret — a tool or
    /// handoff target that doesn't exist, or output that does not satisfy
    /// the agent's declared output type.
    #[error("model behavior error: {0}")]
    ModelBehavior(String),

    /// The generation backend failed.
    #[error("model error: {0}")]
    Model(String),

    /// An input guardrail tripped before the first model call.
    #[error("input guardrail tripped: {guardrail}")]
    InputGuardrailTripped {
        /// Name of the guardrail that fired.
        guardrail: String,
        /// The guardrail's diagnostic payload.
        output: serde_json::Value,
    },

    /// An output guardrail tripped on the final candidate output.
    #[error("output guardrail tripped: {guardrail}")]
    OutputGuardrailTripped {
        /// Name of the guardrail that fired.
        guardrail: String,
        /// The guardrail's diagnostic payload.
        output: serde_json::Value,
    },

    /// A guardrail failed to execute (distinct from tripping).
    #[error("guardrail {guardrail} failed: {message}")]
    Guardrail {
        /// Name of the guardrail that errored.
        guardrail: String,
        /// Error message.
        message: String,
    },

    /// A tool invocation failed and the failure policy was set to
    /// propagate instead of feeding an error message back to the model.
    #[error("tool error in {tool}: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Error message.
        message: String,
    },

    /// Session read or write failed.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Catch-all. Include context.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_error_display() {
        let err = RunError::MaxTurnsExceeded {
            max_turns: 3,
            items: vec![],
        };
        assert_eq!(err.to_string(), "max turns exceeded (3)");

        let err = RunError::InputGuardrailTripped {
            guardrail: "pii".into(),
            output: serde_json::json!({"found": "ssn"}),
        };
        assert_eq!(err.to_string(), "input guardrail tripped: pii");

        let err = RunError::Tool {
            tool: "lookup".into(),
            message: "boom".into(),
        };
        assert_eq!(err.to_string(), "tool error in lookup: boom");
    }

    #[test]
    fn session_error_converts_to_run_error() {
        let err: RunError = SessionError::Backend("io".into()).into();
        assert!(matches!(err, RunError::Session(_)));
    }

    #[test]
    fn max_turns_carries_partial_transcript() {
        let err = RunError::MaxTurnsExceeded {
            max_turns: 1,
            items: vec![ConversationItem::user("hi")],
        };
        match err {
            RunError::MaxTurnsExceeded { items, .. } => assert_eq!(items.len(), 1),
            _ => unreachable!(),
        }
    }
}
