#![deny(missing_docs)]
//! Model contract for the baton runtime.
//!
//! The LLM call is an external collaborator. This crate defines the
//! boundary: the runner builds a [`ModelRequest`], the backend returns a
//! [`ModelResponse`]. The [`Model`] trait uses RPITIT (return-position
//! `impl Trait` in traits) and is intentionally NOT object-safe — the
//! runner is generic over `M: Model`, and the object-safe boundaries of
//! the system are elsewhere (sessions, tools, guardrails).

pub mod types;

pub use types::{
    ModelRequest, ModelResponse, ModelSettings, ResponseItem, ToolSchema,
};

use std::future::Future;
use thiserror::Error;

/// Errors from generation backends.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ModelError {
    /// HTTP or network request failed.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// Backend rate-limited the request.
    #[error("rate limited")]
    RateLimited,

    /// Could not parse the backend's response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ModelError {
    /// Whether retrying this request might succeed. The core never
    /// retries; this flag exists for callers with their own retry policy.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ModelError::RateLimited | ModelError::RequestFailed(_)
        )
    }
}

/// Generation backend interface.
///
/// One call produces one response, which may contain text, tool calls,
/// and handoff requests. Streaming-at-the-token-level is a backend
/// concern; the runner's streaming variant emits events per state
/// transition, not per token.
pub trait Model: Send + Sync {
    /// Send one generation request to the backend.
    fn generate(
        &self,
        request: ModelRequest,
    ) -> impl Future<Output = Result<ModelResponse, ModelError>> + Send;
}
