#![deny(missing_docs)]
//! Realtime duplex sessions.
//!
//! A [`RealtimeSession`] sits between a caller pushing continuous
//! audio/text input and a [`RealtimeModel`] transport. A
//! [`TurnDetector`] partitions the input stream into discrete turns; on
//! each completed turn the session runs one pass of the runner's
//! model/tool/handoff logic and streams the results as
//! [`SessionEvent`]s, non-buffered.
//!
//! Two behaviors distinguish realtime from batch runs:
//!
//! - **Interruption**: caller input arriving while a response is still
//!   streaming cancels the rest of that response. Conversation state
//!   already committed is not rolled back.
//! - **Guardrails**: output guardrails run on a debounced schedule and
//!   a trip truncates the current response instead of failing the
//!   session.

mod detector;
mod session;

pub use detector::{BackendVad, CharThreshold, TurnDetector};
pub use session::{RealtimeHandle, RealtimeSession, SessionEvent};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;

/// Realtime transport errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// The duplex connection failed or was rejected.
    #[error("transport error: {0}")]
    Transport(String),

    /// The connection is closed.
    #[error("connection closed")]
    Closed,

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Events the session sends to the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A chunk of caller audio.
    AudioIn(Vec<u8>),
    /// A chunk of caller text.
    TextIn(String),
    /// Cancel the response currently being generated.
    CancelResponse,
}

/// Events the backend sends over the connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// A chunk of response audio.
    AudioDelta(Vec<u8>),
    /// A chunk of response text.
    TextDelta(String),
    /// The backend's voice-activity detection closed the current input
    /// turn.
    TurnDetected,
    /// The current response finished streaming.
    ResponseDone,
    /// A backend-reported error.
    Error(String),
}

/// A duplex connection to a realtime generation backend.
///
/// `connect` yields the incoming half; outgoing events go through
/// `send`. Implementations own reconnection policy, if any.
#[async_trait]
pub trait RealtimeModel: Send + Sync {
    /// Open the connection and return the stream of incoming events.
    async fn connect(&self) -> Result<UnboundedReceiver<ServerEvent>, RealtimeError>;

    /// Send one event to the backend.
    async fn send(&self, event: ClientEvent) -> Result<(), RealtimeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn transport_trait_is_object_safe() {
        _assert_send_sync::<Box<dyn RealtimeModel>>();
    }

    #[test]
    fn error_display() {
        let err = RealtimeError::Transport("socket reset".into());
        assert_eq!(err.to_string(), "transport error: socket reset");
        assert_eq!(RealtimeError::Closed.to_string(), "connection closed");
    }
}
