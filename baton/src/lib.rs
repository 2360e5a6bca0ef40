#![deny(missing_docs)]
//! # baton — umbrella crate
//!
//! Single import surface for the baton agent orchestration core.
//! Re-exports the member crates behind feature flags, plus a `prelude`
//! for the happy path.

#[cfg(feature = "core")]
pub use baton_core;
#[cfg(feature = "core")]
pub use baton_guardrail;
#[cfg(feature = "core")]
pub use baton_model;
#[cfg(feature = "realtime")]
pub use baton_realtime;
#[cfg(feature = "runner")]
pub use baton_runner;
#[cfg(feature = "session-crypto")]
pub use baton_session_crypto;
#[cfg(feature = "session-fs")]
pub use baton_session_fs;
#[cfg(feature = "session-memory")]
pub use baton_session_memory;
#[cfg(feature = "core")]
pub use baton_tool;
#[cfg(feature = "core")]
pub use baton_trace;

/// Happy-path imports for composing baton agents.
pub mod prelude {
    #[cfg(feature = "core")]
    pub use baton_core::{
        AgentName, ConversationItem, RunContext, RunError, Session, SessionError, SessionId,
        ToolCallId, Usage,
    };

    #[cfg(feature = "core")]
    pub use baton_model::{Model, ModelError, ModelRequest, ModelResponse, ModelSettings};

    #[cfg(feature = "core")]
    pub use baton_tool::{FailurePolicy, Tool, ToolContext, ToolError, ToolOutput, ToolRegistry};

    #[cfg(feature = "core")]
    pub use baton_guardrail::{
        GuardrailResult, GuardrailsOutcome, InputGuardrail, OutputGuardrail,
    };

    #[cfg(feature = "core")]
    pub use baton_trace::{BatchProcessor, ConsoleExporter, TraceConfig, TraceExporter};

    #[cfg(feature = "runner")]
    pub use baton_runner::{
        Agent, AgentBuilder, Handoff, RunConfig, RunEvent, RunInput, RunResult, Runner,
    };

    #[cfg(feature = "session-memory")]
    pub use baton_session_memory::MemorySession;

    #[cfg(feature = "session-fs")]
    pub use baton_session_fs::FsSession;

    #[cfg(feature = "session-crypto")]
    pub use baton_session_crypto::EncryptedSession;

    #[cfg(feature = "realtime")]
    pub use baton_realtime::{RealtimeModel, RealtimeSession, SessionEvent, TurnDetector};
}
