//! # baton-core — data model and protocol boundaries for the baton runtime
//!
//! This crate defines the vocabulary that crosses every boundary in a
//! baton system:
//!
//! | Concern | Types |
//! |---------|-------|
//! | Identity | [`AgentName`], [`SessionId`], [`TraceId`], [`SpanId`], [`ToolCallId`], [`GroupId`], [`ResponseId`] |
//! | Conversation | [`ConversationItem`] |
//! | Accounting | [`Usage`] |
//! | Run-scoped data | [`RunContext`] |
//! | Persistence | [`Session`] |
//! | Failure | [`RunError`], [`SessionError`] |
//!
//! ## Design Principle
//!
//! Everything here is operation-defined, not mechanism-defined. A
//! [`Session`] means "an ordered conversation log keyed by an identifier" —
//! not "a database table" or "a file." That is what makes backends
//! swappable: an in-memory map, a directory of JSONL files, and an
//! encrypted decorator all satisfy the same trait.
//!
//! ## Dependency Notes
//!
//! This crate depends on `serde_json::Value` for extension data fields
//! (guardrail diagnostics, output schemas, trace metadata). JSON is the
//! universal interchange format for agentic systems; a generic
//! `T: Serialize` would complicate trait object safety without benefit.

#![deny(missing_docs)]

pub mod context;
pub mod error;
pub mod id;
pub mod item;
pub mod session;
pub mod usage;

// Re-exports for convenience
pub use context::RunContext;
pub use error::{RunError, SessionError};
pub use id::{AgentName, GroupId, ResponseId, SessionId, SpanId, ToolCallId, TraceId};
pub use item::ConversationItem;
pub use session::Session;
pub use usage::Usage;
