#![deny(missing_docs)]
//! The agent run loop.
//!
//! An [`Agent`] is an immutable configuration: instructions, tools,
//! guardrails, handoff targets, and model settings. The [`Runner`]
//! drives one against any [`baton_model::Model`]:
//!
//! 1. screen the input with the starting agent's input guardrails,
//! 2. call the model with the accumulated conversation,
//! 3. follow a requested handoff (swap the active agent) or execute the
//!    requested tool calls and feed results back,
//! 4. repeat until a final text output or the turn budget runs out,
//! 5. screen the final output with the active agent's output guardrails.
//!
//! The whole run is wrapped in one trace; each model call, tool call,
//! guardrail check, and handoff gets its own nested span.

mod agent;
mod agent_tool;
mod handoff;
mod runner;
mod stream;

pub use agent::{Agent, AgentBuilder, Instructions};
pub use agent_tool::AgentTool;
pub use handoff::{Handoff, InputFilter};
pub use runner::{RunConfig, RunInput, RunResult, Runner, DEFAULT_MAX_TURNS};
pub use stream::RunEvent;
