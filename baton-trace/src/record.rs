//! Trace and span records — the structured data handed to exporters.

use baton_core::{AgentName, GroupId, SpanId, ToolCallId, TraceId, Usage};
use serde::{Deserialize, Serialize};

/// Environment variable that disables the whole tracing pipeline when set
/// to `1` or `true`.
pub const TRACING_DISABLED_ENV: &str = "BATON_TRACING_DISABLED";

/// Tracing configuration for a run.
#[derive(Debug, Clone, Default)]
pub struct TraceConfig {
    /// When true, no records are produced or exported.
    pub disabled: bool,
    /// Whether span payloads may include message/tool content. Exported
    /// records carry this flag so sinks can filter accordingly.
    pub include_sensitive_data: bool,
}

impl TraceConfig {
    /// Read the global disable toggle from the environment.
    pub fn from_env() -> Self {
        let disabled = std::env::var(TRACING_DISABLED_ENV)
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Self {
            disabled,
            include_sensitive_data: false,
        }
    }
}

/// An end-to-end named operation.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceInfo {
    /// Generated or caller-supplied trace identifier.
    pub id: TraceId,
    /// Workflow name (e.g. `"agent run"`).
    pub name: String,
    /// Optional grouping identifier linking related traces.
    pub group_id: Option<GroupId>,
    /// Caller-supplied metadata attached to the whole trace.
    pub metadata: serde_json::Value,
}

/// Typed payload describing what a span measured.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpanKind {
    /// One stretch of execution under a single active agent.
    Agent {
        /// Name of the active agent.
        name: AgentName,
        /// Tool names the agent exposed.
        tools: Vec<String>,
        /// Handoff targets the agent exposed.
        handoffs: Vec<AgentName>,
    },
    /// One model generation call.
    Generation {
        /// Resolved model identifier, if any.
        model: Option<String>,
        /// Usage reported by the backend (filled at span end).
        usage: Option<Usage>,
    },
    /// One tool invocation.
    ToolCall {
        /// Tool name.
        name: String,
        /// Correlation ID of the call.
        call_id: ToolCallId,
    },
    /// One guardrail check.
    Guardrail {
        /// Guardrail name.
        name: String,
        /// Whether the tripwire fired.
        triggered: bool,
    },
    /// One transfer of control between agents.
    Handoff {
        /// Agent giving up control.
        from: AgentName,
        /// Agent receiving control.
        to: AgentName,
    },
    /// One speech-to-text pass in a realtime session.
    Transcription {
        /// Transcription model identifier, if any.
        model: Option<String>,
    },
    /// Escape hatch for caller-defined spans.
    Custom {
        /// Span name.
        name: String,
        /// Arbitrary payload.
        data: serde_json::Value,
    },
}

/// A completed span, ready for export.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanRecord {
    /// Span identifier.
    pub id: SpanId,
    /// Owning trace.
    pub trace_id: TraceId,
    /// Parent span, or `None` for a root span of the trace.
    pub parent_id: Option<SpanId>,
    /// Start time, unix milliseconds.
    pub started_at: u64,
    /// End time, unix milliseconds.
    pub ended_at: u64,
    /// What the span measured.
    pub kind: SpanKind,
    /// Error message, when the spanned operation failed.
    pub error: Option<String>,
    /// Whether the payload may contain message/tool content.
    pub sensitive_data_included: bool,
}

/// One unit handed to exporters.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExportItem {
    /// A trace was opened.
    TraceStarted(TraceInfo),
    /// A trace was closed.
    TraceEnded {
        /// The closed trace.
        id: TraceId,
    },
    /// A span completed.
    Span(SpanRecord),
}
