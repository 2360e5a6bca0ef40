//! Wire types for the model boundary.
//!
//! These are the internal lingua franca — not core conversation items,
//! not backend-specific types. Backends convert to/from these.

use baton_core::{AgentName, ConversationItem, ResponseId, ToolCallId, Usage};
use serde::{Deserialize, Serialize};

/// Environment variable consulted for a process-wide default model
/// identifier when neither the agent nor the caller picked one.
pub const DEFAULT_MODEL_ENV: &str = "BATON_DEFAULT_MODEL";

/// JSON Schema description of a callable exposed to the model — a tool
/// or a handoff (handoffs are surfaced to the model as callable tools).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Callable name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the callable's parameters.
    pub parameters: serde_json::Value,
}

/// Per-agent model settings. Every field is optional — `None` means
/// "use the backend's default".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Model identifier (backend-specific string).
    pub model: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f64>,
    /// Maximum output tokens per response.
    pub max_output_tokens: Option<u32>,
}

impl ModelSettings {
    /// The model identifier to use: the agent's own, else the
    /// `BATON_DEFAULT_MODEL` environment override, else `None`
    /// (backend default).
    pub fn resolve_model(&self) -> Option<String> {
        self.model
            .clone()
            .or_else(|| std::env::var(DEFAULT_MODEL_ENV).ok().filter(|s| !s.is_empty()))
    }
}

/// One generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRequest {
    /// System instructions for the active agent.
    pub system: Option<String>,
    /// Full ordered input: session history concatenated with items
    /// produced so far this run.
    pub input: Vec<ConversationItem>,
    /// Tools the active agent exposes.
    pub tools: Vec<ToolSchema>,
    /// Handoff targets the active agent exposes, as callable tools.
    pub handoffs: Vec<ToolSchema>,
    /// Resolved settings for this call.
    pub settings: ModelSettings,
    /// Declared output schema, when the agent expects structured output.
    pub output_schema: Option<serde_json::Value>,
    /// Identifier of the previous response in this conversation, for
    /// backends that chain responses server-side.
    pub previous_response_id: Option<ResponseId>,
}

/// One element of a model response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseItem {
    /// Generated text.
    Text {
        /// The text content.
        text: String,
    },
    /// A tool invocation request.
    ToolCall {
        /// Correlation ID for the call.
        id: ToolCallId,
        /// Name of the requested tool.
        name: String,
        /// Raw argument payload.
        arguments: String,
    },
    /// A handoff request. Backends map the handoff tool name space back
    /// to the target agent.
    Handoff {
        /// Correlation ID for the call.
        id: ToolCallId,
        /// Requested target agent.
        target: AgentName,
        /// Raw argument payload.
        arguments: String,
    },
}

/// One model response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    /// Response elements in generation order.
    pub output: Vec<ResponseItem>,
    /// Token usage for this call.
    pub usage: Usage,
    /// Backend identifier for this response, if reported.
    pub response_id: Option<ResponseId>,
}

impl ModelResponse {
    /// Concatenated text of all `Text` elements.
    pub fn text(&self) -> String {
        self.output
            .iter()
            .filter_map(|item| match item {
                ResponseItem::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Whether the response contains any tool call or handoff request.
    pub fn requests_work(&self) -> bool {
        self.output
            .iter()
            .any(|item| !matches!(item, ResponseItem::Text { .. }))
    }
}
