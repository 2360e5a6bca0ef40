//! The conversation item — the unit of everything a run produces or replays.

use crate::id::{AgentName, ToolCallId};
use serde::{Deserialize, Serialize};

/// One entry in a conversation log.
///
/// The sequence of items is append-only within a run. Position in the
/// sequence is the only ordering that matters — items carry no timestamps.
/// Each variant carries a stable `id` so that items survive round-trips
/// through sessions and filters without losing identity.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationItem {
    /// A message from the user (or the caller on the user's behalf).
    UserMessage {
        /// Stable item identifier.
        id: String,
        /// Message text.
        text: String,
    },
    /// A message produced by the model.
    AssistantMessage {
        /// Stable item identifier.
        id: String,
        /// Message text.
        text: String,
    },
    /// A tool invocation requested by the model.
    ToolCall {
        /// Stable item identifier.
        id: String,
        /// Correlation ID linking this call to its result.
        call_id: ToolCallId,
        /// Name of the requested tool.
        name: String,
        /// Raw argument payload as produced by the model.
        arguments: String,
    },
    /// The outcome of a tool invocation.
    ToolResult {
        /// Stable item identifier.
        id: String,
        /// Correlation ID of the originating call.
        call_id: ToolCallId,
        /// Rendered output fed back to the model.
        output: String,
        /// Whether the invocation failed.
        is_error: bool,
    },
    /// A transfer of control between agents.
    Handoff {
        /// Stable item identifier.
        id: String,
        /// Agent that gave up control.
        from: AgentName,
        /// Agent that received control.
        to: AgentName,
    },
    /// An encrypted envelope written by a transparent-encryption session
    /// decorator. Plain backends round-trip it untouched; readers without
    /// the decorator see opaque ciphertext.
    Sealed {
        /// Stable item identifier.
        id: String,
        /// Base64 of `nonce || ciphertext`.
        payload: String,
        /// Unix seconds after which the item is considered expired.
        expires_at: u64,
    },
}

fn gen_item_id() -> String {
    format!("item_{}", uuid::Uuid::new_v4().simple())
}

impl ConversationItem {
    /// Create a user message with a generated item ID.
    pub fn user(text: impl Into<String>) -> Self {
        Self::UserMessage {
            id: gen_item_id(),
            text: text.into(),
        }
    }

    /// Create an assistant message with a generated item ID.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::AssistantMessage {
            id: gen_item_id(),
            text: text.into(),
        }
    }

    /// Create a tool call item with a generated item ID.
    pub fn tool_call(
        call_id: ToolCallId,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self::ToolCall {
            id: gen_item_id(),
            call_id,
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Create a tool result item with a generated item ID.
    pub fn tool_result(call_id: ToolCallId, output: impl Into<String>, is_error: bool) -> Self {
        Self::ToolResult {
            id: gen_item_id(),
            call_id,
            output: output.into(),
            is_error,
        }
    }

    /// Create a handoff marker with a generated item ID.
    pub fn handoff(from: AgentName, to: AgentName) -> Self {
        Self::Handoff {
            id: gen_item_id(),
            from,
            to,
        }
    }

    /// The stable identifier of this item.
    pub fn id(&self) -> &str {
        match self {
            Self::UserMessage { id, .. }
            | Self::AssistantMessage { id, .. }
            | Self::ToolCall { id, .. }
            | Self::ToolResult { id, .. }
            | Self::Handoff { id, .. }
            | Self::Sealed { id, .. } => id,
        }
    }

    /// Message text, if this item is a user or assistant message.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::UserMessage { text, .. } | Self::AssistantMessage { text, .. } => Some(text),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_serde_roundtrip() {
        let item = ConversationItem::user("hello");
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "user_message");
        let back: ConversationItem = serde_json::from_value(json).unwrap();
        assert_eq!(item, back);
    }

    #[test]
    fn tool_call_serde_roundtrip() {
        let item = ConversationItem::tool_call(ToolCallId::new("call_1"), "lookup", "{}");
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "tool_call");
        let back: ConversationItem = serde_json::from_value(json).unwrap();
        assert_eq!(item, back);
    }

    #[test]
    fn handoff_serde_roundtrip() {
        let item = ConversationItem::handoff(AgentName::new("triage"), AgentName::new("billing"));
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "handoff");
        let back: ConversationItem = serde_json::from_value(json).unwrap();
        assert_eq!(item, back);
    }

    #[test]
    fn sealed_roundtrips_through_plain_serde() {
        let item = ConversationItem::Sealed {
            id: "item_x".into(),
            payload: "bm9uY2VjdA==".into(),
            expires_at: 1_900_000_000,
        };
        let json = serde_json::to_string(&item).unwrap();
        let back: ConversationItem = serde_json::from_str(&json).unwrap();
        assert_eq!(item, back);
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = ConversationItem::user("x");
        let b = ConversationItem::user("x");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn as_text_only_for_messages() {
        assert_eq!(ConversationItem::user("hi").as_text(), Some("hi"));
        let call = ConversationItem::tool_call(ToolCallId::new("c"), "t", "{}");
        assert_eq!(call.as_text(), None);
    }
}
