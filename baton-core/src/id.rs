//! Typed ID wrappers for agents, sessions, traces, spans, and tool calls.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Newtype string identifiers.
///
/// Each wrapper holds an opaque string: UUIDs, slugs, and backend-issued
/// handles are all acceptable, and nothing validates the format. The
/// types exist so an `AgentName` cannot be handed to an API expecting a
/// `SessionId`.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Wrap a string as a `", stringify!($name), "`.")]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// The identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

typed_id!(AgentName, "Stable name of an agent configuration.");
typed_id!(SessionId, "Unique identifier for a conversation session.");
typed_id!(TraceId, "Unique identifier for an end-to-end trace.");
typed_id!(SpanId, "Unique identifier for a span within a trace.");
typed_id!(ToolCallId, "Correlation identifier for one tool call.");
typed_id!(GroupId, "Optional grouping identifier linking related traces.");
typed_id!(ResponseId, "Identifier of a single model response.");

impl TraceId {
    /// Generate a fresh trace ID (`trace_` + 32 hex chars).
    pub fn generate() -> Self {
        Self(format!("trace_{}", uuid::Uuid::new_v4().simple()))
    }
}

impl SpanId {
    /// Generate a fresh span ID (`span_` + 32 hex chars).
    pub fn generate() -> Self {
        Self(format!("span_{}", uuid::Uuid::new_v4().simple()))
    }
}
