#![deny(missing_docs)]
//! The tool layer: functions the model can call during a run.
//!
//! A [`Tool`] carries its own JSON schema and executes against a
//! [`ToolContext`] that exposes the run's shared context. Agents hold
//! their tools in a [`ToolRegistry`], which preserves declaration order
//! and evaluates each tool's `enabled` predicate when building the
//! schema list for a model request. [`FailurePolicy`] decides what a
//! failing tool does to the run.

use async_trait::async_trait;
use baton_core::{AgentName, RunContext, ToolCallId};
use baton_model::ToolSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Errors from tool invocation.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ToolError {
    /// The model-supplied arguments did not parse or validate.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The tool ran and failed.
    #[error("execution failed: {0}")]
    Execution(String),

    /// No tool with the requested name is registered.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// What a tool produced.
///
/// `as_result_text` renders the form fed back to the model; binary
/// outputs are referenced rather than inlined.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// Plain text.
    Text(String),
    /// A structured value, serialized to compact JSON for the model.
    Json(Value),
    /// An image payload.
    Image {
        /// MIME type, e.g. `image/png`.
        media_type: String,
        /// Base64-encoded bytes.
        base64: String,
    },
    /// A named file payload.
    File {
        /// File name shown to the model.
        name: String,
        /// MIME type.
        media_type: String,
        /// Base64-encoded bytes.
        base64: String,
    },
}

impl ToolOutput {
    /// Render the output as the text fed back to the model.
    pub fn as_result_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Json(value) => value.to_string(),
            Self::Image { media_type, .. } => format!("[image: {media_type}]"),
            Self::File {
                name, media_type, ..
            } => format!("[file: {name} ({media_type})]"),
        }
    }
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for ToolOutput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// Everything one tool invocation can see.
///
/// Owns its pieces so invocations can outlive the borrow they were
/// created from (nested runs, spawned work).
pub struct ToolContext<C> {
    /// The run's shared context.
    pub run: Arc<RunContext<C>>,
    /// Name under which the tool was invoked.
    pub tool_name: String,
    /// Correlation ID from the model's tool call.
    pub call_id: ToolCallId,
    /// Raw argument payload as produced by the model.
    pub arguments: String,
}

impl<C> ToolContext<C> {
    /// Parse the raw arguments into a typed value.
    pub fn parse_arguments<T: DeserializeOwned>(&self) -> Result<T, ToolError> {
        serde_json::from_str(&self.arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))
    }
}

/// A function the model can call.
///
/// Generic over the run's context payload type: a tool declared for
/// context `C` can only be attached to agents running with `C`, checked
/// at compile time.
#[async_trait]
pub trait Tool<C: Send + Sync>: Send + Sync {
    /// Name the model calls this tool by.
    fn name(&self) -> &str;

    /// One-line description shown to the model.
    fn description(&self) -> &str;

    /// JSON schema of the argument object.
    fn parameters_schema(&self) -> Value;

    /// Whether the tool should be offered to the model for this agent
    /// and run. Evaluated once per turn when the schema list is built.
    async fn enabled(&self, _ctx: &RunContext<C>, _agent: &AgentName) -> bool {
        true
    }

    /// Execute the tool.
    async fn invoke(&self, ctx: ToolContext<C>) -> Result<ToolOutput, ToolError>;
}

/// An agent's tools, in declaration order.
///
/// Order matters: failure propagation and trace spans report tools in
/// the order they were registered.
pub struct ToolRegistry<C> {
    tools: Vec<Arc<dyn Tool<C>>>,
}

impl<C: Send + Sync> ToolRegistry<C> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. A tool with the same name replaces the earlier
    /// registration in place, with a warning.
    pub fn register(&mut self, tool: Arc<dyn Tool<C>>) {
        if let Some(existing) = self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            tracing::warn!(tool = tool.name(), "replacing tool registration");
            *existing = tool;
        } else {
            self.tools.push(tool);
        }
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool<C>>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Schemas of the tools enabled for this run, in declaration order.
    pub async fn schemas(&self, ctx: &RunContext<C>, agent: &AgentName) -> Vec<ToolSchema> {
        let mut schemas = Vec::with_capacity(self.tools.len());
        for tool in &self.tools {
            if tool.enabled(ctx, agent).await {
                schemas.push(ToolSchema {
                    name: tool.name().to_owned(),
                    description: tool.description().to_owned(),
                    parameters: tool.parameters_schema(),
                });
            }
        }
        schemas
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Iterate over the tools in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool<C>>> {
        self.tools.iter()
    }
}

impl<C: Send + Sync> Default for ToolRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// What a failing tool does to the run.
#[derive(Clone, Default)]
pub enum FailurePolicy {
    /// Feed a generic error message back to the model as the tool result
    /// and let the run continue.
    #[default]
    ErrorMessage,
    /// Like `ErrorMessage`, with a caller-supplied renderer.
    Custom(Arc<dyn Fn(&ToolError) -> String + Send + Sync>),
    /// Abort the run with the tool's error.
    Propagate,
}

impl FailurePolicy {
    /// Render the tool-result text for a failure, or `None` when the
    /// error should abort the run instead.
    pub fn render(&self, error: &ToolError) -> Option<String> {
        match self {
            Self::ErrorMessage => Some(format!("An error occurred while running the tool: {error}")),
            Self::Custom(render) => Some(render(error)),
            Self::Propagate => None,
        }
    }
}

impl std::fmt::Debug for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ErrorMessage => write!(f, "ErrorMessage"),
            Self::Custom(_) => write!(f, "Custom(..)"),
            Self::Propagate => write!(f, "Propagate"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Tool<()> for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the input back"
        }

        fn parameters_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }

        async fn invoke(&self, ctx: ToolContext<()>) -> Result<ToolOutput, ToolError> {
            #[derive(Deserialize)]
            struct Args {
                text: String,
            }
            let args: Args = ctx.parse_arguments()?;
            Ok(ToolOutput::Text(args.text))
        }
    }

    struct Disabled;

    #[async_trait]
    impl Tool<()> for Disabled {
        fn name(&self) -> &str {
            "disabled"
        }

        fn description(&self) -> &str {
            "Never offered"
        }

        fn parameters_schema(&self) -> Value {
            json!({ "type": "object" })
        }

        async fn enabled(&self, _ctx: &RunContext<()>, _agent: &AgentName) -> bool {
            false
        }

        async fn invoke(&self, _ctx: ToolContext<()>) -> Result<ToolOutput, ToolError> {
            Err(ToolError::Execution("should not run".into()))
        }
    }

    fn tool_ctx(arguments: &str) -> ToolContext<()> {
        ToolContext {
            run: Arc::new(RunContext::new(())),
            tool_name: "echo".into(),
            call_id: ToolCallId::new("call_1"),
            arguments: arguments.into(),
        }
    }

    #[tokio::test]
    async fn invoke_parses_arguments() {
        let output = Echo.invoke(tool_ctx(r#"{"text":"hi"}"#)).await.unwrap();
        assert_eq!(output, ToolOutput::Text("hi".into()));
    }

    #[tokio::test]
    async fn bad_arguments_are_invalid_arguments() {
        let err = Echo.invoke(tool_ctx("not json")).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn registry_preserves_declaration_order() {
        let mut registry = ToolRegistry::<()>::new();
        registry.register(Arc::new(Echo));
        registry.register(Arc::new(Disabled));
        let names: Vec<&str> = registry.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["echo", "disabled"]);
    }

    #[tokio::test]
    async fn duplicate_registration_replaces_in_place() {
        struct Echo2;

        #[async_trait]
        impl Tool<()> for Echo2 {
            fn name(&self) -> &str {
                "echo"
            }
            fn description(&self) -> &str {
                "Replacement"
            }
            fn parameters_schema(&self) -> Value {
                json!({ "type": "object" })
            }
            async fn invoke(&self, _ctx: ToolContext<()>) -> Result<ToolOutput, ToolError> {
                Ok(ToolOutput::Text("v2".into()))
            }
        }

        let mut registry = ToolRegistry::<()>::new();
        registry.register(Arc::new(Echo));
        registry.register(Arc::new(Echo2));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("echo").unwrap().description(), "Replacement");
    }

    #[tokio::test]
    async fn schemas_skip_disabled_tools() {
        let mut registry = ToolRegistry::<()>::new();
        registry.register(Arc::new(Echo));
        registry.register(Arc::new(Disabled));
        let ctx = RunContext::new(());
        let schemas = registry.schemas(&ctx, &AgentName::new("worker")).await;
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].name, "echo");
    }

    #[test]
    fn output_render_forms() {
        assert_eq!(ToolOutput::Text("hi".into()).as_result_text(), "hi");
        assert_eq!(
            ToolOutput::Json(json!({"n": 1})).as_result_text(),
            r#"{"n":1}"#
        );
        assert_eq!(
            ToolOutput::Image {
                media_type: "image/png".into(),
                base64: "AAAA".into()
            }
            .as_result_text(),
            "[image: image/png]"
        );
        assert_eq!(
            ToolOutput::File {
                name: "report.pdf".into(),
                media_type: "application/pdf".into(),
                base64: "AAAA".into()
            }
            .as_result_text(),
            "[file: report.pdf (application/pdf)]"
        );
    }

    #[test]
    fn failure_policy_rendering() {
        let err = ToolError::Execution("boom".into());

        let default = FailurePolicy::default();
        assert!(default.render(&err).unwrap().contains("boom"));

        let custom = FailurePolicy::Custom(Arc::new(|e| format!("tool failed: {e}")));
        assert_eq!(
            custom.render(&err).unwrap(),
            "tool failed: execution failed: boom"
        );

        assert!(FailurePolicy::Propagate.render(&err).is_none());
    }

    #[test]
    fn tool_is_object_safe_send_sync() {
        fn _assert_send_sync<T: Send + Sync>() {}
        _assert_send_sync::<Arc<dyn Tool<()>>>();
    }
}
