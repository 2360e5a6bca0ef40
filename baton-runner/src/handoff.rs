//! Handoffs — declared transfers of control between agents.

use crate::agent::Agent;
use baton_core::{AgentName, ConversationItem};
use baton_model::ToolSchema;
use serde_json::json;
use std::sync::Arc;

/// A pure function rewriting the forward conversation view before it is
/// handed to the target agent (redaction, summarization). It never
/// touches the items already committed to the run's transcript.
pub type InputFilter = Arc<dyn Fn(Vec<ConversationItem>) -> Vec<ConversationItem> + Send + Sync>;

/// A declared handoff target.
///
/// Surfaced to the model as a callable tool named
/// `transfer_to_<snake_case(target)>` unless overridden.
pub struct Handoff<C> {
    target: Arc<Agent<C>>,
    tool_name: String,
    description: String,
    input_filter: Option<InputFilter>,
}

impl<C: Send + Sync> Handoff<C> {
    /// Declare a handoff to `target` with the default tool name and
    /// description.
    pub fn new(target: Arc<Agent<C>>) -> Self {
        let tool_name = default_tool_name(target.name());
        let description = format!("Transfer the conversation to the {} agent.", target.name());
        Self {
            target,
            tool_name,
            description,
            input_filter: None,
        }
    }

    /// Override the tool-facing name.
    pub fn with_tool_name(mut self, name: impl Into<String>) -> Self {
        self.tool_name = name.into();
        self
    }

    /// Override the tool-facing description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Attach an input filter.
    pub fn with_input_filter(
        mut self,
        filter: impl Fn(Vec<ConversationItem>) -> Vec<ConversationItem> + Send + Sync + 'static,
    ) -> Self {
        self.input_filter = Some(Arc::new(filter));
        self
    }

    /// The target agent.
    pub fn target(&self) -> &Arc<Agent<C>> {
        &self.target
    }

    /// The tool-facing name.
    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// The schema surfaced to the model.
    pub fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.tool_name.clone(),
            description: self.description.clone(),
            parameters: json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        }
    }

    /// Apply the input filter, if any, to the forward view.
    pub fn filter(&self, items: Vec<ConversationItem>) -> Vec<ConversationItem> {
        match &self.input_filter {
            Some(filter) => filter(items),
            None => items,
        }
    }
}

fn default_tool_name(target: &AgentName) -> String {
    format!("transfer_to_{}", snake_case(target.as_str()))
}

fn snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_owned()
}
