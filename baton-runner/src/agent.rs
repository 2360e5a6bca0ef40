//! Agent configuration: the immutable bundle the runner executes.

use crate::handoff::Handoff;
use baton_core::{AgentName, RunContext};
use baton_guardrail::{InputGuardrail, OutputGuardrail};
use baton_model::{ModelSettings, ToolSchema};
use baton_tool::{Tool, ToolRegistry};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// System instructions for an agent — a fixed string or a function of
/// the run context (per-tenant prompts, user names, feature flags).
pub enum Instructions<C> {
    /// A fixed prompt.
    Static(String),
    /// Computed per model call from the run context and the agent.
    Dynamic(Arc<dyn Fn(&RunContext<C>, &Agent<C>) -> String + Send + Sync>),
}

/// An immutable agent configuration.
///
/// Agents are referenced by `Arc` and never deep-copied; the handoff
/// graph between them may contain cycles. The context type parameter
/// fixes which tools and guardrails can be attached: all of them must
/// share the agent's `C`.
pub struct Agent<C> {
    name: AgentName,
    instructions: Instructions<C>,
    tools: ToolRegistry<C>,
    input_guardrails: Vec<Arc<dyn InputGuardrail<C>>>,
    output_guardrails: Vec<Arc<dyn OutputGuardrail<C>>>,
    handoffs: Vec<Handoff<C>>,
    output_schema: Option<Value>,
    settings: ModelSettings,
}

impl<C: Send + Sync> Agent<C> {
    /// Start building an agent with the given name.
    pub fn builder(name: impl Into<AgentName>) -> AgentBuilder<C> {
        AgentBuilder::new(name)
    }

    /// The agent's stable name.
    pub fn name(&self) -> &AgentName {
        &self.name
    }

    /// The agent's tools.
    pub fn tools(&self) -> &ToolRegistry<C> {
        &self.tools
    }

    /// Declared input guardrails, in declaration order.
    pub fn input_guardrails(&self) -> &[Arc<dyn InputGuardrail<C>>] {
        &self.input_guardrails
    }

    /// Declared output guardrails, in declaration order.
    pub fn output_guardrails(&self) -> &[Arc<dyn OutputGuardrail<C>>] {
        &self.output_guardrails
    }

    /// Declared handoff targets.
    pub fn handoffs(&self) -> &[Handoff<C>] {
        &self.handoffs
    }

    /// Declared output schema, when the agent expects structured output.
    pub fn output_schema(&self) -> Option<&Value> {
        self.output_schema.as_ref()
    }

    /// Model settings for this agent.
    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    /// Resolve the system instructions for one model call.
    pub fn resolve_instructions(&self, ctx: &RunContext<C>) -> String {
        match &self.instructions {
            Instructions::Static(text) => text.clone(),
            Instructions::Dynamic(f) => f(ctx, self),
        }
    }

    /// Schemas of the declared handoffs, as the model sees them.
    pub fn handoff_schemas(&self) -> Vec<ToolSchema> {
        self.handoffs.iter().map(Handoff::schema).collect()
    }

    /// The declared handoff whose target has the given name.
    pub fn find_handoff(&self, target: &AgentName) -> Option<&Handoff<C>> {
        self.handoffs.iter().find(|h| h.target().name() == target)
    }
}

impl<C> fmt::Debug for Agent<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent").field("name", &self.name).finish()
    }
}

/// Builder for [`Agent`].
pub struct AgentBuilder<C> {
    name: AgentName,
    instructions: Instructions<C>,
    tools: ToolRegistry<C>,
    input_guardrails: Vec<Arc<dyn InputGuardrail<C>>>,
    output_guardrails: Vec<Arc<dyn OutputGuardrail<C>>>,
    handoffs: Vec<Handoff<C>>,
    output_schema: Option<Value>,
    settings: ModelSettings,
}

impl<C: Send + Sync> AgentBuilder<C> {
    fn new(name: impl Into<AgentName>) -> Self {
        Self {
            name: name.into(),
            instructions: Instructions::Static(String::new()),
            tools: ToolRegistry::new(),
            input_guardrails: Vec::new(),
            output_guardrails: Vec::new(),
            handoffs: Vec::new(),
            output_schema: None,
            settings: ModelSettings::default(),
        }
    }

    /// Set fixed system instructions.
    pub fn instructions(mut self, text: impl Into<String>) -> Self {
        self.instructions = Instructions::Static(text.into());
        self
    }

    /// Set instructions computed per model call.
    pub fn dynamic_instructions(
        mut self,
        f: impl Fn(&RunContext<C>, &Agent<C>) -> String + Send + Sync + 'static,
    ) -> Self {
        self.instructions = Instructions::Dynamic(Arc::new(f));
        self
    }

    /// Attach a tool.
    pub fn tool(mut self, tool: Arc<dyn Tool<C>>) -> Self {
        self.tools.register(tool);
        self
    }

    /// Attach an input guardrail.
    pub fn input_guardrail(mut self, guardrail: Arc<dyn InputGuardrail<C>>) -> Self {
        self.input_guardrails.push(guardrail);
        self
    }

    /// Attach an output guardrail.
    pub fn output_guardrail(mut self, guardrail: Arc<dyn OutputGuardrail<C>>) -> Self {
        self.output_guardrails.push(guardrail);
        self
    }

    /// Declare a handoff.
    pub fn handoff(mut self, handoff: Handoff<C>) -> Self {
        self.handoffs.push(handoff);
        self
    }

    /// Declare a handoff to `target` with defaults.
    pub fn handoff_to(self, target: Arc<Agent<C>>) -> Self {
        self.handoff(Handoff::new(target))
    }

    /// Declare a structured output type by its JSON schema. The final
    /// text response must then parse as JSON.
    pub fn output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Set the model identifier.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.settings.model = Some(model.into());
        self
    }

    /// Replace all model settings.
    pub fn settings(mut self, settings: ModelSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Finish building.
    pub fn build(self) -> Arc<Agent<C>> {
        Arc::new(Agent {
            name: self.name,
            instructions: self.instructions,
            tools: self.tools,
            input_guardrails: self.input_guardrails,
            output_guardrails: self.output_guardrails,
            handoffs: self.handoffs,
            output_schema: self.output_schema,
            settings: self.settings,
        })
    }
}
