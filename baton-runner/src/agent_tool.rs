//! Agents exposed as tools of other agents.
//!
//! Unlike a handoff, the caller stays in control: the nested agent runs
//! to completion on its own transcript and its final output comes back
//! as an ordinary tool result.

use crate::agent::Agent;
use crate::runner::Runner;
use async_trait::async_trait;
use baton_model::Model;
use baton_tool::{Tool, ToolContext, ToolError, ToolOutput};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// A tool that runs a nested agent and returns its final output.
pub struct AgentTool<C, M: Model> {
    agent: Arc<Agent<C>>,
    runner: Arc<Runner<M>>,
    name: String,
    description: String,
}

#[derive(Deserialize)]
struct AgentToolArgs {
    input: String,
}

impl<C: Send + Sync, M: Model> AgentTool<C, M> {
    /// Wrap `agent` as a tool driven by `runner`.
    pub fn new(
        agent: Arc<Agent<C>>,
        runner: Arc<Runner<M>>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            agent,
            runner,
            name: name.into(),
            description: description.into(),
        }
    }
}

#[async_trait]
impl<C: Send + Sync, M: Model> Tool<C> for AgentTool<C, M> {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "input": { "type": "string" }
            },
            "required": ["input"],
            "additionalProperties": false
        })
    }

    async fn invoke(&self, ctx: ToolContext<C>) -> Result<ToolOutput, ToolError> {
        let args: AgentToolArgs = ctx.parse_arguments()?;
        let result = self
            .runner
            .run(&self.agent, args.input, &ctx.run)
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))?;
        Ok(ToolOutput::Text(result.final_output))
    }
}

impl<C: Send + Sync + 'static> Agent<C> {
    /// Expose this agent as a tool of another agent.
    pub fn as_tool<M: Model + 'static>(
        self: &Arc<Self>,
        runner: Arc<Runner<M>>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Arc<dyn Tool<C>> {
        Arc::new(AgentTool::new(Arc::clone(self), runner, name, description))
    }
}
