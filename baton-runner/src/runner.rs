//! The run state machine.

use crate::agent::Agent;
use crate::stream::RunEvent;
use baton_core::{
    AgentName, ConversationItem, ResponseId, RunContext, RunError, Session, SessionId, ToolCallId,
    TraceId,
};
use baton_guardrail::{run_input_guardrails, run_output_guardrails, GuardrailError, GuardrailsOutcome};
use baton_model::{Model, ModelRequest, ResponseItem};
use baton_tool::{FailurePolicy, Tool, ToolContext};
use baton_trace::{BatchProcessor, SpanKind, TraceConfig, TraceContext};
use futures_util::future::join_all;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Default turn budget per run.
pub const DEFAULT_MAX_TURNS: u32 = 10;

/// Per-runner configuration.
#[derive(Clone)]
pub struct RunConfig {
    /// Turn budget: the maximum number of model calls per run.
    pub max_turns: u32,
    /// Workflow name attached to the run's trace.
    pub workflow_name: String,
    /// What a failing tool does to the run.
    pub failure_policy: FailurePolicy,
    /// Tracing configuration.
    pub trace: TraceConfig,
    /// Optional grouping identifier linking this run's trace to others.
    pub group_id: Option<baton_core::GroupId>,
    /// Caller-supplied trace identifier. Generated per run when absent.
    pub trace_id: Option<TraceId>,
    /// Caller-supplied metadata attached to the trace.
    pub trace_metadata: serde_json::Value,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            workflow_name: "agent run".into(),
            failure_policy: FailurePolicy::default(),
            trace: TraceConfig::from_env(),
            group_id: None,
            trace_id: None,
            trace_metadata: serde_json::Value::Null,
        }
    }
}

/// What a run starts from — free text or pre-built items.
#[derive(Debug, Clone)]
pub enum RunInput {
    /// A single user message.
    Text(String),
    /// Pre-built conversation items.
    Items(Vec<ConversationItem>),
}

impl RunInput {
    fn into_items(self) -> Vec<ConversationItem> {
        match self {
            Self::Text(text) => vec![ConversationItem::user(text)],
            Self::Items(items) => items,
        }
    }
}

impl From<&str> for RunInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for RunInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<ConversationItem>> for RunInput {
    fn from(items: Vec<ConversationItem>) -> Self {
        Self::Items(items)
    }
}

/// What a completed run produced.
pub struct RunResult<C> {
    /// The final text output.
    pub final_output: String,
    /// Every conversation item produced this run, in order. Excludes the
    /// caller's input items.
    pub new_items: Vec<ConversationItem>,
    /// Backend identifier of the last model response, if reported.
    pub last_response_id: Option<ResponseId>,
    /// The active agent at run end — differs from the starting agent
    /// after handoffs.
    pub final_agent: Arc<Agent<C>>,
}

impl<C> Clone for RunResult<C> {
    fn clone(&self) -> Self {
        Self {
            final_output: self.final_output.clone(),
            new_items: self.new_items.clone(),
            last_response_id: self.last_response_id.clone(),
            final_agent: Arc::clone(&self.final_agent),
        }
    }
}

impl<C: Send + Sync> std::fmt::Debug for RunResult<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunResult")
            .field("final_output", &self.final_output)
            .field("new_items", &self.new_items.len())
            .field("final_agent", self.final_agent.name())
            .finish()
    }
}

/// Drives agents against a generation backend.
///
/// Generic over `M: Model` (not object-safe). The context type is a
/// parameter of each run, not of the runner, so one runner can serve
/// agents with different context types.
pub struct Runner<M: Model> {
    model: M,
    config: RunConfig,
    processor: Arc<BatchProcessor>,
}

impl<M: Model> Runner<M> {
    /// Create a runner with default configuration and no trace exporters.
    pub fn new(model: M) -> Self {
        Self {
            model,
            config: RunConfig::default(),
            processor: Arc::new(BatchProcessor::new(Vec::new())),
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the trace processor (exporters live there).
    pub fn with_processor(mut self, processor: Arc<BatchProcessor>) -> Self {
        self.processor = processor;
        self
    }

    /// The trace processor, for flushing or inspection.
    pub fn processor(&self) -> &Arc<BatchProcessor> {
        &self.processor
    }

    /// Run an agent to completion.
    pub async fn run<C: Send + Sync>(
        &self,
        agent: &Arc<Agent<C>>,
        input: impl Into<RunInput> + Send,
        ctx: &Arc<RunContext<C>>,
    ) -> Result<RunResult<C>, RunError> {
        self.run_inner(agent, input.into(), ctx, None, None).await
    }

    /// Run an agent to completion with session-backed history: the run
    /// seeds its conversation from the session and appends every new
    /// item (input included) back to it on success.
    pub async fn run_with_session<C: Send + Sync>(
        &self,
        agent: &Arc<Agent<C>>,
        input: impl Into<RunInput> + Send,
        ctx: &Arc<RunContext<C>>,
        session: Arc<dyn Session>,
        session_id: &SessionId,
    ) -> Result<RunResult<C>, RunError> {
        self.run_inner(
            agent,
            input.into(),
            ctx,
            Some((session, session_id.clone())),
            None,
        )
        .await
    }

    pub(crate) async fn run_inner<C: Send + Sync>(
        &self,
        agent: &Arc<Agent<C>>,
        input: RunInput,
        ctx: &Arc<RunContext<C>>,
        session: Option<(Arc<dyn Session>, SessionId)>,
        events: Option<&UnboundedSender<RunEvent<C>>>,
    ) -> Result<RunResult<C>, RunError> {
        let trace_id = self
            .config
            .trace_id
            .clone()
            .unwrap_or_else(TraceId::generate);
        let trace = TraceContext::with_trace_id(
            trace_id,
            self.config.workflow_name.clone(),
            self.config.group_id.clone(),
            self.config.trace_metadata.clone(),
            &self.config.trace,
            Arc::clone(&self.processor),
        );
        let result = self.drive(agent, input, ctx, &session, events, &trace).await;
        trace.end();
        self.processor.flush().await;
        result
    }

    async fn drive<C: Send + Sync>(
        &self,
        agent: &Arc<Agent<C>>,
        input: RunInput,
        ctx: &Arc<RunContext<C>>,
        session: &Option<(Arc<dyn Session>, SessionId)>,
        events: Option<&UnboundedSender<RunEvent<C>>>,
        trace: &TraceContext,
    ) -> Result<RunResult<C>, RunError> {
        let input_items = input.into_items();

        let history = match session {
            Some((session, id)) => session.get_items(id, None).await?,
            None => Vec::new(),
        };

        // What the model sees. Handoff input filters rewrite this view;
        // the committed transcript (new_items) is never rewritten.
        let mut forward_input = history;
        forward_input.extend(input_items.iter().cloned());

        let mut active = Arc::clone(agent);
        let mut agent_span = trace.start_span(agent_span_kind(&active));

        // Input guardrails run once, before the first model call, from
        // the starting agent's list, against the caller's input only —
        // session history is not re-checked.
        match run_input_guardrails(active.input_guardrails(), ctx, active.name(), &input_items)
            .await
        {
            Ok(GuardrailsOutcome::Passed) => {
                record_guardrail_spans(trace, active.input_guardrails().iter().map(|g| g.name()), None);
            }
            Ok(GuardrailsOutcome::Tripped { guardrail, output }) => {
                record_guardrail_spans(
                    trace,
                    active.input_guardrails().iter().map(|g| g.name()),
                    Some(&guardrail),
                );
                agent_span.fail(format!("input guardrail tripped: {guardrail}"));
                return Err(RunError::InputGuardrailTripped { guardrail, output });
            }
            Err(e) => {
                let err = guardrail_run_error(e);
                agent_span.fail(err.to_string());
                return Err(err);
            }
        }

        let mut new_items: Vec<ConversationItem> = Vec::new();
        let mut last_response_id: Option<ResponseId> = None;
        let mut turns: u32 = 0;

        loop {
            turns += 1;
            if turns > self.config.max_turns {
                agent_span.fail(format!("max turns exceeded ({})", self.config.max_turns));
                return Err(RunError::MaxTurnsExceeded {
                    max_turns: self.config.max_turns,
                    items: new_items,
                });
            }
            emit(events, RunEvent::TurnStarted { turn: turns });

            let mut settings = active.settings().clone();
            settings.model = settings.resolve_model();
            let model_name = settings.model.clone();
            let request = ModelRequest {
                system: Some(active.resolve_instructions(ctx)),
                input: forward_input.clone(),
                tools: active.tools().schemas(ctx, active.name()).await,
                handoffs: active.handoff_schemas(),
                settings,
                output_schema: active.output_schema().cloned(),
                previous_response_id: last_response_id.clone(),
            };

            let mut generation_span = trace.start_span(SpanKind::Generation {
                model: model_name.clone(),
                usage: None,
            });
            let response = match self.model.generate(request).await {
                Ok(response) => response,
                Err(e) => {
                    generation_span.fail(e.to_string());
                    agent_span.fail("model call failed");
                    return Err(RunError::Model(e.to_string()));
                }
            };
            ctx.add_usage(&response.usage);
            generation_span.set_kind(SpanKind::Generation {
                model: model_name,
                usage: Some(response.usage.clone()),
            });
            generation_span.finish();
            last_response_id.clone_from(&response.response_id);

            let mut tool_calls: Vec<(ToolCallId, String, String)> = Vec::new();
            let mut handoff_requests: Vec<AgentName> = Vec::new();
            for item in &response.output {
                match item {
                    ResponseItem::ToolCall {
                        id,
                        name,
                        arguments,
                    } => tool_calls.push((id.clone(), name.clone(), arguments.clone())),
                    ResponseItem::Handoff { target, .. } => handoff_requests.push(target.clone()),
                    ResponseItem::Text { .. } => {}
                }
            }

            if let Some(target) = handoff_requests.first() {
                if handoff_requests.len() > 1 {
                    tracing::warn!(
                        agent = %active.name(),
                        "model requested multiple handoffs, taking the first"
                    );
                }
                if !tool_calls.is_empty() {
                    tracing::warn!(
                        agent = %active.name(),
                        "ignoring tool calls requested alongside a handoff"
                    );
                }
                let Some(declared) = active.find_handoff(target) else {
                    let span = trace.start_span(SpanKind::Handoff {
                        from: active.name().clone(),
                        to: target.clone(),
                    });
                    span.fail("handoff target not declared");
                    agent_span.fail("handoff target not declared");
                    return Err(RunError::ModelBehavior(format!(
                        "handoff to undeclared agent: {target}"
                    )));
                };

                let item = ConversationItem::handoff(active.name().clone(), target.clone());
                new_items.push(item.clone());
                forward_input.push(item.clone());
                emit(events, RunEvent::ItemProduced(item));

                trace
                    .start_span(SpanKind::Handoff {
                        from: active.name().clone(),
                        to: target.clone(),
                    })
                    .finish();

                forward_input = declared.filter(forward_input);
                let from = active.name().clone();
                let next = Arc::clone(declared.target());
                agent_span.finish();
                active = next;
                agent_span = trace.start_span(agent_span_kind(&active));
                emit(
                    events,
                    RunEvent::HandoffOccurred {
                        from,
                        to: active.name().clone(),
                    },
                );
                emit(events, RunEvent::AgentUpdated(active.name().clone()));
                continue;
            }

            if !tool_calls.is_empty() {
                // A name the agent never declared is the model's fault,
                // not the tool's — no failure policy applies.
                let mut resolved: Vec<Arc<dyn Tool<C>>> = Vec::with_capacity(tool_calls.len());
                for (_, name, _) in &tool_calls {
                    match active.tools().get(name) {
                        Some(tool) => resolved.push(Arc::clone(tool)),
                        None => {
                            agent_span.fail(format!("unknown tool: {name}"));
                            return Err(RunError::ModelBehavior(format!(
                                "call to undeclared tool: {name}"
                            )));
                        }
                    }
                }

                for (call_id, name, arguments) in &tool_calls {
                    let item = ConversationItem::tool_call(call_id.clone(), name, arguments);
                    new_items.push(item.clone());
                    forward_input.push(item.clone());
                    emit(events, RunEvent::ItemProduced(item));
                }

                // Tool spans run concurrently: each is parented on the
                // agent span explicitly, not on the nesting stack.
                let agent_span_id = agent_span.id().clone();
                let invocations = tool_calls.iter().zip(&resolved).map(|((call_id, name, arguments), tool)| {
                    let tool_ctx = ToolContext {
                        run: Arc::clone(ctx),
                        tool_name: name.clone(),
                        call_id: call_id.clone(),
                        arguments: arguments.clone(),
                    };
                    let parent = agent_span_id.clone();
                    async move {
                        let span = trace.start_span_under(
                            SpanKind::ToolCall {
                                name: name.clone(),
                                call_id: call_id.clone(),
                            },
                            &parent,
                        );
                        let result = tool.invoke(tool_ctx).await;
                        match &result {
                            Ok(_) => span.finish(),
                            Err(e) => span.fail(e.to_string()),
                        }
                        result
                    }
                });
                let results = join_all(invocations).await;

                for ((call_id, name, _), result) in tool_calls.iter().zip(results) {
                    let item = match result {
                        Ok(output) => ConversationItem::tool_result(
                            call_id.clone(),
                            output.as_result_text(),
                            false,
                        ),
                        Err(err) => match self.config.failure_policy.render(&err) {
                            Some(message) => {
                                ConversationItem::tool_result(call_id.clone(), message, true)
                            }
                            None => {
                                agent_span.fail(format!("tool {name} failed"));
                                return Err(RunError::Tool {
                                    tool: name.clone(),
                                    message: err.to_string(),
                                });
                            }
                        },
                    };
                    new_items.push(item.clone());
                    forward_input.push(item.clone());
                    emit(events, RunEvent::ItemProduced(item));
                }
                continue;
            }

            // No work requested: the text is the final candidate output.
            let final_output = response.text();

            if active.output_schema().is_some()
                && serde_json::from_str::<serde_json::Value>(&final_output).is_err()
            {
                agent_span.fail("structured output did not parse");
                return Err(RunError::ModelBehavior(
                    "final output is not valid JSON for the declared output type".into(),
                ));
            }

            match run_output_guardrails(
                active.output_guardrails(),
                ctx,
                active.name(),
                &final_output,
            )
            .await
            {
                Ok(GuardrailsOutcome::Passed) => {
                    record_guardrail_spans(
                        trace,
                        active.output_guardrails().iter().map(|g| g.name()),
                        None,
                    );
                }
                Ok(GuardrailsOutcome::Tripped { guardrail, output }) => {
                    record_guardrail_spans(
                        trace,
                        active.output_guardrails().iter().map(|g| g.name()),
                        Some(&guardrail),
                    );
                    agent_span.fail(format!("output guardrail tripped: {guardrail}"));
                    return Err(RunError::OutputGuardrailTripped { guardrail, output });
                }
                Err(e) => {
                    let err = guardrail_run_error(e);
                    agent_span.fail(err.to_string());
                    return Err(err);
                }
            }

            let item = ConversationItem::assistant(final_output.clone());
            new_items.push(item.clone());
            emit(events, RunEvent::ItemProduced(item));
            agent_span.finish();

            if let Some((session, id)) = session {
                let mut to_persist = input_items;
                to_persist.extend(new_items.iter().cloned());
                session.append_items(id, &to_persist).await?;
            }

            return Ok(RunResult {
                final_output,
                new_items,
                last_response_id,
                final_agent: active,
            });
        }
    }
}

fn agent_span_kind<C: Send + Sync>(agent: &Agent<C>) -> SpanKind {
    SpanKind::Agent {
        name: agent.name().clone(),
        tools: agent.tools().iter().map(|t| t.name().to_owned()).collect(),
        handoffs: agent
            .handoffs()
            .iter()
            .map(|h| h.target().name().clone())
            .collect(),
    }
}

fn record_guardrail_spans<'a>(
    trace: &TraceContext,
    names: impl Iterator<Item = &'a str>,
    tripped: Option<&str>,
) {
    for name in names {
        trace
            .start_span(SpanKind::Guardrail {
                name: name.to_owned(),
                triggered: tripped == Some(name),
            })
            .finish();
    }
}

fn guardrail_run_error(err: GuardrailError) -> RunError {
    match err {
        GuardrailError::Execution { guardrail, message } => {
            RunError::Guardrail { guardrail, message }
        }
        other => RunError::Guardrail {
            guardrail: "unnamed".into(),
            message: other.to_string(),
        },
    }
}

fn emit<C>(events: Option<&UnboundedSender<RunEvent<C>>>, event: RunEvent<C>) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}
