//! Streamed runs — the same loop, with progress events on a channel.

use crate::agent::Agent;
use crate::runner::{RunInput, RunResult, Runner};
use baton_core::{AgentName, ConversationItem, RunContext, Session, SessionId};
use baton_model::Model;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// Progress events emitted by a streamed run, in order of occurrence.
/// Exactly one terminal event ([`RunEvent::Completed`] or
/// [`RunEvent::Failed`]) closes the stream.
pub enum RunEvent<C> {
    /// A turn is starting. Turns are numbered from 1.
    TurnStarted {
        /// The 1-based turn number.
        turn: u32,
    },
    /// A conversation item was committed to the run's transcript.
    ItemProduced(ConversationItem),
    /// Control transferred between agents.
    HandoffOccurred {
        /// Agent that gave up control.
        from: AgentName,
        /// Agent that received control.
        to: AgentName,
    },
    /// The active agent changed. Follows every `HandoffOccurred`.
    AgentUpdated(AgentName),
    /// The run finished. Terminal.
    Completed(RunResult<C>),
    /// The run failed. Carries the rendered error. Terminal.
    Failed(String),
}

impl<C> Clone for RunEvent<C> {
    fn clone(&self) -> Self {
        match self {
            Self::TurnStarted { turn } => Self::TurnStarted { turn: *turn },
            Self::ItemProduced(item) => Self::ItemProduced(item.clone()),
            Self::HandoffOccurred { from, to } => Self::HandoffOccurred {
                from: from.clone(),
                to: to.clone(),
            },
            Self::AgentUpdated(name) => Self::AgentUpdated(name.clone()),
            Self::Completed(result) => Self::Completed(result.clone()),
            Self::Failed(message) => Self::Failed(message.clone()),
        }
    }
}

impl<C: Send + Sync> std::fmt::Debug for RunEvent<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TurnStarted { turn } => f.debug_struct("TurnStarted").field("turn", turn).finish(),
            Self::ItemProduced(item) => f.debug_tuple("ItemProduced").field(item).finish(),
            Self::HandoffOccurred { from, to } => f
                .debug_struct("HandoffOccurred")
                .field("from", from)
                .field("to", to)
                .finish(),
            Self::AgentUpdated(name) => f.debug_tuple("AgentUpdated").field(name).finish(),
            Self::Completed(result) => f.debug_tuple("Completed").field(result).finish(),
            Self::Failed(message) => f.debug_tuple("Failed").field(message).finish(),
        }
    }
}

impl<M: Model + 'static> Runner<M> {
    /// Run an agent while streaming progress events.
    ///
    /// The run executes on a spawned task; the returned receiver yields
    /// events as they happen and closes after the terminal event.
    pub fn run_streamed<C: Send + Sync + 'static>(
        self: &Arc<Self>,
        agent: &Arc<Agent<C>>,
        input: impl Into<RunInput>,
        ctx: &Arc<RunContext<C>>,
    ) -> UnboundedReceiver<RunEvent<C>> {
        self.spawn_streamed(agent, input.into(), ctx, None)
    }

    /// [`Runner::run_streamed`] with session-backed history.
    pub fn run_streamed_with_session<C: Send + Sync + 'static>(
        self: &Arc<Self>,
        agent: &Arc<Agent<C>>,
        input: impl Into<RunInput>,
        ctx: &Arc<RunContext<C>>,
        session: Arc<dyn Session>,
        session_id: &SessionId,
    ) -> UnboundedReceiver<RunEvent<C>> {
        self.spawn_streamed(agent, input.into(), ctx, Some((session, session_id.clone())))
    }

    fn spawn_streamed<C: Send + Sync + 'static>(
        self: &Arc<Self>,
        agent: &Arc<Agent<C>>,
        input: RunInput,
        ctx: &Arc<RunContext<C>>,
        session: Option<(Arc<dyn Session>, SessionId)>,
    ) -> UnboundedReceiver<RunEvent<C>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let runner = Arc::clone(self);
        let agent = Arc::clone(agent);
        let ctx = Arc::clone(ctx);
        tokio::spawn(async move {
            let result = runner
                .run_inner(&agent, input, &ctx, session, Some(&tx))
                .await;
            let terminal = match result {
                Ok(result) => RunEvent::Completed(result),
                Err(err) => RunEvent::Failed(err.to_string()),
            };
            let _ = tx.send(terminal);
        });
        rx
    }
}
