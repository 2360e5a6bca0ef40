//! The realtime session loop.

use crate::detector::{BackendVad, TurnDetector};
use crate::{ClientEvent, RealtimeError, RealtimeModel, ServerEvent};
use baton_core::{AgentName, ConversationItem, RunContext, RunError};
use baton_guardrail::{
    run_output_guardrails, Debouncer, GuardrailsOutcome, DEFAULT_DEBOUNCE_CHARS,
};
use baton_model::Model;
use baton_runner::{Agent, Runner};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Events a realtime session streams to its caller.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A chunk of response audio.
    Audio(Vec<u8>),
    /// A chunk of response text.
    Text(String),
    /// A conversation item was committed by a turn's runner pass.
    ItemProduced(ConversationItem),
    /// The active agent changed after a handoff.
    AgentUpdated(AgentName),
    /// Caller input arrived while a response was streaming; the rest of
    /// that response was dropped.
    Interrupted,
    /// An output guardrail tripped; the current response was truncated.
    GuardrailTripped {
        /// Name of the guardrail that fired.
        guardrail: String,
        /// The guardrail's diagnostic payload.
        output: serde_json::Value,
    },
    /// The session ended. Terminal.
    Ended,
    /// A non-fatal error (transport or turn processing).
    Error(String),
}

/// The caller's handle for pushing input into a running session.
/// Dropping the handle ends the session.
#[derive(Clone)]
pub struct RealtimeHandle {
    tx: UnboundedSender<ClientEvent>,
}

impl RealtimeHandle {
    /// Push a chunk of caller text.
    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.tx.send(ClientEvent::TextIn(text.into()));
    }

    /// Push a chunk of caller audio.
    pub fn send_audio(&self, bytes: Vec<u8>) {
        let _ = self.tx.send(ClientEvent::AudioIn(bytes));
    }
}

/// A persistent duplex session: caller input on one side, a
/// [`RealtimeModel`] transport on the other, one runner pass per
/// detected turn.
pub struct RealtimeSession<C, M: Model> {
    runner: Arc<Runner<M>>,
    agent: Arc<Agent<C>>,
    ctx: Arc<RunContext<C>>,
    transport: Arc<dyn RealtimeModel>,
    detector: Box<dyn TurnDetector>,
    debounce_chars: usize,
}

impl<C, M> RealtimeSession<C, M>
where
    C: Send + Sync + 'static,
    M: Model + 'static,
{
    /// Create a session with the backend-VAD detector and the default
    /// guardrail debounce threshold.
    pub fn new(
        runner: Arc<Runner<M>>,
        agent: Arc<Agent<C>>,
        ctx: Arc<RunContext<C>>,
        transport: Arc<dyn RealtimeModel>,
    ) -> Self {
        Self {
            runner,
            agent,
            ctx,
            transport,
            detector: Box::new(BackendVad::new()),
            debounce_chars: DEFAULT_DEBOUNCE_CHARS,
        }
    }

    /// Replace the turn detector.
    pub fn with_detector(mut self, detector: Box<dyn TurnDetector>) -> Self {
        self.detector = detector;
        self
    }

    /// Override how many characters of response text accumulate between
    /// output guardrail checks.
    pub fn with_debounce_chars(mut self, chars: usize) -> Self {
        self.debounce_chars = chars;
        self
    }

    /// Connect and start the session loop on a spawned task.
    ///
    /// Returns the input handle and the event stream. The stream closes
    /// after [`SessionEvent::Ended`].
    pub async fn start(
        self,
    ) -> Result<(RealtimeHandle, UnboundedReceiver<SessionEvent>), RealtimeError> {
        let server_rx = self.transport.connect().await?;
        let (client_tx, client_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        tokio::spawn(self.event_loop(client_rx, server_rx, events_tx));
        Ok((RealtimeHandle { tx: client_tx }, events_rx))
    }

    async fn event_loop(
        mut self,
        mut client_rx: UnboundedReceiver<ClientEvent>,
        mut server_rx: UnboundedReceiver<ServerEvent>,
        events: UnboundedSender<SessionEvent>,
    ) {
        let mut active = Arc::clone(&self.agent);
        // response relay state, reset at every ResponseDone
        let mut streaming = false;
        let mut truncated = false;
        let mut response_text = String::new();
        let mut debouncer = Debouncer::with_threshold(self.debounce_chars);

        loop {
            tokio::select! {
                client = client_rx.recv() => {
                    let Some(event) = client else {
                        let _ = events.send(SessionEvent::Ended);
                        break;
                    };
                    if streaming
                        && matches!(event, ClientEvent::AudioIn(_) | ClientEvent::TextIn(_))
                    {
                        let _ = events.send(SessionEvent::Interrupted);
                        if let Err(e) = self.transport.send(ClientEvent::CancelResponse).await {
                            let _ = events.send(SessionEvent::Error(e.to_string()));
                        }
                        streaming = false;
                        truncated = false;
                        response_text.clear();
                        debouncer.reset();
                    }
                    if let Err(e) = self.transport.send(event.clone()).await {
                        let _ = events.send(SessionEvent::Error(e.to_string()));
                    }
                    let turn = match &event {
                        ClientEvent::TextIn(text) => self.detector.push_text(text).await,
                        ClientEvent::AudioIn(bytes) => self.detector.push_audio(bytes).await,
                        ClientEvent::CancelResponse => None,
                    };
                    if let Some(turn) = turn {
                        run_turn(&self.runner, &mut active, &self.ctx, turn, &events).await;
                    }
                }
                server = server_rx.recv() => {
                    let Some(event) = server else {
                        let _ = events.send(SessionEvent::Ended);
                        break;
                    };
                    match event {
                        ServerEvent::TextDelta(delta) => {
                            streaming = true;
                            if truncated {
                                continue;
                            }
                            response_text.push_str(&delta);
                            let check = debouncer.feed(&delta);
                            let _ = events.send(SessionEvent::Text(delta));
                            if check {
                                match run_output_guardrails(
                                    active.output_guardrails(),
                                    &self.ctx,
                                    active.name(),
                                    &response_text,
                                )
                                .await
                                {
                                    Ok(GuardrailsOutcome::Passed) => {}
                                    Ok(GuardrailsOutcome::Tripped { guardrail, output }) => {
                                        tracing::warn!(%guardrail, "output guardrail tripped, truncating response");
                                        let _ = events.send(SessionEvent::GuardrailTripped {
                                            guardrail,
                                            output,
                                        });
                                        if let Err(e) =
                                            self.transport.send(ClientEvent::CancelResponse).await
                                        {
                                            let _ = events.send(SessionEvent::Error(e.to_string()));
                                        }
                                        truncated = true;
                                    }
                                    Err(e) => {
                                        let _ = events.send(SessionEvent::Error(e.to_string()));
                                    }
                                }
                            }
                        }
                        ServerEvent::AudioDelta(bytes) => {
                            streaming = true;
                            if !truncated {
                                let _ = events.send(SessionEvent::Audio(bytes));
                            }
                        }
                        ServerEvent::TurnDetected => {
                            if let Some(turn) = self.detector.boundary().await {
                                run_turn(&self.runner, &mut active, &self.ctx, turn, &events).await;
                            }
                        }
                        ServerEvent::ResponseDone => {
                            // final forced check on whatever streamed since
                            // the last debounce point
                            if !truncated && !response_text.is_empty() {
                                match run_output_guardrails(
                                    active.output_guardrails(),
                                    &self.ctx,
                                    active.name(),
                                    &response_text,
                                )
                                .await
                                {
                                    Ok(GuardrailsOutcome::Passed) => {}
                                    Ok(GuardrailsOutcome::Tripped { guardrail, output }) => {
                                        let _ = events.send(SessionEvent::GuardrailTripped {
                                            guardrail,
                                            output,
                                        });
                                    }
                                    Err(e) => {
                                        let _ = events.send(SessionEvent::Error(e.to_string()));
                                    }
                                }
                            }
                            streaming = false;
                            truncated = false;
                            response_text.clear();
                            debouncer.reset();
                        }
                        ServerEvent::Error(message) => {
                            let _ = events.send(SessionEvent::Error(message));
                        }
                    }
                }
            }
        }
    }
}

/// One runner pass over a completed turn. Guardrail trips are session
/// events here, not errors.
async fn run_turn<C, M>(
    runner: &Arc<Runner<M>>,
    active: &mut Arc<Agent<C>>,
    ctx: &Arc<RunContext<C>>,
    turn: String,
    events: &UnboundedSender<SessionEvent>,
) where
    C: Send + Sync,
    M: Model,
{
    match runner.run(active, turn, ctx).await {
        Ok(result) => {
            for item in &result.new_items {
                let _ = events.send(SessionEvent::ItemProduced(item.clone()));
            }
            let _ = events.send(SessionEvent::Text(result.final_output));
            if result.final_agent.name() != active.name() {
                let _ = events.send(SessionEvent::AgentUpdated(
                    result.final_agent.name().clone(),
                ));
            }
            *active = result.final_agent;
        }
        Err(RunError::OutputGuardrailTripped { guardrail, output }) => {
            let _ = events.send(SessionEvent::GuardrailTripped { guardrail, output });
        }
        Err(e) => {
            let _ = events.send(SessionEvent::Error(e.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::CharThreshold;
    use async_trait::async_trait;
    use baton_core::Usage;
    use baton_guardrail::{GuardrailError, GuardrailResult, OutputGuardrail};
    use baton_model::{ModelError, ModelRequest, ModelResponse, ResponseItem};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Transport double: records outgoing events, lets the test inject
    /// incoming ones.
    struct ScriptedTransport {
        sent: Mutex<Vec<ClientEvent>>,
        server_tx: Mutex<Option<UnboundedSender<ServerEvent>>>,
        server_rx: Mutex<Option<UnboundedReceiver<ServerEvent>>>,
    }

    impl ScriptedTransport {
        fn new() -> Arc<Self> {
            let (tx, rx) = mpsc::unbounded_channel();
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                server_tx: Mutex::new(Some(tx)),
                server_rx: Mutex::new(Some(rx)),
            })
        }

        fn server(&self) -> UnboundedSender<ServerEvent> {
            self.server_tx.lock().unwrap().clone().unwrap()
        }

        fn close_server(&self) {
            self.server_tx.lock().unwrap().take();
        }

        fn sent(&self) -> Vec<ClientEvent> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RealtimeModel for ScriptedTransport {
        async fn connect(&self) -> Result<UnboundedReceiver<ServerEvent>, RealtimeError> {
            self.server_rx
                .lock()
                .unwrap()
                .take()
                .ok_or(RealtimeError::Closed)
        }

        async fn send(&self, event: ClientEvent) -> Result<(), RealtimeError> {
            self.sent.lock().unwrap().push(event);
            Ok(())
        }
    }

    struct QueueModel {
        responses: Mutex<VecDeque<ModelResponse>>,
    }

    impl QueueModel {
        fn new(responses: Vec<ModelResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
            }
        }
    }

    impl Model for QueueModel {
        fn generate(
            &self,
            _request: ModelRequest,
        ) -> impl std::future::Future<Output = Result<ModelResponse, ModelError>> + Send {
            let response = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("QueueModel: no more responses queued");
            async move { Ok(response) }
        }
    }

    fn text_response(text: &str) -> ModelResponse {
        ModelResponse {
            output: vec![ResponseItem::Text { text: text.into() }],
            usage: Usage::for_request(1, 1),
            response_id: None,
        }
    }

    struct NoSecrets;

    #[async_trait]
    impl OutputGuardrail<()> for NoSecrets {
        fn name(&self) -> &str {
            "no_secrets"
        }
        async fn check(
            &self,
            _ctx: &RunContext<()>,
            _agent: &AgentName,
            output: &str,
        ) -> Result<GuardrailResult, GuardrailError> {
            if output.contains("secret") {
                Ok(GuardrailResult::trip(json!({ "matched": "secret" })))
            } else {
                Ok(GuardrailResult::pass())
            }
        }
    }

    async fn next_event(rx: &mut UnboundedReceiver<SessionEvent>) -> SessionEvent {
        tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for a session event")
            .expect("event stream closed early")
    }

    #[tokio::test]
    async fn completed_turn_runs_one_runner_pass() {
        let transport = ScriptedTransport::new();
        let runner = Arc::new(Runner::new(QueueModel::new(vec![text_response(
            "hello to you",
        )])));
        let agent = Agent::<()>::builder("voice").build();
        let ctx = Arc::new(RunContext::new(()));

        let session = RealtimeSession::new(runner, agent, ctx, transport.clone())
            .with_detector(Box::new(CharThreshold::new(5)));
        let (handle, mut rx) = session.start().await.unwrap();

        handle.send_text("hello!");

        // the assistant item, then the final text
        match next_event(&mut rx).await {
            SessionEvent::ItemProduced(item) => {
                assert_eq!(item.as_text(), Some("hello to you"));
            }
            other => panic!("expected ItemProduced, got {other:?}"),
        }
        match next_event(&mut rx).await {
            SessionEvent::Text(text) => assert_eq!(text, "hello to you"),
            other => panic!("expected Text, got {other:?}"),
        }

        // the caller input was forwarded to the backend
        assert_eq!(
            transport.sent(),
            vec![ClientEvent::TextIn("hello!".into())]
        );
    }

    #[tokio::test]
    async fn backend_vad_turn_detection() {
        let transport = ScriptedTransport::new();
        let runner = Arc::new(Runner::new(QueueModel::new(vec![text_response("hi")])));
        let agent = Agent::<()>::builder("voice").build();
        let ctx = Arc::new(RunContext::new(()));

        let session = RealtimeSession::new(runner, agent, ctx, transport.clone());
        let (handle, mut rx) = session.start().await.unwrap();

        // no runner pass until the backend closes the turn
        handle.send_text("are you ");
        handle.send_text("there?");
        transport.server().send(ServerEvent::TurnDetected).unwrap();

        assert!(matches!(
            next_event(&mut rx).await,
            SessionEvent::ItemProduced(_)
        ));
        match next_event(&mut rx).await {
            SessionEvent::Text(text) => assert_eq!(text, "hi"),
            other => panic!("expected Text, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn handoff_in_a_turn_updates_the_active_agent() {
        let transport = ScriptedTransport::new();
        let runner = Arc::new(Runner::new(QueueModel::new(vec![
            ModelResponse {
                output: vec![ResponseItem::Handoff {
                    id: baton_core::ToolCallId::new("call_h"),
                    target: AgentName::new("billing"),
                    arguments: "{}".into(),
                }],
                usage: Usage::for_request(1, 1),
                response_id: None,
            },
            text_response("invoice sent"),
        ])));
        let billing = Agent::<()>::builder("billing").build();
        let triage = Agent::<()>::builder("triage").handoff_to(billing).build();
        let ctx = Arc::new(RunContext::new(()));

        let session = RealtimeSession::new(runner, triage, ctx, transport.clone())
            .with_detector(Box::new(CharThreshold::new(1)));
        let (handle, mut rx) = session.start().await.unwrap();

        handle.send_text("invoice?");

        let mut saw_update = false;
        loop {
            match next_event(&mut rx).await {
                SessionEvent::AgentUpdated(name) => {
                    assert_eq!(name.as_str(), "billing");
                    saw_update = true;
                    break;
                }
                SessionEvent::ItemProduced(_) | SessionEvent::Text(_) => {}
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert!(saw_update);
    }

    #[tokio::test]
    async fn caller_input_interrupts_a_streaming_response() {
        let transport = ScriptedTransport::new();
        let runner = Arc::new(Runner::new(QueueModel::new(vec![text_response("late")])));
        let agent = Agent::<()>::builder("voice").build();
        let ctx = Arc::new(RunContext::new(()));

        let session = RealtimeSession::new(runner, agent, ctx, transport.clone())
            .with_detector(Box::new(CharThreshold::new(100)));
        let (handle, mut rx) = session.start().await.unwrap();

        transport
            .server()
            .send(ServerEvent::TextDelta("Hel".into()))
            .unwrap();
        match next_event(&mut rx).await {
            SessionEvent::Text(text) => assert_eq!(text, "Hel"),
            other => panic!("expected Text, got {other:?}"),
        }

        // the response is mid-stream, so new input interrupts it
        handle.send_text("wait");
        assert!(matches!(next_event(&mut rx).await, SessionEvent::Interrupted));
        assert!(transport
            .sent()
            .iter()
            .any(|e| matches!(e, ClientEvent::CancelResponse)));
    }

    #[tokio::test]
    async fn debounced_guardrail_trip_truncates_the_response() {
        let transport = ScriptedTransport::new();
        let runner = Arc::new(Runner::new(QueueModel::new(vec![])));
        let agent = Agent::<()>::builder("voice")
            .output_guardrail(Arc::new(NoSecrets))
            .build();
        let ctx = Arc::new(RunContext::new(()));

        let session = RealtimeSession::new(runner, agent, ctx, transport.clone())
            .with_debounce_chars(4);
        let (_handle, mut rx) = session.start().await.unwrap();
        let server = transport.server();

        server.send(ServerEvent::TextDelta("okay".into())).unwrap();
        match next_event(&mut rx).await {
            SessionEvent::Text(text) => assert_eq!(text, "okay"),
            other => panic!("expected Text, got {other:?}"),
        }

        server
            .send(ServerEvent::TextDelta("a secret".into()))
            .unwrap();
        match next_event(&mut rx).await {
            SessionEvent::Text(text) => assert_eq!(text, "a secret"),
            other => panic!("expected Text, got {other:?}"),
        }
        match next_event(&mut rx).await {
            SessionEvent::GuardrailTripped { guardrail, .. } => {
                assert_eq!(guardrail, "no_secrets");
            }
            other => panic!("expected GuardrailTripped, got {other:?}"),
        }
        assert!(transport
            .sent()
            .iter()
            .any(|e| matches!(e, ClientEvent::CancelResponse)));

        // the rest of the truncated response is dropped
        server.send(ServerEvent::TextDelta("more".into())).unwrap();
        server.send(ServerEvent::Error("marker".into())).unwrap();
        match next_event(&mut rx).await {
            SessionEvent::Error(message) => assert_eq!(message, "marker"),
            other => panic!("expected the marker error, got {other:?}"),
        }

        // a fresh response streams again after ResponseDone
        server.send(ServerEvent::ResponseDone).unwrap();
        server.send(ServerEvent::TextDelta("next".into())).unwrap();
        match next_event(&mut rx).await {
            SessionEvent::Text(text) => assert_eq!(text, "next"),
            other => panic!("expected Text, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn closed_connection_ends_the_session() {
        let transport = ScriptedTransport::new();
        let runner = Arc::new(Runner::new(QueueModel::new(vec![])));
        let agent = Agent::<()>::builder("voice").build();
        let ctx = Arc::new(RunContext::new(()));

        let session = RealtimeSession::new(runner, agent, ctx, transport.clone());
        let (_handle, mut rx) = session.start().await.unwrap();

        transport.close_server();
        assert!(matches!(next_event(&mut rx).await, SessionEvent::Ended));
        assert!(rx.recv().await.is_none());
    }
}
