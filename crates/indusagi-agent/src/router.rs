//! Event router for agent output
//!
//! A single task consumes every [`TransportEvent`] in arrival order. It owns
//! the stream accumulator and is the only writer of the state cache, so no
//! other synchronization is needed for either.
//!
//! Each inbound line gets exactly one interpretation:
//! - `agent_start`: the process is ready; a state snapshot is requested
//! - `state_update`: merged into the cache
//! - `message_update` / `message_end`: streamed text, then the full message
//! - `tool_execution_*`: forwarded as tool events
//! - anything else: a reply, handed to the waiting request by id

use crate::correlator::{RequestCorrelator, RequestKind};
use crate::events::AgentEvent;
use crate::history::SessionHistory;
use crate::state::StateWriter;
use indusagi_protocol::{AgentState, AssistantMessageEvent, InboundMessage, Reply};
use indusagi_transport::{Transport, TransportEvent};
use serde_json::Map;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

const MAX_LOGGED_LINE: usize = 200;

/// In-progress assistant text of the current turn
///
/// Only one turn is tracked at a time.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    text: String,
}

impl StreamAccumulator {
    /// Append a text fragment
    pub fn push(&mut self, delta: &str) {
        self.text.push_str(delta);
    }

    /// Text accumulated so far
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether nothing has been accumulated
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Take the accumulated text, leaving the accumulator empty
    ///
    /// Returns `None` when there is nothing to take.
    pub fn take(&mut self) -> Option<String> {
        if self.text.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.text))
    }

    /// Drop the accumulated text
    pub fn clear(&mut self) {
        self.text.clear();
    }
}

/// Routes transport events to pending requests, the state cache and the
/// event sink
pub struct EventRouter {
    transport: Arc<dyn Transport>,
    correlator: Arc<RequestCorrelator>,
    state: StateWriter,
    history: Arc<dyn SessionHistory>,
    events: mpsc::UnboundedSender<AgentEvent>,
    accumulator: StreamAccumulator,
}

impl EventRouter {
    /// Create a router
    pub fn new(
        transport: Arc<dyn Transport>,
        correlator: Arc<RequestCorrelator>,
        state: StateWriter,
        history: Arc<dyn SessionHistory>,
        events: mpsc::UnboundedSender<AgentEvent>,
    ) -> Self {
        Self {
            transport,
            correlator,
            state,
            history,
            events,
            accumulator: StreamAccumulator::default(),
        }
    }

    /// Run the router on its own task
    pub fn spawn(self, rx: mpsc::UnboundedReceiver<TransportEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(rx))
    }

    /// Process events until the channel closes
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<TransportEvent>) {
        while let Some(event) = rx.recv().await {
            self.handle(event).await;
        }
        debug!("Event router stopped");
    }

    /// Text accumulated for the current turn
    pub fn accumulated(&self) -> &str {
        self.accumulator.as_str()
    }

    /// Process one transport event
    pub async fn handle(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Line { generation, line } => {
                if generation < self.transport.generation() {
                    trace!(generation, "Ignoring line from a replaced process");
                    return;
                }
                self.handle_line(generation, &line).await;
            }
            TransportEvent::Exited { generation, code } => {
                self.handle_exit(generation, code).await;
            }
        }
    }

    async fn handle_line(&mut self, generation: u64, line: &str) {
        if line.trim().is_empty() {
            return;
        }

        let message = match InboundMessage::parse(line) {
            Ok(message) => message,
            Err(err) => {
                warn!(
                    generation,
                    error = %err,
                    line = %truncate(line, MAX_LOGGED_LINE),
                    "Ignoring malformed line from agent"
                );
                return;
            }
        };

        match message {
            InboundMessage::AgentStart => self.on_agent_start(generation).await,
            InboundMessage::StateUpdate(patch) => self.merge_state(patch),
            InboundMessage::MessageUpdate(event) => self.on_message_update(event),
            InboundMessage::MessageEnd => {
                if let Some(text) = self.accumulator.take() {
                    self.emit(AgentEvent::MessageComplete { text });
                }
            }
            InboundMessage::ToolExecution(exec) => {
                trace!(tool = %exec.tool_name, phase = ?exec.phase, "Tool execution");
                self.emit(AgentEvent::ToolEvent(exec.into()));
            }
            InboundMessage::Reply(reply) => self.on_reply(reply).await,
        }
    }

    async fn on_agent_start(&mut self, generation: u64) {
        self.transport.mark_ready();
        debug!(generation, "Agent ready, requesting state");

        // Registered here so the reply is recognized as a snapshot even if it
        // arrives before the spawned task gets to run.
        let request = self
            .correlator
            .register(generation, RequestKind::StateQuery)
            .await;
        let correlator = Arc::clone(&self.correlator);
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            let result = correlator
                .send_registered(&*transport, request, "get_state", Map::new())
                .await;
            if let Err(err) = result {
                debug!(error = %err, "Initial state request failed");
            }
        });
    }

    fn on_message_update(&mut self, event: AssistantMessageEvent) {
        match event {
            AssistantMessageEvent::TextDelta(delta) => {
                if delta.is_empty() {
                    return;
                }
                self.accumulator.push(&delta);
                self.emit(AgentEvent::StreamChunk { text: delta });
            }
            AssistantMessageEvent::ReasoningDelta(delta) => {
                debug!(len = delta.len(), "Reasoning delta");
            }
            AssistantMessageEvent::Other(kind) => {
                trace!(kind = %kind, "Ignoring assistant message event");
            }
        }
    }

    async fn on_reply(&mut self, reply: Reply) {
        let Some(id) = reply.id.clone() else {
            debug!(command = ?reply.command, "Dropping reply without id");
            return;
        };
        let Some(pending) = self.correlator.take(&id).await else {
            debug!(id = %id, "Dropping reply for unknown request");
            return;
        };

        if pending.kind == RequestKind::StateQuery && !reply.is_error() {
            match reply.data_as::<AgentState>() {
                Ok(snapshot) => self.replace_state(snapshot),
                Err(err) => warn!(id = %id, error = %err, "Malformed state snapshot"),
            }
        }
        debug!(id = %id, "Routed reply");
        pending.resolve(reply);
    }

    async fn handle_exit(&mut self, generation: u64, code: Option<i32>) {
        let failed = self.correlator.fail_generation(generation).await;
        if generation < self.transport.generation() {
            debug!(generation, failed, "Exit of a replaced process");
            return;
        }

        debug!(generation, ?code, failed, "Agent process exited");
        self.accumulator.clear();
        self.emit(AgentEvent::ProcessExited { code });
    }

    fn replace_state(&mut self, snapshot: AgentState) {
        let previous = self.state.snapshot().session_file;
        let changed = self.state.replace(snapshot);
        self.after_state_applied(previous, changed);
    }

    fn merge_state(&mut self, patch: AgentState) {
        let previous = self.state.snapshot().session_file;
        let changed = self.state.merge(patch);
        self.after_state_applied(previous, changed);
    }

    /// Every applied snapshot or update is reported, even when it matches the
    /// cache; only real changes reach subscribers of the watch channel.
    fn after_state_applied(&mut self, previous_session: Option<String>, changed: bool) {
        let state = self.state.snapshot();
        let session = state.session_file.clone();
        self.emit(AgentEvent::StateChanged(state));

        if changed
            && let Some(path) = session
            && !path.is_empty()
            && previous_session.as_deref() != Some(path.as_str())
        {
            debug!(path = %path, "Session changed");
            self.history.record(&path);
            self.emit(AgentEvent::SessionChanged { path });
        }
    }

    fn emit(&self, event: AgentEvent) {
        // A consumer that went away is not an error.
        let _ = self.events.send(event);
    }
}

fn truncate(line: &str, max: usize) -> &str {
    match line.char_indices().nth(max) {
        Some((index, _)) => &line[..index],
        None => line,
    }
}
