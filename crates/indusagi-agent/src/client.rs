//! Agent client
//!
//! [`AgentClient`] wires the process supervisor, the request correlator, the
//! state cache and the event router together and exposes one typed method
//! per agent command.

use crate::config::AgentConfig;
use crate::correlator::{RequestCorrelator, RequestKind};
use crate::error::{AgentError, Result};
use crate::events::AgentEvent;
use crate::history::SessionHistory;
use crate::router::EventRouter;
use crate::state::{StateCache, state_channel};
use indusagi_protocol::{
    AgentState, BashResult, Command, CompactionResult, CycleModelResult, ForkMessage, ForkResult,
    ModelDescriptor, ProtocolError, Reply, SessionStats, ThinkingLevel, TranscriptEntry,
};
use indusagi_transport::{ProcessState, ProcessSupervisor, Transport};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::info;

/// Client for one agent process
///
/// Each client owns its own process, state and event stream; several clients
/// can coexist. Must be created inside a Tokio runtime.
///
/// # Example
///
/// ```ignore
/// use indusagi_agent::{AgentClient, AgentConfig, SessionHistoryStore};
/// use std::sync::Arc;
///
/// let history = Arc::new(SessionHistoryStore::default());
/// let (client, mut events) = AgentClient::new(AgentConfig::from_env()?, history)?;
///
/// client.prompt("Summarize the README").await?;
/// while let Some(event) = events.recv().await {
///     println!("{event:?}");
/// }
/// ```
pub struct AgentClient {
    config: AgentConfig,
    supervisor: Arc<ProcessSupervisor>,
    correlator: Arc<RequestCorrelator>,
    state: StateCache,
    history: Arc<dyn SessionHistory>,
    router: JoinHandle<()>,
    closed: AtomicBool,
}

impl AgentClient {
    /// Create a client and the receiver for its events
    ///
    /// Nothing is spawned until the first request (or [`AgentClient::start`]).
    pub fn new(
        config: AgentConfig,
        history: Arc<dyn SessionHistory>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<AgentEvent>)> {
        config.validate()?;

        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let supervisor = Arc::new(ProcessSupervisor::new(
            config.to_process_config(),
            transport_tx,
        ));
        let correlator = Arc::new(RequestCorrelator::new(config.request_timeout));
        let (writer, state) = state_channel();

        let transport: Arc<dyn Transport> = supervisor.clone();
        let router = EventRouter::new(
            transport,
            Arc::clone(&correlator),
            writer,
            Arc::clone(&history),
            events_tx,
        )
        .spawn(transport_rx);

        let client = Self {
            config,
            supervisor,
            correlator,
            state,
            history,
            router,
            closed: AtomicBool::new(false),
        };
        Ok((client, events_rx))
    }

    /// Client configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Start the agent process if it is not running
    pub async fn start(&self) -> Result<()> {
        self.ensure_open()?;
        self.supervisor.ensure_running().await?;
        Ok(())
    }

    /// Stop the agent process
    ///
    /// Requests still in flight fail with
    /// [`AgentError::Terminated`](crate::AgentError::Terminated) once the
    /// exit is observed.
    pub async fn stop(&self) -> Result<()> {
        self.supervisor.stop().await?;
        Ok(())
    }

    /// Stop the process, fail everything in flight and stop routing
    ///
    /// The client is unusable afterwards: every later request fails with
    /// [`AgentError::Shutdown`] without spawning a process.
    pub async fn shutdown(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.supervisor.stop().await?;
        let failed = self.correlator.fail_all().await;
        self.router.abort();
        info!(failed, "Agent client shut down");
        Ok(())
    }

    /// Last known agent state
    pub fn state(&self) -> AgentState {
        self.state.snapshot()
    }

    /// Receiver notified whenever the cached state changes
    pub fn subscribe_state(&self) -> watch::Receiver<AgentState> {
        self.state.subscribe()
    }

    /// Lifecycle state of the agent process
    pub fn process_state(&self) -> ProcessState {
        self.supervisor.state()
    }

    /// Receiver notified on process lifecycle transitions
    pub fn subscribe_process_state(&self) -> watch::Receiver<ProcessState> {
        self.supervisor.subscribe_state()
    }

    /// OS process id of the agent, if running
    pub async fn pid(&self) -> Option<u32> {
        self.supervisor.pid().await
    }

    /// Session history the router records into
    pub fn history(&self) -> Arc<dyn SessionHistory> {
        Arc::clone(&self.history)
    }

    /// Number of requests awaiting a reply
    pub async fn pending_requests(&self) -> usize {
        self.correlator.pending_count().await
    }

    /// Send a raw command and wait for its reply
    ///
    /// Starts the agent first when `auto_start` is enabled. `params` must be
    /// a JSON object or `null`.
    pub async fn send(&self, command: &str, params: Value) -> Result<Reply> {
        self.ensure_started().await?;
        self.correlator
            .send(&*self.supervisor, command, params)
            .await
    }

    /// Send a typed command and wait for its reply
    pub async fn send_command(&self, command: Command) -> Result<Reply> {
        let (name, params) = command.into_parts()?;
        self.send(name, Value::Object(params)).await
    }

    /// Whether [`AgentClient::shutdown`] has been called
    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_shut_down() {
            return Err(AgentError::Shutdown);
        }
        Ok(())
    }

    async fn ensure_started(&self) -> Result<()> {
        self.ensure_open()?;
        if self.config.auto_start {
            self.supervisor.ensure_running().await?;
        }
        Ok(())
    }

    async fn request_data<T: DeserializeOwned>(&self, command: Command) -> Result<T> {
        Ok(self.send_command(command).await?.data_as()?)
    }

    // State and session

    /// Fetch a full state snapshot; the cache is replaced with it
    pub async fn get_state(&self) -> Result<AgentState> {
        self.ensure_started().await?;
        let reply = self
            .correlator
            .send_as(
                &*self.supervisor,
                RequestKind::StateQuery,
                Command::GetState.name(),
                Value::Null,
            )
            .await?;
        Ok(reply.data_as()?)
    }

    /// Fetch the transcript of the active session
    pub async fn get_messages(&self) -> Result<Vec<TranscriptEntry>> {
        let reply = self.send_command(Command::GetMessages).await?;
        list_payload(&reply, "messages")
    }

    /// Fetch the state snapshot and the transcript
    ///
    /// Used after switching sessions.
    pub async fn refresh(&self) -> Result<(AgentState, Vec<TranscriptEntry>)> {
        let state = self.get_state().await?;
        let messages = self.get_messages().await?;
        Ok((state, messages))
    }

    /// Start a fresh session
    pub async fn new_session(&self, parent_session: Option<String>) -> Result<Reply> {
        self.send_command(Command::NewSession { parent_session }).await
    }

    /// Switch to an existing session file
    pub async fn switch_session(&self, session_path: impl Into<String>) -> Result<Reply> {
        self.send_command(Command::SwitchSession {
            session_path: session_path.into(),
        })
        .await
    }

    /// Fetch token and message statistics
    pub async fn get_session_stats(&self) -> Result<SessionStats> {
        self.request_data(Command::GetSessionStats).await
    }

    /// Export the session as HTML, returning the written path
    pub async fn export_html(&self, output_path: Option<String>) -> Result<Option<String>> {
        let reply = self.send_command(Command::ExportHtml { output_path }).await?;
        Ok(string_field(&reply, "path"))
    }

    /// Compact the conversation context
    pub async fn compact(&self, custom_instructions: Option<String>) -> Result<CompactionResult> {
        self.request_data(Command::Compact {
            custom_instructions,
        })
        .await
    }

    /// Toggle automatic compaction
    pub async fn set_auto_compaction(&self, enabled: bool) -> Result<Reply> {
        self.send_command(Command::SetAutoCompaction { enabled }).await
    }

    /// Toggle automatic retry
    pub async fn set_auto_retry(&self, enabled: bool) -> Result<Reply> {
        self.send_command(Command::SetAutoRetry { enabled }).await
    }

    // Models

    /// List models the agent can use
    pub async fn get_available_models(&self) -> Result<Vec<ModelDescriptor>> {
        let reply = self.send_command(Command::GetAvailableModels).await?;
        list_payload(&reply, "models")
    }

    /// Select a model
    pub async fn set_model(
        &self,
        provider: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Result<Reply> {
        self.send_command(Command::SetModel {
            provider: provider.into(),
            model_id: model_id.into(),
        })
        .await
    }

    /// Move to the next model; `None` when there is nothing to cycle to
    pub async fn cycle_model(&self) -> Result<Option<CycleModelResult>> {
        self.request_data(Command::CycleModel).await
    }

    /// Set the thinking level
    pub async fn set_thinking_level(&self, level: ThinkingLevel) -> Result<Reply> {
        self.send_command(Command::SetThinkingLevel { level }).await
    }

    /// Move to the next thinking level, returning the new one
    pub async fn cycle_thinking_level(&self) -> Result<Option<ThinkingLevel>> {
        let reply = self.send_command(Command::CycleThinkingLevel).await?;
        Ok(string_field(&reply, "level")
            .map(|level| level.parse::<ThinkingLevel>())
            .transpose()?)
    }

    /// Thinking levels the agent accepts
    pub fn thinking_levels() -> &'static [ThinkingLevel] {
        &ThinkingLevel::ALL
    }

    // Conversation

    /// Send a user prompt
    ///
    /// The reply only acknowledges the prompt; the answer arrives as
    /// [`AgentEvent`]s.
    pub async fn prompt(&self, message: impl Into<String>) -> Result<Reply> {
        self.send_command(Command::Prompt {
            message: message.into(),
        })
        .await
    }

    /// Steer the running turn
    pub async fn steer(&self, message: impl Into<String>) -> Result<Reply> {
        self.send_command(Command::Steer {
            message: message.into(),
        })
        .await
    }

    /// Queue a message after the running turn
    pub async fn follow_up(&self, message: impl Into<String>) -> Result<Reply> {
        self.send_command(Command::FollowUp {
            message: message.into(),
        })
        .await
    }

    /// Abort the running turn
    pub async fn abort(&self) -> Result<Reply> {
        self.send_command(Command::Abort).await
    }

    /// Run a shell command through the agent
    pub async fn bash(&self, command: impl Into<String>) -> Result<BashResult> {
        self.request_data(Command::Bash {
            command: command.into(),
        })
        .await
    }

    /// Abort the running shell command
    pub async fn abort_bash(&self) -> Result<Reply> {
        self.send_command(Command::AbortBash).await
    }

    /// Fork the session at a transcript entry
    pub async fn fork(&self, entry_id: impl Into<String>) -> Result<ForkResult> {
        self.request_data(Command::Fork {
            entry_id: entry_id.into(),
        })
        .await
    }

    /// Entries a fork can start from
    pub async fn get_fork_messages(&self) -> Result<Vec<ForkMessage>> {
        let reply = self.send_command(Command::GetForkMessages).await?;
        list_payload(&reply, "messages")
    }

    /// Text of the last assistant message
    pub async fn get_last_assistant_text(&self) -> Result<Option<String>> {
        let reply = self.send_command(Command::GetLastAssistantText).await?;
        Ok(string_field(&reply, "text"))
    }
}

impl Drop for AgentClient {
    fn drop(&mut self) {
        // The router holds the supervisor; aborting it lets the process go.
        self.router.abort();
    }
}

/// Decode a list that is either the payload itself or under `key`
fn list_payload<T: DeserializeOwned>(reply: &Reply, key: &str) -> Result<Vec<T>> {
    let data = match reply.data.clone() {
        Some(Value::Object(mut obj)) => obj.remove(key).unwrap_or(Value::Null),
        Some(other) => other,
        None => Value::Null,
    };
    if data.is_null() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_value(data).map_err(ProtocolError::from)?)
}

/// A string that is either the payload itself or under `key`
fn string_field(reply: &Reply, key: &str) -> Option<String> {
    match reply.data.as_ref()? {
        Value::String(text) => Some(text.clone()),
        Value::Object(obj) => obj.get(key)?.as_str().map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reply_with(data: Value) -> Reply {
        Reply {
            data: Some(data),
            ..Default::default()
        }
    }

    #[test]
    fn test_list_payload_shapes() {
        let nested = reply_with(json!({"messages": [{"role": "user", "content": "hi"}]}));
        let flat = reply_with(json!([{"role": "user", "content": "hi"}]));

        let a: Vec<TranscriptEntry> = list_payload(&nested, "messages").unwrap();
        let b: Vec<TranscriptEntry> = list_payload(&flat, "messages").unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].text(), "hi");

        let empty: Vec<TranscriptEntry> = list_payload(&Reply::default(), "messages").unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_list_payload_rejects_wrong_shape() {
        let reply = reply_with(json!({"models": "nope"}));
        let result: Result<Vec<ModelDescriptor>> = list_payload(&reply, "models");
        assert!(result.is_err());
    }

    #[test]
    fn test_string_field() {
        assert_eq!(
            string_field(&reply_with(json!({"text": "done"})), "text").as_deref(),
            Some("done")
        );
        assert_eq!(
            string_field(&reply_with(json!("done")), "text").as_deref(),
            Some("done")
        );
        assert_eq!(string_field(&reply_with(json!({"text": null})), "text"), None);
    }

    #[test]
    fn test_thinking_levels() {
        assert_eq!(AgentClient::thinking_levels().len(), 6);
        assert_eq!(AgentClient::thinking_levels()[0], ThinkingLevel::Off);
    }
}
