//! Normalized events delivered to the client's consumer
//!
//! The router turns agent output into these events and pushes them into a
//! single unbounded channel. A consumer that dropped its receiver simply
//! stops getting events.

use indusagi_protocol::{AgentState, ToolExecution, ToolPhase};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Something the agent did that the consumer may want to render
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A state snapshot or update was applied to the cache
    StateChanged(AgentState),

    /// A fragment of assistant text
    StreamChunk {
        /// The fragment
        text: String,
    },

    /// The assistant finished a message
    MessageComplete {
        /// Full text of the message
        text: String,
    },

    /// A tool execution phase
    ToolEvent(ToolEvent),

    /// The active session file changed
    SessionChanged {
        /// New session file
        path: String,
    },

    /// The agent process exited
    ProcessExited {
        /// Exit code, absent when killed by a signal
        code: Option<i32>,
    },
}

/// One phase of a tool call
///
/// Field names are camelCase, like the rest of the event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolEvent {
    /// Which phase
    pub phase: ToolPhase,
    /// Tool name
    pub tool_name: String,
    /// Identifier tying the phases together
    pub tool_call_id: String,
    /// Call arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
    /// Progress payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_result: Option<Value>,
    /// Final result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Whether the tool reported failure
    #[serde(default)]
    pub is_error: bool,
}

impl From<ToolExecution> for ToolEvent {
    fn from(exec: ToolExecution) -> Self {
        Self {
            phase: exec.phase,
            tool_name: exec.tool_name,
            tool_call_id: exec.tool_call_id,
            args: exec.args,
            partial_result: exec.partial_result,
            result: exec.result,
            is_error: exec.is_error,
        }
    }
}
