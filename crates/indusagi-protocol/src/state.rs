//! Agent state snapshot
//!
//! The agent reports its state either as a full snapshot (reply to
//! `get_state`) or as a partial `state_update` event. Snapshots replace the
//! cached state; updates are merged field by field.

use crate::model::ModelRef;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Remote session state as reported by the agent
///
/// Every field is optional because partial updates only carry what changed.
/// Fields this crate does not know about are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentState {
    /// Active model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelRef>,

    /// Thinking effort level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_level: Option<String>,

    /// Number of messages in the session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_count: Option<u64>,

    /// Path of the active session file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_file: Option<String>,

    /// Agent-side session identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Session display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_name: Option<String>,

    /// Whether a turn is streaming
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_streaming: Option<bool>,

    /// Whether a compaction is running
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_compacting: Option<bool>,

    /// Whether automatic compaction is enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_compaction_enabled: Option<bool>,

    /// Messages queued behind the current turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_message_count: Option<u64>,

    /// Other agent-reported values
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AgentState {
    /// Decode a state payload
    pub fn from_value(value: Value) -> crate::Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Overwrite the fields present in `patch`, keeping the rest
    ///
    /// Returns whether anything changed.
    pub fn merge(&mut self, patch: AgentState) -> bool {
        let before = self.clone();

        if patch.model.is_some() {
            self.model = patch.model;
        }
        if patch.thinking_level.is_some() {
            self.thinking_level = patch.thinking_level;
        }
        if patch.message_count.is_some() {
            self.message_count = patch.message_count;
        }
        if patch.session_file.is_some() {
            self.session_file = patch.session_file;
        }
        if patch.session_id.is_some() {
            self.session_id = patch.session_id;
        }
        if patch.session_name.is_some() {
            self.session_name = patch.session_name;
        }
        if patch.is_streaming.is_some() {
            self.is_streaming = patch.is_streaming;
        }
        if patch.is_compacting.is_some() {
            self.is_compacting = patch.is_compacting;
        }
        if patch.auto_compaction_enabled.is_some() {
            self.auto_compaction_enabled = patch.auto_compaction_enabled;
        }
        if patch.pending_message_count.is_some() {
            self.pending_message_count = patch.pending_message_count;
        }
        self.extra.extend(patch.extra);

        *self != before
    }
}
