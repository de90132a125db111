//! Typed command set issued to the agent
//!
//! Commands serialize to the outbound wire shape with a `type` discriminator
//! and camelCase fields. [`Command::into_parts`] splits a command into the
//! `(name, params)` pair the request correlator works with.

use crate::error::{ProtocolError, Result};
use crate::model::ThinkingLevel;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A command understood by the agent in RPC mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Send a user prompt
    Prompt {
        /// Prompt text
        message: String,
    },

    /// Inject a steering message into the running turn
    Steer {
        /// Steering text
        message: String,
    },

    /// Queue a message to run after the current turn
    FollowUp {
        /// Follow-up text
        message: String,
    },

    /// Abort the running turn
    Abort,

    /// Fetch the full agent state snapshot
    GetState,

    /// Fetch the transcript of the active session
    GetMessages,

    /// Start a fresh session
    #[serde(rename_all = "camelCase")]
    NewSession {
        /// Session file to record as the parent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_session: Option<String>,
    },

    /// Switch to an existing session file
    #[serde(rename_all = "camelCase")]
    SwitchSession {
        /// Path of the session file
        session_path: String,
    },

    /// List models the agent can use
    GetAvailableModels,

    /// Select a model
    #[serde(rename_all = "camelCase")]
    SetModel {
        /// Provider name
        provider: String,
        /// Model identifier within the provider
        model_id: String,
    },

    /// Move to the next model in the agent's rotation
    CycleModel,

    /// Set the thinking effort level
    SetThinkingLevel {
        /// Level to apply
        level: ThinkingLevel,
    },

    /// Move to the next thinking level
    CycleThinkingLevel,

    /// Fetch token and message statistics
    GetSessionStats,

    /// Export the session as HTML
    #[serde(rename_all = "camelCase")]
    ExportHtml {
        /// Destination path; the agent picks one when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_path: Option<String>,
    },

    /// Compact the conversation context
    #[serde(rename_all = "camelCase")]
    Compact {
        /// Extra instructions for the summary
        #[serde(default, skip_serializing_if = "Option::is_none")]
        custom_instructions: Option<String>,
    },

    /// Toggle automatic compaction
    SetAutoCompaction {
        /// Whether auto compaction is on
        enabled: bool,
    },

    /// Toggle automatic retry of failed turns
    SetAutoRetry {
        /// Whether auto retry is on
        enabled: bool,
    },

    /// Run a shell command through the agent
    Bash {
        /// Command line
        command: String,
    },

    /// Abort the running shell command
    AbortBash,

    /// Fork the session at a transcript entry
    #[serde(rename_all = "camelCase")]
    Fork {
        /// Entry to fork from
        entry_id: String,
    },

    /// List the entries a fork can start from
    GetForkMessages,

    /// Fetch the text of the last assistant message
    GetLastAssistantText,
}

impl Command {
    /// Wire name of the command (the `type` field)
    pub fn name(&self) -> &'static str {
        match self {
            Self::Prompt { .. } => "prompt",
            Self::Steer { .. } => "steer",
            Self::FollowUp { .. } => "follow_up",
            Self::Abort => "abort",
            Self::GetState => "get_state",
            Self::GetMessages => "get_messages",
            Self::NewSession { .. } => "new_session",
            Self::SwitchSession { .. } => "switch_session",
            Self::GetAvailableModels => "get_available_models",
            Self::SetModel { .. } => "set_model",
            Self::CycleModel => "cycle_model",
            Self::SetThinkingLevel { .. } => "set_thinking_level",
            Self::CycleThinkingLevel => "cycle_thinking_level",
            Self::GetSessionStats => "get_session_stats",
            Self::ExportHtml { .. } => "export_html",
            Self::Compact { .. } => "compact",
            Self::SetAutoCompaction { .. } => "set_auto_compaction",
            Self::SetAutoRetry { .. } => "set_auto_retry",
            Self::Bash { .. } => "bash",
            Self::AbortBash => "abort_bash",
            Self::Fork { .. } => "fork",
            Self::GetForkMessages => "get_fork_messages",
            Self::GetLastAssistantText => "get_last_assistant_text",
        }
    }

    /// Split into the wire name and the command-specific fields
    pub fn into_parts(self) -> Result<(&'static str, Map<String, Value>)> {
        let name = self.name();
        match serde_json::to_value(&self)? {
            Value::Object(mut map) => {
                map.remove("type");
                Ok((name, map))
            }
            other => Err(ProtocolError::InvalidMessage(format!(
                "command {name} did not serialize to an object: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(Command::GetState, json!({"type": "get_state"}))]
    #[case(Command::AbortBash, json!({"type": "abort_bash"}))]
    #[case(
        Command::SwitchSession { session_path: "/s/1.jsonl".into() },
        json!({"type": "switch_session", "sessionPath": "/s/1.jsonl"})
    )]
    #[case(
        Command::SetModel { provider: "openai".into(), model_id: "gpt-4o-mini".into() },
        json!({"type": "set_model", "provider": "openai", "modelId": "gpt-4o-mini"})
    )]
    #[case(
        Command::SetThinkingLevel { level: ThinkingLevel::High },
        json!({"type": "set_thinking_level", "level": "high"})
    )]
    #[case(
        Command::Compact { custom_instructions: None },
        json!({"type": "compact"})
    )]
    #[case(
        Command::Fork { entry_id: "e-7".into() },
        json!({"type": "fork", "entryId": "e-7"})
    )]
    #[case(
        Command::SetAutoRetry { enabled: false },
        json!({"type": "set_auto_retry", "enabled": false})
    )]
    fn test_command_wire_shape(#[case] command: Command, #[case] expected: Value) {
        let name = command.name();
        assert_eq!(serde_json::to_value(&command).unwrap(), expected);
        assert_eq!(expected["type"], name);
    }

    #[test]
    fn test_into_parts_strips_type() {
        let (name, params) = Command::Bash {
            command: "ls -la".into(),
        }
        .into_parts()
        .unwrap();

        assert_eq!(name, "bash");
        assert_eq!(params.get("command"), Some(&json!("ls -la")));
        assert!(!params.contains_key("type"));
    }

    #[test]
    fn test_unit_command_has_empty_params() {
        let (name, params) = Command::CycleModel.into_parts().unwrap();
        assert_eq!(name, "cycle_model");
        assert!(params.is_empty());
    }
}
