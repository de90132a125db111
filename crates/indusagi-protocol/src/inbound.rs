//! Messages read from the agent's stdout
//!
//! Each line is one JSON object. Streaming events carry a known `type`
//! discriminator; anything else is interpreted as a direct reply to a request
//! and is matched by its `id` field.

use crate::error::{ProtocolError, Result};
use crate::request::RequestId;
use crate::state::AgentState;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A decoded inbound line
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// The agent announced readiness / the start of a run
    AgentStart,

    /// Partial state pushed by the agent
    StateUpdate(AgentState),

    /// Incremental assistant output
    MessageUpdate(AssistantMessageEvent),

    /// The current assistant message is complete
    MessageEnd,

    /// A tool execution phase
    ToolExecution(ToolExecution),

    /// Anything else: a reply correlated by `id`
    Reply(Reply),
}

impl InboundMessage {
    /// Decode one line
    pub fn parse(line: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(line)?;
        Self::from_value(value)
    }

    /// Decode an already parsed JSON value
    pub fn from_value(value: Value) -> Result<Self> {
        let mut map = match value {
            Value::Object(map) => map,
            other => {
                return Err(ProtocolError::InvalidMessage(format!(
                    "expected a JSON object, got {other}"
                )));
            }
        };

        let kind = map
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        match kind.as_str() {
            "agent_start" => Ok(Self::AgentStart),
            "state_update" => {
                // The payload is either nested under `state` or inlined.
                let payload = match map.remove("state") {
                    Some(state @ Value::Object(_)) => state,
                    _ => {
                        map.remove("type");
                        Value::Object(map)
                    }
                };
                Ok(Self::StateUpdate(AgentState::from_value(payload)?))
            }
            "message_update" => Ok(Self::MessageUpdate(AssistantMessageEvent::from_update(
                map.get("assistantMessageEvent"),
            ))),
            "message_end" => Ok(Self::MessageEnd),
            "tool_execution_start" => ToolExecution::decode(ToolPhase::Start, map),
            "tool_execution_update" => ToolExecution::decode(ToolPhase::Update, map),
            "tool_execution_end" => ToolExecution::decode(ToolPhase::End, map),
            _ => Ok(Self::Reply(serde_json::from_value(Value::Object(map))?)),
        }
    }

    /// Wire discriminator of a streaming event, `None` for replies
    pub fn event_type(&self) -> Option<&'static str> {
        match self {
            Self::AgentStart => Some("agent_start"),
            Self::StateUpdate(_) => Some("state_update"),
            Self::MessageUpdate(_) => Some("message_update"),
            Self::MessageEnd => Some("message_end"),
            Self::ToolExecution(exec) => Some(match exec.phase {
                ToolPhase::Start => "tool_execution_start",
                ToolPhase::Update => "tool_execution_update",
                ToolPhase::End => "tool_execution_end",
            }),
            Self::Reply(_) => None,
        }
    }
}

/// The `assistantMessageEvent` carried by `message_update`
#[derive(Debug, Clone, PartialEq)]
pub enum AssistantMessageEvent {
    /// Visible text fragment
    TextDelta(String),
    /// Reasoning fragment
    ReasoningDelta(String),
    /// Any other sub-event (start/end markers, tool call deltas)
    Other(String),
}

impl AssistantMessageEvent {
    fn from_update(event: Option<&Value>) -> Self {
        let kind = event
            .and_then(|e| e.get("type"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let delta = || {
            event
                .and_then(|e| e.get("delta"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        match kind {
            "text_delta" => Self::TextDelta(delta()),
            "reasoning_delta" | "thinking_delta" => Self::ReasoningDelta(delta()),
            other => Self::Other(other.to_string()),
        }
    }
}

/// Phase of a tool execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolPhase {
    /// Tool invoked
    Start,
    /// Partial progress
    Update,
    /// Tool finished
    End,
}

/// A `tool_execution_*` event
#[derive(Debug, Clone, PartialEq)]
pub struct ToolExecution {
    /// Which phase this event reports
    pub phase: ToolPhase,
    /// Tool name
    pub tool_name: String,
    /// Identifier tying the phases of one call together
    pub tool_call_id: String,
    /// Call arguments (start, update)
    pub args: Option<Value>,
    /// Progress payload (update)
    pub partial_result: Option<Value>,
    /// Final result (end)
    pub result: Option<Value>,
    /// Whether the tool failed (end)
    pub is_error: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawToolExecution {
    #[serde(default)]
    tool_name: String,
    #[serde(default)]
    tool_call_id: String,
    #[serde(default)]
    args: Option<Value>,
    #[serde(default)]
    partial_result: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    is_error: Option<bool>,
}

impl ToolExecution {
    fn decode(phase: ToolPhase, map: Map<String, Value>) -> Result<InboundMessage> {
        let raw: RawToolExecution = serde_json::from_value(Value::Object(map))?;
        Ok(InboundMessage::ToolExecution(Self {
            phase,
            tool_name: raw.tool_name,
            tool_call_id: raw.tool_call_id,
            args: raw.args,
            partial_result: raw.partial_result,
            result: raw.result,
            is_error: raw.is_error.unwrap_or(false),
        }))
    }
}

/// A direct reply to a request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    /// Identifier of the request this answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,

    /// Command name echoed by the agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Success flag, when the agent reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,

    /// Reply payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Error payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,

    /// Everything else on the line
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Reply {
    /// Whether the agent reported a failure
    pub fn is_error(&self) -> bool {
        self.error.is_some() || self.success == Some(false)
    }

    /// Human readable failure message
    pub fn error_message(&self) -> Option<String> {
        if let Some(error) = &self.error {
            let message = match error {
                Value::String(text) => text.clone(),
                Value::Object(obj) => obj
                    .get("message")
                    .and_then(Value::as_str)
                    .map_or_else(|| error.to_string(), str::to_string),
                other => other.to_string(),
            };
            return Some(message);
        }

        (self.success == Some(false)).then(|| {
            format!(
                "{} failed",
                self.command.as_deref().unwrap_or("request")
            )
        })
    }

    /// Decode the payload into a typed value
    ///
    /// A missing payload decodes as JSON `null`.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.data.clone().unwrap_or(Value::Null))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_parse_agent_start() {
        assert_eq!(
            InboundMessage::parse(r#"{"type":"agent_start"}"#).unwrap(),
            InboundMessage::AgentStart
        );
    }

    #[rstest]
    #[case(r#"{"type":"state_update","state":{"messageCount":1}}"#)]
    #[case(r#"{"type":"state_update","messageCount":1}"#)]
    fn test_parse_state_update_nested_or_inline(#[case] line: &str) {
        let InboundMessage::StateUpdate(state) = InboundMessage::parse(line).unwrap() else {
            panic!("expected state update");
        };
        assert_eq!(state.message_count, Some(1));
        assert!(state.extra.is_empty());
    }

    #[rstest]
    #[case("text_delta", AssistantMessageEvent::TextDelta("Hel".into()))]
    #[case("reasoning_delta", AssistantMessageEvent::ReasoningDelta("Hel".into()))]
    #[case("thinking_delta", AssistantMessageEvent::ReasoningDelta("Hel".into()))]
    #[case("text_start", AssistantMessageEvent::Other("text_start".into()))]
    fn test_parse_message_update(#[case] kind: &str, #[case] expected: AssistantMessageEvent) {
        let line = json!({
            "type": "message_update",
            "assistantMessageEvent": {"type": kind, "delta": "Hel"}
        })
        .to_string();
        assert_eq!(
            InboundMessage::parse(&line).unwrap(),
            InboundMessage::MessageUpdate(expected)
        );
    }

    #[test]
    fn test_parse_tool_execution_end() {
        let line = json!({
            "type": "tool_execution_end",
            "toolName": "bash",
            "toolCallId": "call_1",
            "result": {"content": "ok"},
            "isError": true
        })
        .to_string();

        let InboundMessage::ToolExecution(exec) = InboundMessage::parse(&line).unwrap() else {
            panic!("expected tool execution");
        };
        assert_eq!(exec.phase, ToolPhase::End);
        assert_eq!(exec.tool_name, "bash");
        assert_eq!(exec.tool_call_id, "call_1");
        assert!(exec.is_error);
        assert!(exec.args.is_none());
    }

    #[test]
    fn test_parse_reply() {
        let line = r#"{"type":"response","id":"req-4","command":"get_state","success":true,"data":{"messageCount":2}}"#;
        let InboundMessage::Reply(reply) = InboundMessage::parse(line).unwrap() else {
            panic!("expected reply");
        };

        assert_eq!(reply.id, Some(RequestId::from_sequence(4)));
        assert!(!reply.is_error());
        let state: AgentState = reply.data_as().unwrap();
        assert_eq!(state.message_count, Some(2));
    }

    #[test]
    fn test_untyped_line_is_a_reply() {
        let InboundMessage::Reply(reply) =
            InboundMessage::parse(r#"{"id":"req-1","data":[1,2]}"#).unwrap()
        else {
            panic!("expected reply");
        };
        assert_eq!(reply.data, Some(json!([1, 2])));
    }

    #[rstest]
    #[case(json!({"id": "req-1", "error": "boom"}), "boom")]
    #[case(json!({"id": "req-1", "error": {"message": "bad model"}}), "bad model")]
    #[case(json!({"id": "req-1", "command": "set_model", "success": false}), "set_model failed")]
    fn test_reply_errors(#[case] value: Value, #[case] message: &str) {
        let reply: Reply = serde_json::from_value(value).unwrap();
        assert!(reply.is_error());
        assert_eq!(reply.error_message().as_deref(), Some(message));
    }

    #[test]
    fn test_null_error_is_not_an_error() {
        let reply: Reply = serde_json::from_value(json!({"id": "req-1", "error": null})).unwrap();
        assert!(!reply.is_error());
        assert_eq!(reply.error_message(), None);
    }

    #[test]
    fn test_malformed_lines_are_errors() {
        assert!(InboundMessage::parse("{not json").is_err());
        assert!(matches!(
            InboundMessage::parse("[1,2,3]"),
            Err(ProtocolError::InvalidMessage(_))
        ));
    }
}
