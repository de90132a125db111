//! Transcript entries returned by `get_messages` and `get_fork_messages`

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One message of the session transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Author role (`user`, `assistant`, `toolResult`, ...)
    #[serde(default)]
    pub role: String,

    /// Content: a plain string or a list of typed parts
    #[serde(default)]
    pub content: Value,

    /// Other reported fields (timestamps, usage, ids)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TranscriptEntry {
    /// Visible text of the entry
    ///
    /// Text, thinking and tool-result parts are concatenated in order; any
    /// other part kinds are skipped.
    pub fn text(&self) -> String {
        match &self.content {
            Value::String(text) => text.clone(),
            Value::Array(parts) => parts.iter().filter_map(part_text).collect::<Vec<_>>().join(""),
            _ => String::new(),
        }
    }
}

fn part_text(part: &Value) -> Option<&str> {
    let field = match part.get("type")?.as_str()? {
        "text" | "toolResult" => "text",
        "thinking" => "thinking",
        _ => return None,
    };
    part.get(field)?.as_str()
}

/// An entry a session can be forked from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkMessage {
    /// Transcript entry id
    pub entry_id: String,
    /// Text of the user message at that entry
    #[serde(default)]
    pub text: String,
}
