//! Reply payloads for session-level commands

use crate::model::ModelRef;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Token counters reported by `get_session_stats`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenStats {
    /// Input tokens
    pub input: u64,
    /// Output tokens
    pub output: u64,
    /// Tokens served from cache
    pub cache_read: u64,
    /// Tokens written to cache
    pub cache_write: u64,
    /// Sum of all of the above
    pub total: u64,
}

/// Reply to `get_session_stats`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    /// Session file the stats belong to
    #[serde(default)]
    pub session_file: Option<String>,
    /// Agent-side session id
    #[serde(default)]
    pub session_id: Option<String>,
    /// User messages
    #[serde(default)]
    pub user_messages: u64,
    /// Assistant messages
    #[serde(default)]
    pub assistant_messages: u64,
    /// Tool calls issued
    #[serde(default)]
    pub tool_calls: u64,
    /// Tool results received
    #[serde(default)]
    pub tool_results: u64,
    /// All messages
    #[serde(default)]
    pub total_messages: u64,
    /// Token usage
    #[serde(default)]
    pub tokens: TokenStats,
    /// Accumulated cost in USD
    #[serde(default)]
    pub cost: f64,
    /// Other reported values
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Reply to `cycle_model`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleModelResult {
    /// Model now active
    pub model: ModelRef,
    /// Thinking level now active
    #[serde(default)]
    pub thinking_level: Option<String>,
    /// Whether cycling is restricted to a scoped model list
    #[serde(default)]
    pub is_scoped: Option<bool>,
}

/// Reply to `compact`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactionResult {
    /// Summary that replaced the compacted entries
    #[serde(default)]
    pub summary: Option<String>,
    /// First entry kept verbatim
    #[serde(default)]
    pub first_kept_entry_id: Option<String>,
    /// Context size before compaction
    #[serde(default)]
    pub tokens_before: Option<u64>,
    /// Other reported values
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Reply to `bash`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BashResult {
    /// Captured output
    #[serde(default)]
    pub output: String,
    /// Exit code, absent when the command was killed
    #[serde(default)]
    pub exit_code: Option<i32>,
    /// Whether the command was aborted
    #[serde(default)]
    pub cancelled: bool,
    /// Whether the output was truncated
    #[serde(default)]
    pub truncated: bool,
    /// Where the untruncated output was written
    #[serde(default)]
    pub full_output_path: Option<String>,
}

/// Reply to `fork`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkResult {
    /// Text of the entry the fork started from
    #[serde(default)]
    pub text: Option<String>,
    /// Whether the fork was cancelled
    #[serde(default)]
    pub cancelled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_stats_decode() {
        let stats: SessionStats = serde_json::from_value(json!({
            "sessionFile": "/s.jsonl",
            "userMessages": 3,
            "assistantMessages": 3,
            "toolCalls": 5,
            "totalMessages": 11,
            "tokens": {"input": 100, "output": 50, "cacheRead": 10, "total": 160},
            "cost": 0.012
        }))
        .unwrap();

        assert_eq!(stats.tool_calls, 5);
        assert_eq!(stats.tokens.cache_read, 10);
        assert_eq!(stats.tokens.cache_write, 0);
        assert!((stats.cost - 0.012).abs() < f64::EPSILON);
    }

    #[test]
    fn test_bash_result_decode() {
        let result: BashResult = serde_json::from_value(json!({
            "output": "hello\n",
            "exitCode": 0,
            "cancelled": false,
            "truncated": false
        }))
        .unwrap();

        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.output, "hello\n");
        assert!(result.full_output_path.is_none());
    }

    #[test]
    fn test_cycle_model_result_decode() {
        let result: CycleModelResult = serde_json::from_value(json!({
            "model": {"id": "o3", "provider": "openai"},
            "thinkingLevel": "high",
            "isScoped": false
        }))
        .unwrap();

        assert_eq!(result.model.id(), "o3");
        assert_eq!(result.thinking_level.as_deref(), Some("high"));
    }
}
