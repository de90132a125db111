//! Request identifiers and outbound line encoding
//!
//! Every outbound message is a single JSON object of the shape
//! `{ "type": <command>, "id": "req-<N>", ...fields }` terminated by a newline.

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const PREFIX: &str = "req-";

/// Correlation identifier of a request/reply pair
///
/// Format: `req-<N>` where `N` is allocated from a monotonically increasing
/// counter. Identifiers received from the agent are kept verbatim, so a
/// foreign id that does not follow the format still round-trips.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Build the identifier for sequence number `n`
    pub fn from_sequence(n: u64) -> Self {
        Self(format!("{PREFIX}{n}"))
    }

    /// Create from raw string
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Sequence number, if the id has the `req-<N>` form
    pub fn sequence(&self) -> Option<u64> {
        self.0.strip_prefix(PREFIX)?.parse().ok()
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Encode one outbound request as a JSON line (without the trailing newline)
///
/// `type` and `id` always win over same-named keys in `params`, so a command
/// payload can never forge another request's identifier.
pub fn encode_request(command: &str, id: &RequestId, params: Map<String, Value>) -> Result<String> {
    if command.is_empty() {
        return Err(ProtocolError::MissingField("type".to_string()));
    }

    let mut object = params;
    object.insert("type".to_string(), Value::String(command.to_string()));
    object.insert("id".to_string(), Value::String(id.as_str().to_string()));

    Ok(serde_json::to_string(&Value::Object(object))?)
}

/// Convert a params value into the field map of a request
///
/// `null` is treated as "no params"; anything that is not an object is an error.
pub fn params_to_map(params: Value) -> Result<Map<String, Value>> {
    match params {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map),
        other => Err(ProtocolError::InvalidMessage(format!(
            "request params must be a JSON object, got {other}"
        ))),
    }
}
