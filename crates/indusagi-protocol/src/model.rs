//! Model descriptors and thinking levels

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// A model as listed by `get_available_models`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    /// Model identifier within its provider
    pub id: String,

    /// Human readable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Provider name (openai, anthropic, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Whether the model supports reasoning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<bool>,

    /// Context window in tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window: Option<u64>,

    /// Other fields reported by the agent
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ModelDescriptor {
    /// `provider::id` key, or the bare id when there is no provider
    pub fn qualified_id(&self) -> String {
        match &self.provider {
            Some(provider) if !provider.is_empty() => format!("{}::{}", provider, self.id),
            _ => self.id.clone(),
        }
    }

    /// Display label, preferring the name and prefixing the provider
    pub fn label(&self) -> String {
        let base = self.name.as_deref().unwrap_or(&self.id);
        match &self.provider {
            Some(provider) if !base.contains(provider.as_str()) => format!("{provider} / {base}"),
            _ => base.to_string(),
        }
    }
}

/// The active model as reported in agent state
///
/// Older agents report a bare identifier, newer ones the full descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelRef {
    /// Bare model identifier
    Id(String),
    /// Full descriptor
    Descriptor(ModelDescriptor),
}

impl ModelRef {
    /// Model identifier
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Descriptor(model) => &model.id,
        }
    }

    /// Provider, if known
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::Id(_) => None,
            Self::Descriptor(model) => model.provider.as_deref(),
        }
    }
}

impl From<&str> for ModelRef {
    fn from(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

/// Thinking effort level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingLevel {
    /// Reasoning disabled
    Off,
    /// Minimal effort
    Minimal,
    /// Low effort
    Low,
    /// Medium effort
    Medium,
    /// High effort
    High,
    /// Extra-high effort
    Xhigh,
}

impl ThinkingLevel {
    /// All levels, lowest first
    pub const ALL: [ThinkingLevel; 6] = [
        Self::Off,
        Self::Minimal,
        Self::Low,
        Self::Medium,
        Self::High,
        Self::Xhigh,
    ];

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Minimal => "minimal",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Xhigh => "xhigh",
        }
    }
}

impl std::fmt::Display for ThinkingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThinkingLevel {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == normalized)
            .ok_or_else(|| ProtocolError::UnknownThinkingLevel(s.to_string()))
    }
}
