//! Agent client configuration

use crate::error::{AgentError, Result};
use indusagi_transport::ProcessConfig;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default deadline for a single request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of remembered sessions
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Environment variable carrying the provider API key to the agent
pub const API_KEY_ENV: &str = "INDUSAGI_API_KEY";

/// Configuration for an [`AgentClient`](crate::AgentClient)
///
/// Controls how the agent process is launched and how long requests may
/// wait for their reply.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Path to the agent executable
    pub agent_path: String,

    /// Base arguments, before `--provider`/`--model`
    pub args: Vec<String>,

    /// Provider passed as `--provider`
    pub provider: Option<String>,

    /// Model passed as `--model`
    pub model: Option<String>,

    /// Extra environment for the agent process
    pub env: HashMap<String, String>,

    /// Working directory of the agent process
    pub working_dir: Option<PathBuf>,

    /// Timeout for individual requests
    pub request_timeout: Duration,

    /// Start the agent on first request instead of requiring `start()`
    pub auto_start: bool,

    /// Maximum number of entries in the session history
    pub history_limit: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_path: "indusagi".to_string(),
            args: ProcessConfig::RPC_ARGS
                .iter()
                .map(|arg| (*arg).to_string())
                .collect(),
            provider: None,
            model: None,
            env: HashMap::new(),
            working_dir: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            auto_start: true,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl AgentConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from environment variables
    ///
    /// Reads `INDUSAGI_PATH`, `INDUSAGI_PROVIDER`, `INDUSAGI_MODEL`,
    /// `INDUSAGI_REQUEST_TIMEOUT` (seconds) and `INDUSAGI_API_KEY`. The API
    /// key is only forwarded to the agent's environment.
    pub fn from_env() -> Result<Self> {
        use std::env;

        let mut config = Self::default();

        if let Ok(path) = env::var("INDUSAGI_PATH")
            && !path.trim().is_empty()
        {
            config.agent_path = path;
        }

        if let Ok(provider) = env::var("INDUSAGI_PROVIDER")
            && !provider.trim().is_empty()
        {
            config.provider = Some(provider);
        }

        if let Ok(model) = env::var("INDUSAGI_MODEL")
            && !model.trim().is_empty()
        {
            config.model = Some(model);
        }

        if let Ok(timeout_str) = env::var("INDUSAGI_REQUEST_TIMEOUT") {
            let secs = timeout_str.trim().parse::<u64>().map_err(|_| {
                AgentError::Config(format!(
                    "INDUSAGI_REQUEST_TIMEOUT must be a number of seconds, got {timeout_str:?}"
                ))
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Ok(api_key) = env::var(API_KEY_ENV)
            && !api_key.is_empty()
        {
            config.env.insert(API_KEY_ENV.to_string(), api_key);
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the agent executable path
    pub fn with_agent_path(mut self, path: impl Into<String>) -> Self {
        self.agent_path = path.into();
        self
    }

    /// Replace the base arguments
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the provider
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Set the model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set an environment variable for the agent process
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the API key forwarded as `INDUSAGI_API_KEY`
    pub fn with_api_key(self, api_key: impl Into<String>) -> Self {
        self.with_env(API_KEY_ENV, api_key)
    }

    /// Set the working directory
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Enable or disable starting the agent on first request
    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    /// Set the session history bound
    ///
    /// A limit of zero is raised to one.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = std::cmp::max(limit, 1);
        self
    }

    /// Check the configuration for values the client cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.agent_path.trim().is_empty() {
            return Err(AgentError::Config("agent path is empty".to_string()));
        }
        if self.request_timeout.is_zero() {
            return Err(AgentError::Config(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Full argument list, including `--provider` and `--model`
    pub fn command_args(&self) -> Vec<String> {
        let mut args = self.args.clone();
        if let Some(provider) = &self.provider {
            args.push("--provider".to_string());
            args.push(provider.clone());
        }
        if let Some(model) = &self.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        args
    }

    /// Process configuration for the transport
    pub fn to_process_config(&self) -> ProcessConfig {
        let mut process = ProcessConfig::new(&self.agent_path).with_args(self.command_args());
        for (key, value) in &self.env {
            process = process.with_env(key, value);
        }
        if let Some(dir) = &self.working_dir {
            process = process.with_working_dir(dir);
        }
        process
    }
}
