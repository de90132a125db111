//! Process lifecycle state

/// Lifecycle of the agent process
///
/// ```text
/// Stopped --spawn--> Starting --agent_start--> Ready --exit--> Terminated
/// Terminated --spawn--> Starting
/// Starting | Ready --stop--> Stopped
/// ```
///
/// There is no `Ready -> Starting` edge: a fresh process always restarts the
/// whole machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessState {
    /// No process has been started, or it was stopped on purpose
    #[default]
    Stopped,
    /// Spawned, waiting for the agent to announce itself
    Starting,
    /// The agent announced `agent_start`
    Ready,
    /// The process exited or could not be spawned
    Terminated,
}

impl ProcessState {
    /// Whether a process is expected to be alive in this state
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Starting | Self::Ready)
    }
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_stopped() {
        assert_eq!(ProcessState::default(), ProcessState::Stopped);
    }

    #[test]
    fn test_liveness() {
        assert!(ProcessState::Starting.is_live());
        assert!(ProcessState::Ready.is_live());
        assert!(!ProcessState::Stopped.is_live());
        assert!(!ProcessState::Terminated.is_live());
    }
}
