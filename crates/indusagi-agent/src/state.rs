//! Cached agent state
//!
//! The router owns the only [`StateWriter`]; everyone else reads through a
//! [`StateCache`], either by taking a snapshot or by subscribing to changes.

use indusagi_protocol::AgentState;
use tokio::sync::watch;

/// Create a linked writer/reader pair holding an empty state
pub fn state_channel() -> (StateWriter, StateCache) {
    let (tx, rx) = watch::channel(AgentState::default());
    (StateWriter { tx }, StateCache { rx })
}

/// Write side of the state cache
#[derive(Debug)]
pub struct StateWriter {
    tx: watch::Sender<AgentState>,
}

impl StateWriter {
    /// Replace the whole state with a snapshot
    ///
    /// Returns whether the state changed.
    pub fn replace(&self, state: AgentState) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        })
    }

    /// Merge a partial update
    ///
    /// Returns whether the state changed.
    pub fn merge(&self, patch: AgentState) -> bool {
        self.tx.send_if_modified(|current| current.merge(patch))
    }

    /// Current state
    pub fn snapshot(&self) -> AgentState {
        self.tx.borrow().clone()
    }
}

/// Read side of the state cache
#[derive(Debug, Clone)]
pub struct StateCache {
    rx: watch::Receiver<AgentState>,
}

impl StateCache {
    /// Current state
    pub fn snapshot(&self) -> AgentState {
        self.rx.borrow().clone()
    }

    /// Receiver notified on every change
    pub fn subscribe(&self) -> watch::Receiver<AgentState> {
        self.rx.clone()
    }

    /// Active session file, if known
    pub fn session_file(&self) -> Option<String> {
        self.rx.borrow().session_file.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indusagi_protocol::ModelRef;

    #[test]
    fn test_replace_then_merge() {
        let (writer, cache) = state_channel();

        assert!(writer.replace(AgentState {
            model: Some(ModelRef::from("gpt-4o")),
            message_count: Some(3),
            ..Default::default()
        }));
        assert!(writer.merge(AgentState {
            message_count: Some(4),
            ..Default::default()
        }));

        let state = cache.snapshot();
        assert_eq!(state.model.as_ref().map(ModelRef::id), Some("gpt-4o"));
        assert_eq!(state.message_count, Some(4));
    }

    #[test]
    fn test_replace_drops_missing_fields() {
        let (writer, cache) = state_channel();
        writer.replace(AgentState {
            session_name: Some("old".into()),
            ..Default::default()
        });
        writer.replace(AgentState {
            message_count: Some(0),
            ..Default::default()
        });
        assert_eq!(cache.snapshot().session_name, None);
    }

    #[test]
    fn test_unchanged_merge_does_not_notify() {
        let (writer, cache) = state_channel();
        let mut rx = cache.subscribe();
        writer.replace(AgentState {
            message_count: Some(1),
            ..Default::default()
        });
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        assert!(!writer.merge(AgentState {
            message_count: Some(1),
            ..Default::default()
        }));
        assert!(!rx.has_changed().unwrap());
    }
}
