//! Recently used sessions
//!
//! The router reports every new session file it sees through the
//! [`SessionHistory`] trait. [`SessionHistoryStore`] is an in-memory,
//! most-recent-first implementation with user-assigned aliases; persisting
//! it is up to the embedding application (entries are serde types).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Receives session files as the agent switches between them
pub trait SessionHistory: Send + Sync {
    /// Record that `path` became the active session
    fn record(&self, path: &str);
}

/// One remembered session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionHistoryEntry {
    /// Session file path
    pub path: String,

    /// User-assigned display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// When the session was last active
    pub last_used: DateTime<Utc>,
}

impl SessionHistoryEntry {
    /// Alias if set, otherwise the file name without extension
    pub fn label(&self) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        Path::new(&self.path)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.clone())
    }
}

/// Bounded in-memory session history
#[derive(Debug)]
pub struct SessionHistoryStore {
    limit: usize,
    entries: Mutex<VecDeque<SessionHistoryEntry>>,
}

impl Default for SessionHistoryStore {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_HISTORY_LIMIT)
    }
}

impl SessionHistoryStore {
    /// Create an empty store keeping at most `limit` entries
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Restore previously saved entries, most recent first
    pub fn from_entries(limit: usize, entries: impl IntoIterator<Item = SessionHistoryEntry>) -> Self {
        let store = Self::new(limit);
        {
            let mut guard = store.lock();
            for entry in entries {
                if guard.len() == store.limit {
                    break;
                }
                if guard.iter().all(|e| e.path != entry.path) {
                    guard.push_back(entry);
                }
            }
        }
        store
    }

    /// Maximum number of entries
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Entries, most recent first
    pub fn entries(&self) -> Vec<SessionHistoryEntry> {
        self.lock().iter().cloned().collect()
    }

    /// Look up one entry
    pub fn get(&self, path: &str) -> Option<SessionHistoryEntry> {
        self.lock().iter().find(|e| e.path == path).cloned()
    }

    /// Set or clear the alias of a remembered session
    ///
    /// A blank alias clears it. Returns `false` if the path is unknown.
    pub fn set_alias(&self, path: &str, alias: &str) -> bool {
        let mut entries = self.lock();
        let Some(entry) = entries.iter_mut().find(|e| e.path == path) else {
            return false;
        };
        let alias = alias.trim();
        entry.alias = (!alias.is_empty()).then(|| alias.to_string());
        true
    }

    /// Forget a session
    pub fn remove(&self, path: &str) -> bool {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|e| e.path != path);
        entries.len() != before
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<SessionHistoryEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionHistory for SessionHistoryStore {
    fn record(&self, path: &str) {
        if path.is_empty() {
            return;
        }

        let mut entries = self.lock();
        let existing = entries.iter().position(|e| e.path == path);
        let alias = existing
            .and_then(|index| entries.remove(index))
            .and_then(|entry| entry.alias);

        entries.push_front(SessionHistoryEntry {
            path: path.to_string(),
            alias,
            last_used: Utc::now(),
        });
        entries.truncate(self.limit);
    }
}
