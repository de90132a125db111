//! Testing utilities
//!
//! Provides a mock transport for exercising the correlator and router
//! without an agent process.

use async_trait::async_trait;
use indusagi_transport::{ProcessState, Result, Transport, TransportError};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{Mutex, mpsc, watch};

/// Mock transport that records written lines
///
/// Allows tests to:
/// - Inspect every line written, in order
/// - Wait for the next written line
/// - Simulate write failures
/// - Pretend a process of any generation is running
pub struct MockTransport {
    written: Mutex<Vec<String>>,
    line_tx: mpsc::UnboundedSender<String>,
    line_rx: Mutex<mpsc::UnboundedReceiver<String>>,
    fail_writes: AtomicBool,
    generation: AtomicU64,
    ready_calls: AtomicUsize,
    state: watch::Sender<ProcessState>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Create a mock standing in for a freshly spawned process (generation 1)
    pub fn new() -> Self {
        let (line_tx, line_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ProcessState::Starting);
        Self {
            written: Mutex::new(Vec::new()),
            line_tx,
            line_rx: Mutex::new(line_rx),
            fail_writes: AtomicBool::new(false),
            generation: AtomicU64::new(1),
            ready_calls: AtomicUsize::new(0),
            state,
        }
    }

    /// Make every subsequent write fail with a closed stdin
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Pretend a new process was spawned
    pub fn set_generation(&self, generation: u64) {
        self.generation.store(generation, Ordering::SeqCst);
        self.state.send_replace(ProcessState::Starting);
    }

    /// Set the reported lifecycle state
    pub fn set_state(&self, state: ProcessState) {
        self.state.send_replace(state);
    }

    /// All lines written so far
    pub async fn lines(&self) -> Vec<String> {
        self.written.lock().await.clone()
    }

    /// All lines written so far, parsed as JSON
    pub async fn sent_values(&self) -> Vec<Value> {
        self.written
            .lock()
            .await
            .iter()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// Wait for the next written line
    pub async fn next_line(&self) -> String {
        // The sender lives as long as `self`, so the channel never closes.
        self.line_rx.lock().await.recv().await.unwrap_or_default()
    }

    /// Wait for the next written line and parse it
    pub async fn next_value(&self) -> Value {
        serde_json::from_str(&self.next_line().await).unwrap_or(Value::Null)
    }

    /// How many times readiness was signalled
    pub fn ready_calls(&self) -> usize {
        self.ready_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn write_line(&self, line: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TransportError::StdinClosed);
        }
        self.written.lock().await.push(line.to_string());
        let _ = self.line_tx.send(line.to_string());
        Ok(())
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn mark_ready(&self) {
        self.ready_calls.fetch_add(1, Ordering::SeqCst);
        self.state.send_if_modified(|state| {
            if *state == ProcessState::Starting {
                *state = ProcessState::Ready;
                true
            } else {
                false
            }
        });
    }

    fn state(&self) -> ProcessState {
        *self.state.borrow()
    }
}
