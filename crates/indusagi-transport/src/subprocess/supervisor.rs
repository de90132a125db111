//! Agent process supervisor
//!
//! Spawns the agent lazily, forwards its stdout as framed lines and reports
//! its exit. Every spawn gets a new generation number; lines and exit events
//! carry it so the consumer can ignore anything from a process that has
//! already been replaced.

use super::process::{self, ProcessConfig, ProcessHandle};
use crate::error::{Result, TransportError};
use crate::framer::LineFramer;
use crate::lifecycle::ProcessState;
use crate::traits::{Transport, TransportEvent};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout};
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

const READ_CHUNK_SIZE: usize = 8192;

struct Shared {
    handle: Mutex<Option<ProcessHandle>>,
    state: watch::Sender<ProcessState>,
    generation: AtomicU64,
}

impl Shared {
    /// Called by the stdout reader once the process is gone
    async fn mark_terminated(&self, generation: u64) {
        let slot = self.handle.lock().await;
        match slot.as_ref() {
            Some(handle) if handle.generation == generation => {
                handle.close_stdin().await;
                self.state.send_replace(ProcessState::Terminated);
            }
            // Stopped deliberately or already replaced.
            _ => debug!(generation, "Exit of a process that is no longer current"),
        }
    }
}

/// Supervises the single agent process
///
/// At most one process exists at a time. All mutation of the process handle
/// goes through one mutex, so concurrent [`ProcessSupervisor::ensure_running`]
/// calls spawn only once.
pub struct ProcessSupervisor {
    config: ProcessConfig,
    events: mpsc::UnboundedSender<TransportEvent>,
    shared: Arc<Shared>,
}

impl ProcessSupervisor {
    /// Create a supervisor; nothing is spawned until [`ProcessSupervisor::ensure_running`]
    pub fn new(config: ProcessConfig, events: mpsc::UnboundedSender<TransportEvent>) -> Self {
        let (state, _) = watch::channel(ProcessState::Stopped);
        Self {
            config,
            events,
            shared: Arc::new(Shared {
                handle: Mutex::new(None),
                state,
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// The configuration processes are spawned with
    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    /// Spawn the agent unless a live process already exists
    ///
    /// A process that has exited is replaced by a fresh one with the next
    /// generation number.
    pub async fn ensure_running(&self) -> Result<()> {
        let mut slot = self.shared.handle.lock().await;
        if slot.is_some() && self.state() != ProcessState::Terminated {
            return Ok(());
        }
        if let Some(old) = slot.take() {
            debug!(generation = old.generation, "Replacing terminated agent process");
        }

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut child = match self.config.command().spawn() {
            Ok(child) => child,
            Err(source) => {
                error!(
                    path = %self.config.cli_path,
                    error = %source,
                    "Failed to spawn agent process"
                );
                self.shared.state.send_replace(ProcessState::Terminated);
                return Err(TransportError::Spawn {
                    path: self.config.cli_path.clone(),
                    source,
                });
            }
        };

        let (stdin, stdout, stderr) =
            match (child.stdin.take(), child.stdout.take(), child.stderr.take()) {
                (Some(stdin), Some(stdout), Some(stderr)) => (stdin, stdout, stderr),
                _ => {
                    self.shared.state.send_replace(ProcessState::Terminated);
                    return Err(TransportError::Process(
                        "agent stdio was not piped".to_string(),
                    ));
                }
            };

        let pid = child.id();
        let (kill_tx, kill_rx) = oneshot::channel();
        let (exit_tx, exit_rx) = oneshot::channel();

        self.shared.state.send_replace(ProcessState::Starting);
        tokio::spawn(wait_for_exit(child, kill_rx, exit_tx, generation));
        tokio::spawn(log_stderr(stderr, generation));
        tokio::spawn(read_stdout(
            stdout,
            generation,
            self.events.clone(),
            exit_rx,
            Arc::clone(&self.shared),
        ));

        *slot = Some(ProcessHandle::new(generation, pid, stdin, kill_tx));
        info!(pid, generation, path = %self.config.cli_path, "Spawned agent process");
        Ok(())
    }

    /// Stop the process if one is running
    ///
    /// Closes stdin and asks the process to terminate. Calling this with no
    /// process is a no-op. The exit itself is still reported as
    /// [`TransportEvent::Exited`] once the process is gone.
    pub async fn stop(&self) -> Result<()> {
        let handle = self.shared.handle.lock().await.take();
        let was_live = self.state().is_live();
        self.shared.state.send_replace(ProcessState::Stopped);

        let Some(mut handle) = handle else {
            return Ok(());
        };

        handle.close_stdin().await;
        if was_live {
            handle.terminate();
        }
        info!(pid = handle.pid, generation = handle.generation, "Stopped agent process");
        Ok(())
    }

    /// OS process id of the current process
    pub async fn pid(&self) -> Option<u32> {
        self.shared.handle.lock().await.as_ref().and_then(|h| h.pid)
    }

    /// Watch lifecycle transitions
    pub fn subscribe_state(&self) -> watch::Receiver<ProcessState> {
        self.shared.state.subscribe()
    }
}

#[async_trait]
impl Transport for ProcessSupervisor {
    async fn write_line(&self, line: &str) -> Result<()> {
        // Clone the stdin out so a slow write never holds the handle lock.
        let stdin = {
            let slot = self.shared.handle.lock().await;
            match slot.as_ref() {
                Some(handle) => Arc::clone(&handle.stdin),
                None => return Err(TransportError::NotRunning),
            }
        };
        process::write_line(&stdin, line).await
    }

    fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    fn mark_ready(&self) {
        self.shared.state.send_if_modified(|state| {
            if *state == ProcessState::Starting {
                *state = ProcessState::Ready;
                true
            } else {
                false
            }
        });
    }

    fn state(&self) -> ProcessState {
        *self.shared.state.borrow()
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        // Skipped if a call still holds the handle.
        if let Ok(mut slot) = self.shared.handle.try_lock()
            && let Some(mut handle) = slot.take()
        {
            handle.terminate();
        }
    }
}

async fn wait_for_exit(
    mut child: Child,
    kill_rx: oneshot::Receiver<()>,
    exit_tx: oneshot::Sender<Option<i32>>,
    generation: u64,
) {
    let exited = tokio::select! {
        status = child.wait() => Some(status),
        Ok(()) = kill_rx => None,
    };
    let status = match exited {
        Some(status) => status,
        None => {
            if let Err(err) = child.start_kill() {
                warn!(generation, error = %err, "Failed to kill agent process");
            }
            child.wait().await
        }
    };

    let code = match status {
        Ok(status) => {
            info!(generation, status = %status, "Agent process exited");
            status.code()
        }
        Err(err) => {
            warn!(generation, error = %err, "Failed to wait for agent process");
            None
        }
    };
    let _ = exit_tx.send(code);
}

/// Log stderr line by line until the pipe closes
///
/// Bytes are decoded lossily so arbitrary output never stops the drain; a
/// closed reader would make the agent's next stderr write fail.
async fn log_stderr(stderr: ChildStderr, generation: u64) {
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']);
                if !line.trim().is_empty() {
                    warn!(generation, stderr = %line, "Agent stderr");
                }
            }
            Err(err) => {
                debug!(generation, error = %err, "Agent stderr read failed");
                break;
            }
        }
    }
}

async fn read_stdout(
    mut stdout: ChildStdout,
    generation: u64,
    events: mpsc::UnboundedSender<TransportEvent>,
    exit_rx: oneshot::Receiver<Option<i32>>,
    shared: Arc<Shared>,
) {
    let mut framer = LineFramer::new();
    let mut buf = vec![0u8; READ_CHUNK_SIZE];

    loop {
        match stdout.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                for line in framer.feed(&buf[..n]) {
                    let _ = events.send(TransportEvent::Line { generation, line });
                }
            }
            Err(err) => {
                warn!(generation, error = %err, "Agent stdout read failed");
                break;
            }
        }
    }
    if let Some(line) = framer.finish() {
        let _ = events.send(TransportEvent::Line { generation, line });
    }

    let code = exit_rx.await.ok().flatten();
    shared.mark_terminated(generation).await;
    let _ = events.send(TransportEvent::Exited { generation, code });
}
