//! Process configuration and the handle to a running agent process

use crate::error::{Result, TransportError};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::process::{ChildStdin, Command};
use tokio::sync::{Mutex, oneshot};

/// Configuration for spawning the agent process
#[derive(Clone, Debug)]
pub struct ProcessConfig {
    /// Path to the agent executable
    pub cli_path: String,

    /// Arguments to pass to the agent
    pub args: Vec<String>,

    /// Environment variables to set
    pub env: HashMap<String, String>,

    /// Start the child with an empty environment
    ///
    /// When set, only the variables in `env` are passed to the child.
    pub clear_env: bool,

    /// Working directory of the child
    pub working_dir: Option<PathBuf>,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self::new("indusagi")
    }
}

impl ProcessConfig {
    /// Machine-readable protocol, no interactive session
    pub const RPC_ARGS: [&'static str; 3] = ["--mode", "rpc", "--no-session"];

    /// Create a new process configuration with the RPC invocation flags
    pub fn new(cli_path: impl Into<String>) -> Self {
        Self {
            cli_path: cli_path.into(),
            args: Self::RPC_ARGS.iter().map(|arg| (*arg).to_string()).collect(),
            env: HashMap::new(),
            clear_env: false,
            working_dir: None,
        }
    }

    /// Add an argument
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Replace the argument list
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set an environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Start the child with only the variables set via [`ProcessConfig::with_env`]
    pub fn with_clear_env(mut self, clear: bool) -> Self {
        self.clear_env = clear;
        self
    }

    /// Set the working directory
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Build the command with all three streams piped
    pub(crate) fn command(&self) -> Command {
        let mut cmd = Command::new(&self.cli_path);
        cmd.args(&self.args);

        if self.clear_env {
            cmd.env_clear();
        }
        cmd.envs(&self.env);

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd
    }
}

pub(crate) type SharedStdin = Arc<Mutex<Option<BufWriter<ChildStdin>>>>;

/// Handle to a running agent process
///
/// The child itself is owned by its exit-watcher task; the handle keeps the
/// write end of stdin and the means to stop the process.
pub(crate) struct ProcessHandle {
    pub(crate) generation: u64,
    pub(crate) pid: Option<u32>,
    pub(crate) stdin: SharedStdin,
    kill_tx: Option<oneshot::Sender<()>>,
}

impl ProcessHandle {
    pub(crate) fn new(
        generation: u64,
        pid: Option<u32>,
        stdin: ChildStdin,
        kill_tx: oneshot::Sender<()>,
    ) -> Self {
        Self {
            generation,
            pid,
            stdin: Arc::new(Mutex::new(Some(BufWriter::new(stdin)))),
            kill_tx: Some(kill_tx),
        }
    }

    /// Close stdin, which the agent sees as end of input
    pub(crate) async fn close_stdin(&self) {
        if let Some(mut writer) = self.stdin.lock().await.take() {
            let _ = writer.shutdown().await;
        }
    }

    /// Ask the process to exit
    ///
    /// Sends SIGTERM where available; otherwise, or if signalling fails, the
    /// exit watcher kills the child.
    pub(crate) fn terminate(&mut self) {
        if let Some(pid) = self.pid
            && send_sigterm(pid)
        {
            return;
        }
        if let Some(kill_tx) = self.kill_tx.take() {
            let _ = kill_tx.send(());
        }
    }
}

/// Write one line plus newline and flush, as a single locked operation
pub(crate) async fn write_line(stdin: &SharedStdin, line: &str) -> Result<()> {
    let mut guard = stdin.lock().await;
    let writer = guard.as_mut().ok_or(TransportError::StdinClosed)?;

    let result = async {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await
    }
    .await;

    match result {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => {
            *guard = None;
            Err(TransportError::StdinClosed)
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(unix)]
fn send_sigterm(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(raw), Signal::SIGTERM) {
        // Already gone counts as delivered.
        Ok(()) | Err(Errno::ESRCH) => true,
        Err(err) => {
            tracing::warn!(pid, error = %err, "Failed to send SIGTERM");
            false
        }
    }
}

#[cfg(not(unix))]
fn send_sigterm(_pid: u32) -> bool {
    false
}
