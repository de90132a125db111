//! Subprocess transport for the agent
//!
//! Spawns the agent with piped stdio, frames its stdout into lines and tracks
//! its lifecycle.

pub mod process;
pub mod supervisor;

pub use process::ProcessConfig;
pub use supervisor::ProcessSupervisor;
