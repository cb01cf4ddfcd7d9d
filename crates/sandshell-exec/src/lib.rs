//! Sandshell Exec - Confined Command Execution Engine
//!
//! This crate runs shell commands on behalf of an agent:
//! - Exec: one-shot `execute` with deadline, terminate/kill escalation and output cap
//! - Session: long-lived PTY shells with `open`/`write`/`read`/`close`/`list`
//! - Launcher: child processes wired to pipes or to a pseudo-terminal
//!
//! Deciding *whether* a command may run is left to the caller.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
mod constants;
pub mod env;
pub mod error;
pub mod exec;
pub mod launcher;
pub mod output;
pub mod session;
pub mod types;
pub mod workspace;

pub use config::ExecConfig;
pub use error::{Error, Result};
pub use exec::ExecutionEngine;
pub use launcher::{LaunchSpec, ProcessHandle};
pub use output::{OutputCollector, SessionOutputBuffer, StreamKind};
pub use session::{sort_snapshots, SessionManager};
pub use types::{
    ExecutionRequest, ExecutionResult, SessionId, SessionOpenRequest, SessionReadResult,
    SessionSnapshot, TerminalMode,
};
pub use workspace::{JailedWorkspace, WorkspaceResolver};
