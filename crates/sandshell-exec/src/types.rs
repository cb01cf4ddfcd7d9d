//! Request, result and snapshot types shared by exec and session APIs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// How a child process is wired to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalMode {
    /// Separate stdout and stderr pipes (default)
    #[default]
    Pipes,
    /// One merged stream through a pseudo-terminal
    Pty,
}

/// A one-shot command to run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionRequest {
    /// Shell command text, run as `<shell> -c <command>`
    pub command: String,
    /// Virtual working directory, resolved by the [`crate::WorkspaceResolver`]
    pub cwd: Option<String>,
    /// Deadline; falls back to the engine default when `None`
    pub timeout: Option<Duration>,
    /// Overrides the engine's default terminal mode
    pub terminal_mode: Option<TerminalMode>,
    /// Extra variables set on top of the forwarded environment
    pub env: HashMap<String, String>,
}

impl ExecutionRequest {
    /// Create a request for `command` with engine defaults.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    /// Set the virtual working directory.
    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set the deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the terminal mode.
    #[must_use]
    pub fn with_terminal_mode(mut self, mode: TerminalMode) -> Self {
        self.terminal_mode = Some(mode);
        self
    }

    /// Add one environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Outcome of one `execute` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Exit code; 124 on timeout, `128 + signal` when killed by a signal
    pub exit_code: i32,
    /// Captured stdout (the merged stream in PTY mode)
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
    /// Whether any output byte was dropped at the cap
    pub truncated: bool,
    /// Whether the deadline fired
    pub timed_out: bool,
}

/// Opaque, never-reused session handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

static NEXT_SESSION_SEQ: AtomicU64 = AtomicU64::new(1);

impl SessionId {
    /// Generate a fresh id. The sequence prefix keeps ids unique for the
    /// lifetime of the process; the uuid suffix keeps them unguessable.
    #[must_use]
    pub fn generate() -> Self {
        let seq = NEXT_SESSION_SEQ.fetch_add(1, Ordering::Relaxed);
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("sh-{seq:06}-{}", &nonce[..12]))
    }

    /// Borrow the id as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// An interactive shell to open.
#[derive(Debug, Clone, Default)]
pub struct SessionOpenRequest {
    /// Command to run; the configured shell itself when empty
    pub command: String,
    /// Virtual working directory
    pub cwd: Option<String>,
    /// Idle window after which the session is evicted
    pub idle_timeout: Option<Duration>,
    /// Extra variables set on top of the forwarded environment
    pub env: HashMap<String, String>,
}

impl SessionOpenRequest {
    /// Create a request for `command`.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    /// Set the virtual working directory.
    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set the idle timeout.
    #[must_use]
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = Some(idle_timeout);
        self
    }
}

/// Read-only projection of a live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Session handle
    pub id: SessionId,
    /// Command the session was opened with
    pub command: String,
    /// Resolved working directory
    pub cwd: String,
    /// Wall-clock open time
    pub started_at: DateTime<Utc>,
    /// Whether the child process is still running (recomputed per call)
    pub alive: bool,
    /// Exit code once the child is gone
    pub exit_code: Option<i32>,
}

/// Output returned by one session read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReadResult {
    /// Drained output
    pub stdout: String,
    /// Always empty for PTY-backed sessions
    pub stderr: String,
    /// Child is dead and every byte has been delivered
    pub eof: bool,
    /// Bytes were dropped since the previous read that reported truncation
    pub truncated: bool,
}
