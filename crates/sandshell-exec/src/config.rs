//! Engine configuration types

use crate::constants::*;
use crate::types::TerminalMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the execution engine and session manager.
///
/// Set once at construction; nothing here changes per call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecConfig {
    /// Default deadline for `execute`, in seconds. `None` means no deadline.
    pub default_timeout_secs: Option<u64>,
    /// Upper bound applied to any requested timeout.
    pub max_timeout_secs: u64,
    /// Output cap in bytes, per call and per session.
    pub max_output_bytes: usize,
    /// Parent variables forwarded to children. `PATH` and `HOME` are
    /// always forwarded when set, with or without an allowlist; everything
    /// else in the parent environment is dropped unless listed here.
    pub env_allowlist: Option<Vec<String>>,
    /// Terminal mode for `execute` when the request does not pick one.
    pub terminal_mode: TerminalMode,
    /// Shell used to interpret command text.
    pub shell: String,
    /// Jail root for working directories. Relative paths resolve against
    /// the process cwd when unset.
    pub workspace_root: Option<PathBuf>,
    /// Default idle window for sessions, in seconds.
    pub session_idle_timeout_secs: u64,
    /// How often a spawned reaper sweeps idle sessions, in seconds.
    pub session_reaper_interval_secs: u64,
    /// Maximum concurrently open sessions. Zero disables the cap.
    pub max_sessions: usize,
    /// Grace window between SIGTERM and SIGKILL, in milliseconds.
    pub kill_grace_ms: u64,
    /// Polling interval for liveness and output, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
            max_timeout_secs: MAX_TIMEOUT_SECS,
            max_output_bytes: MAX_OUTPUT_BYTES,
            env_allowlist: None,
            terminal_mode: TerminalMode::default(),
            shell: DEFAULT_SHELL.to_string(),
            workspace_root: None,
            session_idle_timeout_secs: SESSION_IDLE_TIMEOUT_SECS,
            session_reaper_interval_secs: SESSION_REAPER_INTERVAL_SECS,
            max_sessions: MAX_SESSIONS,
            kill_grace_ms: KILL_GRACE_MS,
            poll_interval_ms: POLL_INTERVAL_MS,
        }
    }
}

impl ExecConfig {
    /// Effective deadline for a request: the requested one, else the
    /// default, clamped to `max_timeout_secs`.
    #[must_use]
    pub fn effective_timeout(&self, requested: Option<Duration>) -> Option<Duration> {
        let max = Duration::from_secs(self.max_timeout_secs);
        requested
            .or_else(|| self.default_timeout_secs.map(Duration::from_secs))
            .map(|t| t.min(max))
    }

    /// Default session idle window.
    #[must_use]
    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_timeout_secs)
    }

    /// Sweep interval for [`crate::SessionManager::spawn_reaper`], never zero.
    #[must_use]
    pub fn session_reaper_interval(&self) -> Duration {
        Duration::from_secs(self.session_reaper_interval_secs.max(1))
    }

    /// SIGTERM → SIGKILL grace window.
    #[must_use]
    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }

    /// Polling interval, never zero.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}
