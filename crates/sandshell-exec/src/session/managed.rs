//! One PTY-backed interactive shell

use crate::constants::OUTPUT_SETTLE_MS;
use crate::error::Result;
use crate::launcher::{self, LaunchSpec, ProcessHandle};
use crate::output::SessionOutputBuffer;
use crate::types::{SessionId, SessionSnapshot, TerminalMode};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// A live session owned by the registry.
pub(crate) struct ManagedSession {
    pub id: SessionId,
    pub command: String,
    pub cwd: String,
    pub started_at: DateTime<Utc>,
    pub opened: Instant,
    pub last_activity: Instant,
    pub idle_timeout: Duration,
    buffer: Arc<SessionOutputBuffer>,
    process: ProcessHandle,
    exited_at: Option<Instant>,
    closed: bool,
}

impl ManagedSession {
    /// Launch `spec` on a PTY and start buffering its output.
    pub fn open(
        id: SessionId,
        spec: LaunchSpec,
        idle_timeout: Duration,
        output_budget: usize,
    ) -> Result<Self> {
        debug_assert_eq!(spec.mode, TerminalMode::Pty);
        let buffer = Arc::new(SessionOutputBuffer::new(output_budget));
        let process = launcher::launch(&spec, buffer.clone())?;
        let now = Instant::now();

        Ok(Self {
            id,
            command: spec.command,
            cwd: spec.cwd.display().to_string(),
            started_at: Utc::now(),
            opened: now,
            last_activity: now,
            idle_timeout,
            buffer,
            process,
            exited_at: None,
            closed: false,
        })
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn is_idle(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_activity) >= self.idle_timeout
    }

    /// Recomputed on every call; never cached past the child's exit.
    pub fn is_alive(&mut self) -> bool {
        let alive = self.process.is_alive();
        if !alive && self.exited_at.is_none() {
            self.exited_at = Some(Instant::now());
        }
        alive
    }

    /// The child is gone and its remaining output has either been delivered
    /// or had long enough to arrive.
    pub fn output_settled(&mut self) -> bool {
        if self.is_alive() {
            return false;
        }
        self.process.output_finished()
            || self
                .exited_at
                .is_some_and(|t| t.elapsed() >= Duration::from_millis(OUTPUT_SETTLE_MS))
    }

    pub async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.process.write(bytes).await
    }

    pub fn drain(&self, max_bytes: usize) -> (Vec<u8>, bool) {
        self.buffer.drain(max_bytes)
    }

    pub fn has_pending_output(&self) -> bool {
        !self.buffer.is_empty()
    }

    pub fn snapshot(&mut self) -> SessionSnapshot {
        let alive = self.is_alive();
        SessionSnapshot {
            id: self.id.clone(),
            command: self.command.clone(),
            cwd: self.cwd.clone(),
            started_at: self.started_at,
            alive,
            exit_code: if alive { None } else { self.process.exit_code() },
        }
    }

    /// SIGTERM if still running, then detach the reader and close the
    /// master. Never escalates to SIGKILL. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if self.is_alive() {
            self.process.terminate();
        }
        self.process.close_streams();
        debug!(session_id = %self.id, pid = self.process.pid(), "Session closed");
    }
}

impl Drop for ManagedSession {
    fn drop(&mut self) {
        self.close();
    }
}
