//! One-shot execution coordinator
//!
//! `launching → running → (exited | timed out | cancelled) → terminating →
//! killed? → draining → done`
//!
//! Liveness is polled on a fixed interval against a monotonic deadline.
//! Timeouts and cancellation both escalate SIGTERM → grace window → SIGKILL
//! before output is drained, so no child outlives its call.

mod escalation;


use crate::config::ExecConfig;
use crate::constants::{DRAIN_TIMEOUT_MS, EXEC_TIMEOUT_EXIT_CODE, TIMEOUT_MESSAGE};
use crate::env::build_child_env;
use crate::error::Result;
use crate::launcher::{self, LaunchSpec};
use crate::output::OutputCollector;
use crate::types::{ExecutionRequest, ExecutionResult, TerminalMode};
use crate::workspace::{ensure_directory, JailedWorkspace, WorkspaceResolver};
use escalation::{escalate, EscalationGuard};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Exited,
    TimedOut,
    Cancelled,
}

/// Runs one-shot commands under a deadline and output cap.
#[derive(Clone)]
pub struct ExecutionEngine {
    config: Arc<ExecConfig>,
    resolver: Arc<dyn WorkspaceResolver>,
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ExecutionEngine {
    /// Create an engine that jails working directories under
    /// `config.workspace_root`.
    #[must_use]
    pub fn new(config: ExecConfig) -> Self {
        let resolver = Arc::new(JailedWorkspace::new(config.workspace_root.clone()));
        Self::with_resolver(config, resolver)
    }

    /// Create an engine with a caller-provided directory resolver.
    #[must_use]
    pub fn with_resolver(config: ExecConfig, resolver: Arc<dyn WorkspaceResolver>) -> Self {
        Self {
            config: Arc::new(config),
            resolver,
        }
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &ExecConfig {
        &self.config
    }

    /// Resolve the directory, re-check that it exists, and assemble the
    /// child's launch spec.
    pub(crate) fn prepare(
        &self,
        command: &str,
        cwd: Option<&str>,
        mode: TerminalMode,
        env: &HashMap<String, String>,
    ) -> Result<LaunchSpec> {
        let resolved = self.resolver.resolve(cwd)?;
        let cwd = ensure_directory(&resolved)?;
        Ok(LaunchSpec {
            shell: self.config.shell.clone(),
            command: command.to_string(),
            cwd,
            mode,
            env: build_child_env(self.config.env_allowlist.as_deref(), env),
        })
    }

    /// Run a command to completion or deadline.
    ///
    /// A non-zero exit is a normal result. A timeout yields exit code 124
    /// with "command timed out" appended to stderr.
    pub async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionResult> {
        self.execute_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Like [`execute`](Self::execute), but cancelling `cancel` stops the
    /// child with the same terminate/kill escalation as a timeout. The
    /// result then carries the child's own (signal) exit code.
    pub async fn execute_with_cancel(
        &self,
        request: ExecutionRequest,
        cancel: CancellationToken,
    ) -> Result<ExecutionResult> {
        let mode = request.terminal_mode.unwrap_or(self.config.terminal_mode);
        let spec = self.prepare(&request.command, request.cwd.as_deref(), mode, &request.env)?;
        let timeout = self.config.effective_timeout(request.timeout);
        let grace = self.config.kill_grace();
        let poll = self.config.poll_interval();

        let collector = Arc::new(OutputCollector::new(self.config.max_output_bytes));
        let mut handle = launcher::launch(&spec, collector.clone())?;
        let mut guard = EscalationGuard::new(handle.pid(), grace);
        let started = Instant::now();
        let deadline = timeout.map(|t| started + t);

        let outcome = loop {
            if !handle.is_alive() {
                break Outcome::Exited;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break Outcome::TimedOut;
            }
            tokio::select! {
                _ = cancel.cancelled() => break Outcome::Cancelled,
                _ = tokio::time::sleep(poll) => {}
            }
        };

        let killed = match outcome {
            Outcome::Exited => false,
            Outcome::TimedOut => {
                info!(
                    pid = handle.pid(),
                    timeout_ms = timeout.map_or(0, |t| t.as_millis() as u64),
                    "Command timed out"
                );
                escalate(&mut handle, grace, poll).await
            }
            Outcome::Cancelled => {
                info!(pid = handle.pid(), "Command cancelled by caller");
                escalate(&mut handle, grace, poll).await
            }
        };
        guard.disarm();

        handle
            .drain_and_close(Duration::from_millis(DRAIN_TIMEOUT_MS))
            .await;

        let timed_out = outcome == Outcome::TimedOut;
        let output = collector.snapshot();
        let exit_code = if timed_out {
            EXEC_TIMEOUT_EXIT_CODE
        } else {
            handle.exit_code().unwrap_or(-1)
        };

        let mut stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if timed_out {
            append_line(&mut stderr, TIMEOUT_MESSAGE);
        }

        debug!(
            pid = handle.pid(),
            exit_code,
            timed_out,
            killed,
            truncated = output.truncated,
            duration_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );

        Ok(ExecutionResult {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr,
            truncated: output.truncated,
            timed_out,
        })
    }
}

/// Append `line`, separated by a newline when `text` is non-empty.
fn append_line(text: &mut String, line: &str) {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(line);
}
