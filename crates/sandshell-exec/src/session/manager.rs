//! Session registry

use super::managed::ManagedSession;
use super::sort_snapshots;
use crate::config::ExecConfig;
use crate::error::{Error, Result};
use crate::exec::ExecutionEngine;
use crate::types::{SessionId, SessionOpenRequest, SessionReadResult, SessionSnapshot, TerminalMode};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Owns every open session.
///
/// All operations first evict sessions idle past their window. The registry
/// lock is never held across the sleeps of a blocking read.
pub struct SessionManager {
    engine: ExecutionEngine,
    sessions: Mutex<HashMap<SessionId, ManagedSession>>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Create a registry with its own engine built from `config`.
    #[must_use]
    pub fn new(config: ExecConfig) -> Self {
        Self::with_engine(ExecutionEngine::new(config))
    }

    /// Create a registry sharing `engine`'s configuration and resolver.
    #[must_use]
    pub fn with_engine(engine: ExecutionEngine) -> Self {
        Self {
            engine,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn config(&self) -> &ExecConfig {
        self.engine.config()
    }

    /// Start a PTY shell and register it.
    ///
    /// When the registry is full the least recently opened session is
    /// evicted to make room, but only once the new child is running.
    pub async fn open_session(&self, request: SessionOpenRequest) -> Result<SessionId> {
        let spec = self.engine.prepare(
            &request.command,
            request.cwd.as_deref(),
            TerminalMode::Pty,
            &request.env,
        )?;
        let idle_timeout = request
            .idle_timeout
            .unwrap_or_else(|| self.config().session_idle_timeout());

        let mut sessions = self.sessions.lock().await;
        prune_idle(&mut sessions);

        // Launch first so a failed spawn never costs a live session.
        let id = SessionId::generate();
        let session = ManagedSession::open(
            id.clone(),
            spec,
            idle_timeout,
            self.config().max_output_bytes,
        )?;

        let max_sessions = self.config().max_sessions;
        while max_sessions > 0 && sessions.len() >= max_sessions {
            let oldest = sessions
                .values()
                .min_by_key(|s| (s.opened, s.id.clone()))
                .map(|s| s.id.clone());
            let Some(oldest) = oldest else { break };
            if let Some(mut old) = sessions.remove(&oldest) {
                old.close();
                warn!(session_id = %oldest, "Evicted oldest session to make room");
            }
        }

        info!(
            session_id = %id,
            command = %session.command,
            cwd = %session.cwd,
            "Opened session"
        );
        sessions.insert(id.clone(), session);
        Ok(id)
    }

    /// Send raw bytes to the session's terminal.
    pub async fn write_to_session(&self, id: &str, bytes: &[u8]) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        prune_idle(&mut sessions);
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))?;
        session.touch();
        if !session.is_alive() {
            debug!(session_id = %id, "Writing to a session whose process has exited");
        }
        session.write(bytes).await
    }

    /// Drain up to `max_bytes` of buffered output.
    ///
    /// Returns as soon as output is available, once the child has exited and
    /// everything it wrote has been delivered (`eof`), or when `timeout`
    /// elapses. Without a timeout the call waits for one of the first two.
    pub async fn read_from_session(
        &self,
        id: &str,
        max_bytes: usize,
        timeout: Option<Duration>,
    ) -> Result<SessionReadResult> {
        let max_bytes = max_bytes.max(1);
        let deadline = timeout.map(|t| Instant::now() + t);
        let poll = self.config().poll_interval();

        loop {
            {
                let mut sessions = self.sessions.lock().await;
                prune_idle(&mut sessions);
                let session = sessions
                    .get_mut(id)
                    .ok_or_else(|| Error::SessionNotFound(id.to_string()))?;
                session.touch();

                // Settledness is sampled before draining so that bytes
                // delivered in between are never reported behind an eof.
                let settled = session.output_settled();
                let (bytes, truncated) = session.drain(max_bytes);
                let eof = settled && !session.has_pending_output();
                if !bytes.is_empty() || truncated || eof {
                    return Ok(SessionReadResult {
                        stdout: String::from_utf8_lossy(&bytes).into_owned(),
                        stderr: String::new(),
                        eof,
                        truncated,
                    });
                }
            }

            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Ok(SessionReadResult::default());
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Terminate and forget a session. Unknown ids are ignored.
    pub async fn close_session(&self, id: &str) {
        let mut sessions = self.sessions.lock().await;
        prune_idle(&mut sessions);
        if let Some(mut session) = sessions.remove(id) {
            session.close();
            info!(session_id = %id, "Closed session");
        }
    }

    /// Snapshot every open session, newest first.
    pub async fn list_sessions(&self) -> Vec<SessionSnapshot> {
        let mut sessions = self.sessions.lock().await;
        prune_idle(&mut sessions);
        let mut snapshots: Vec<SessionSnapshot> =
            sessions.values_mut().map(ManagedSession::snapshot).collect();
        sort_snapshots(&mut snapshots);
        snapshots
    }

    /// Terminate every session.
    pub async fn close_all(&self) {
        let mut sessions = self.sessions.lock().await;
        let count = sessions.len();
        for (_, mut session) in sessions.drain() {
            session.close();
        }
        if count > 0 {
            info!(count, "Closed all sessions");
        }
    }

    #[cfg(test)]
    pub(super) async fn registered(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Evict idle sessions every `interval` until the manager is dropped.
    pub fn spawn_reaper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let manager: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let Some(manager) = manager.upgrade() else {
                    debug!("Session manager dropped; reaper exiting");
                    break;
                };
                let mut sessions = manager.sessions.lock().await;
                prune_idle(&mut sessions);
            }
        })
    }
}

fn prune_idle(sessions: &mut HashMap<SessionId, ManagedSession>) {
    let now = Instant::now();
    let stale: Vec<SessionId> = sessions
        .values()
        .filter(|s| s.is_idle(now))
        .map(|s| s.id.clone())
        .collect();
    for id in stale {
        if let Some(mut session) = sessions.remove(&id) {
            session.close();
            info!(session_id = %id, "Evicted idle session");
        }
    }
}
