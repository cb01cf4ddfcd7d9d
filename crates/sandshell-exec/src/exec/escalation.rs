//! Terminate → grace → kill escalation
//!
//! Signals go to the child's whole process group. The leader exiting early
//! does not end the escalation: members that ignored SIGTERM still get
//! SIGKILL once the grace window is over.

use crate::constants::KILL_CONFIRM_MS;
use crate::launcher::{group_exists, signal_group, ProcessHandle};
use nix::sys::signal::Signal;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Stop `handle`'s process group: SIGTERM, wait up to `grace` for the group
/// to empty, then SIGKILL whatever is left and poll until the leader is
/// reaped. Returns `true` when SIGKILL reached a live group.
pub(crate) async fn escalate(handle: &mut ProcessHandle, grace: Duration, poll: Duration) -> bool {
    let Some(pid) = handle.pid() else {
        return false;
    };

    handle.terminate();
    let grace_deadline = Instant::now() + grace;
    loop {
        // Reaping the leader keeps a zombie from holding the group open.
        let leader_alive = handle.is_alive();
        if !leader_alive && !group_exists(pid) {
            debug!(pid, "Process group exited within grace window");
            return false;
        }
        if Instant::now() >= grace_deadline {
            break;
        }
        tokio::time::sleep(poll).await;
    }

    warn!(pid, "Process group ignored SIGTERM; sending SIGKILL");
    let killed = signal_group(pid, Signal::SIGKILL);
    if handle.is_alive() {
        handle.force_kill();
    }

    let confirm_deadline = Instant::now() + Duration::from_millis(KILL_CONFIRM_MS);
    while handle.is_alive() {
        if Instant::now() >= confirm_deadline {
            warn!(pid, "Child still not reaped after SIGKILL");
            break;
        }
        tokio::time::sleep(poll).await;
    }
    killed
}

/// Armed while an `execute` future owns a running child. If that future is
/// dropped mid-flight the child's group still gets SIGTERM, then SIGKILL
/// after the grace window, instead of being leaked.
///
/// The delayed SIGKILL runs on a plain thread so it survives a runtime that
/// is shutting down.
pub(crate) struct EscalationGuard {
    pid: Option<u32>,
    grace: Duration,
    armed: bool,
}

impl EscalationGuard {
    pub(crate) fn new(pid: Option<u32>, grace: Duration) -> Self {
        Self {
            pid,
            grace,
            armed: true,
        }
    }

    /// The child's group is confirmed gone; nothing left to clean up.
    pub(crate) fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for EscalationGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Some(pid) = self.pid else {
            return;
        };

        debug!(pid, "Caller went away; escalating child");
        signal_group(pid, Signal::SIGTERM);
        let grace = self.grace;
        let spawned = std::thread::Builder::new()
            .name("sandshell-reap".to_string())
            .spawn(move || {
                std::thread::sleep(grace);
                if signal_group(pid, Signal::SIGKILL) {
                    debug!(pid, "Sent SIGKILL to abandoned child");
                }
            });
        if let Err(e) = spawned {
            warn!(pid, error = %e, "Could not defer SIGKILL; killing now");
            signal_group(pid, Signal::SIGKILL);
        }
    }
}
