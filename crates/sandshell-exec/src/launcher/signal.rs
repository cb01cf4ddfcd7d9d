//! Process-group signalling
//!
//! Children lead their own process group (pipes: `process_group(0)`,
//! PTY: `setsid`), so signalling the group reaches everything the shell
//! started.

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tracing::{debug, warn};

/// Send `signal` to the process group led by `pid`.
///
/// Returns `false` when the group no longer exists.
pub(crate) fn signal_group(pid: u32, signal: Signal) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match killpg(Pid::from_raw(raw), signal) {
        Ok(()) => {
            debug!(pid, ?signal, "Signalled process group");
            true
        }
        Err(Errno::ESRCH) => false,
        Err(e) => {
            warn!(pid, ?signal, error = %e, "Failed to signal process group");
            false
        }
    }
}

/// Whether any process of the group led by `pid` still exists.
pub(crate) fn group_exists(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    !matches!(killpg(Pid::from_raw(raw), None), Err(Errno::ESRCH))
}
