//! Interactive PTY sessions
//!
//! A session is a long-lived shell on a pseudo-terminal whose output is
//! buffered until drained by reads. Sessions idle past their window are
//! evicted before every registry operation and by the optional reaper.

mod managed;
mod manager;

#[cfg(test)]
mod tests;

pub use manager::SessionManager;

use crate::types::SessionSnapshot;

/// Order snapshots newest first, breaking ties by id.
pub fn sort_snapshots(snapshots: &mut [SessionSnapshot]) {
    snapshots.sort_by(|a, b| {
        b.started_at
            .cmp(&a.started_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}
