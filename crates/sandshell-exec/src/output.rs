//! Byte-capped output accumulators
//!
//! Both accumulators clip the chunk that crosses the cap so that exactly
//! `budget` bytes are kept, never "one chunk over". They take `&self` and
//! guard their state with a mutex, so stream readers and the coordinator
//! can share them behind an `Arc`.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Which child stream a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// Standard output (or the merged PTY stream)
    Stdout,
    /// Standard error
    Stderr,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── One-shot collector ─────────────────────────────────────────────────────

/// Captured output of one `execute` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedOutput {
    /// Captured stdout bytes
    pub stdout: Vec<u8>,
    /// Captured stderr bytes
    pub stderr: Vec<u8>,
    /// Set once any byte was dropped; never cleared
    pub truncated: bool,
}

#[derive(Debug, Default)]
struct CollectorState {
    output: CollectedOutput,
    accepted: usize,
}

/// Accumulates stdout/stderr for one invocation under a shared byte budget.
#[derive(Debug)]
pub struct OutputCollector {
    budget: usize,
    state: Mutex<CollectorState>,
}

impl OutputCollector {
    /// Create a collector that keeps at most `budget` bytes in total.
    #[must_use]
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            state: Mutex::new(CollectorState::default()),
        }
    }

    /// Append a chunk in arrival order. Returns the number of bytes kept.
    pub fn append(&self, chunk: &[u8], stream: StreamKind) -> usize {
        if chunk.is_empty() {
            return 0;
        }
        let mut state = lock(&self.state);
        let room = self.budget.saturating_sub(state.accepted);
        let keep = chunk.len().min(room);
        if keep < chunk.len() {
            state.output.truncated = true;
        }
        if keep > 0 {
            let target = match stream {
                StreamKind::Stdout => &mut state.output.stdout,
                StreamKind::Stderr => &mut state.output.stderr,
            };
            target.extend_from_slice(&chunk[..keep]);
            state.accepted += keep;
        }
        keep
    }

    /// Copy of everything collected so far.
    #[must_use]
    pub fn snapshot(&self) -> CollectedOutput {
        lock(&self.state).output.clone()
    }

    /// Whether any byte has been dropped.
    #[must_use]
    pub fn truncated(&self) -> bool {
        lock(&self.state).output.truncated
    }

    /// Bytes kept so far across both streams.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.state).accepted
    }

    /// Whether nothing has been kept yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Session buffer ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct BufferState {
    pending: VecDeque<u8>,
    truncated: bool,
}

/// Pending output of one interactive session.
///
/// The budget bounds the undrained backlog. The truncation flag reports
/// drops since the previous drain and is cleared by every drain.
#[derive(Debug)]
pub struct SessionOutputBuffer {
    budget: usize,
    state: Mutex<BufferState>,
}

impl SessionOutputBuffer {
    /// Create a buffer holding at most `budget` undrained bytes.
    #[must_use]
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            state: Mutex::new(BufferState::default()),
        }
    }

    /// Append bytes from the stream reader. Returns the number kept.
    pub fn append(&self, bytes: &[u8]) -> usize {
        if bytes.is_empty() {
            return 0;
        }
        let mut state = lock(&self.state);
        let room = self.budget.saturating_sub(state.pending.len());
        let keep = bytes.len().min(room);
        if keep < bytes.len() {
            state.truncated = true;
        }
        state.pending.extend(&bytes[..keep]);
        keep
    }

    /// Take up to `max_bytes` from the front of the backlog, plus whether
    /// anything was dropped since the last drain.
    pub fn drain(&self, max_bytes: usize) -> (Vec<u8>, bool) {
        let mut state = lock(&self.state);
        let take = state.pending.len().min(max_bytes);
        let bytes: Vec<u8> = state.pending.drain(..take).collect();
        let truncated = std::mem::take(&mut state.truncated);
        (bytes, truncated)
    }

    /// Undrained byte count.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.state).pending.len()
    }

    /// Whether the backlog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
