//! Engine-wide defaults

// ── Time/Size Constants ────────────────────────────────────────────────────

pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const MAX_TIMEOUT_SECS: u64 = 1800;
pub const MAX_SESSIONS: usize = 4;
pub const MAX_OUTPUT_BYTES: usize = 100 * 1024; // 100 KB
pub const SESSION_IDLE_TIMEOUT_SECS: u64 = 1800; // 30 minutes
pub const SESSION_REAPER_INTERVAL_SECS: u64 = 60;

/// Time a process gets to exit after SIGTERM before SIGKILL.
pub const KILL_GRACE_MS: u64 = 200;
/// Liveness / new-output polling interval.
pub const POLL_INTERVAL_MS: u64 = 10;
/// Upper bound on flushing readers once the child is gone.
pub const DRAIN_TIMEOUT_MS: u64 = 500;
/// How long a dead session's reader may lag before a read reports EOF.
pub const OUTPUT_SETTLE_MS: u64 = 100;

/// Conventional exit code for a command killed by its deadline.
pub const EXEC_TIMEOUT_EXIT_CODE: i32 = 124;
/// Shell convention: a child killed by signal `s` reports `128 + s`.
pub const EXIT_CODE_SIGNAL_BASE: i32 = 128;
pub const TIMEOUT_MESSAGE: &str = "command timed out";

// ── I/O ────────────────────────────────────────────────────────────────────

pub const READ_CHUNK_SIZE: usize = 8192;
/// Bound on chunks in flight between stream readers and the collector.
pub const CHUNK_CHANNEL_CAPACITY: usize = 64;
pub const PTY_ROWS: u16 = 24;
pub const PTY_COLS: u16 = 80;
pub const PTY_TERM: &str = "xterm-256color";

// ── Environment ────────────────────────────────────────────────────────────

pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Variables every child receives from the parent when set.
pub const BASELINE_ENV: &[&str] = &["PATH", "HOME"];

/// Upper bound on waiting for a SIGKILLed child to be reaped.
pub const KILL_CONFIRM_MS: u64 = 5_000;
