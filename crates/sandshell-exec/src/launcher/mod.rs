//! Process launcher
//!
//! Starts a child wired either to pipes or to a pseudo-terminal and attaches
//! one reader task per descriptor. Readers push chunks onto a bounded
//! channel; a single pump task owns delivery into the [`OutputSink`], which
//! keeps arrival order and makes the sink the only writer of its state.
//!
//! Must be called from within a Tokio runtime.

mod pipes;
mod pty;
mod signal;
mod sink;

pub use sink::OutputSink;
pub(crate) use signal::{group_exists, signal_group};

use crate::constants::{EXIT_CODE_SIGNAL_BASE, READ_CHUNK_SIZE};
use crate::error::{Error, Result};
use crate::output::StreamKind;
use crate::types::TerminalMode;
use nix::sys::signal::Signal;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

type Chunk = (StreamKind, Vec<u8>);
type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Everything needed to start one child process.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Shell binary interpreting the command
    pub shell: String,
    /// Command text passed as `-c`; an empty command starts the bare shell
    pub command: String,
    /// Resolved, existing working directory
    pub cwd: PathBuf,
    /// Pipes or PTY
    pub mode: TerminalMode,
    /// Complete child environment
    pub env: BTreeMap<String, String>,
}

impl LaunchSpec {
    fn shell_args(&self) -> Vec<&str> {
        if self.command.trim().is_empty() {
            Vec::new()
        } else {
            vec!["-c", self.command.as_str()]
        }
    }
}

/// Handle to a launched child and its stream readers.
pub struct ProcessHandle {
    child: Child,
    pid: Option<u32>,
    mode: TerminalMode,
    exit_status: Option<ExitStatus>,
    stdin: Option<BoxedWriter>,
    readers: Vec<JoinHandle<()>>,
    pump: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.pid)
            .field("mode", &self.mode)
            .field("exit_status", &self.exit_status)
            .finish_non_exhaustive()
    }
}

/// Start `spec` and feed its output into `sink`.
///
/// Spawn and descriptor-allocation failures surface as
/// [`Error::LaunchFailed`], never as an exit code.
pub fn launch(spec: &LaunchSpec, sink: Arc<dyn OutputSink>) -> Result<ProcessHandle> {
    let spawned = match spec.mode {
        TerminalMode::Pipes => pipes::spawn(spec)?,
        TerminalMode::Pty => pty::spawn(spec)?,
    };

    let pid = spawned.child.id();
    let (tx, rx) = mpsc::channel::<Chunk>(crate::constants::CHUNK_CHANNEL_CAPACITY);
    let readers = spawned
        .streams
        .into_iter()
        .map(|(stream, reader)| spawn_reader(reader, stream, tx.clone()))
        .collect();
    drop(tx);
    let pump = spawn_pump(rx, sink);

    debug!(pid, mode = ?spec.mode, command = %spec.command, "Launched child process");

    Ok(ProcessHandle {
        child: spawned.child,
        pid,
        mode: spec.mode,
        exit_status: None,
        stdin: spawned.stdin,
        readers,
        pump: Some(pump),
    })
}

struct Spawned {
    child: Child,
    streams: Vec<(StreamKind, BoxedReader)>,
    stdin: Option<BoxedWriter>,
}

fn spawn_reader(
    mut reader: BoxedReader,
    stream: StreamKind,
    tx: mpsc::Sender<Chunk>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = vec![0u8; READ_CHUNK_SIZE];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send((stream, buf[..n].to_vec())).await.is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                // A PTY master reports EIO once every slave fd is closed.
                Err(e) => {
                    debug!(?stream, error = %e, "Stream reader stopped");
                    break;
                }
            }
        }
    })
}

fn spawn_pump(mut rx: mpsc::Receiver<Chunk>, sink: Arc<dyn OutputSink>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some((stream, chunk)) = rx.recv().await {
            sink.accept(&chunk, stream);
        }
    })
}

fn exit_code_of(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|s| EXIT_CODE_SIGNAL_BASE + s))
        .unwrap_or(-1)
}

impl ProcessHandle {
    /// OS process id, if the child was assigned one.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// How the child is wired.
    #[must_use]
    pub fn mode(&self) -> TerminalMode {
        self.mode
    }

    /// Whether the child is still running. Reaps it when it has exited.
    pub fn is_alive(&mut self) -> bool {
        if self.exit_status.is_some() {
            return false;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                debug!(pid = self.pid, code = exit_code_of(status), "Child exited");
                self.exit_status = Some(status);
                false
            }
            Ok(None) => true,
            Err(e) => {
                debug!(pid = self.pid, error = %e, "try_wait failed; treating child as gone");
                false
            }
        }
    }

    /// Exit code once the child is no longer live; `128 + signal` when it
    /// was killed by a signal.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_status.map(exit_code_of)
    }

    /// Send SIGTERM to the child's process group.
    pub fn terminate(&mut self) {
        if let Some(pid) = self.pid {
            signal::signal_group(pid, Signal::SIGTERM);
        }
    }

    /// Send SIGKILL to the child's process group.
    pub fn force_kill(&mut self) {
        let delivered = self
            .pid
            .is_some_and(|pid| signal::signal_group(pid, Signal::SIGKILL));
        if !delivered && self.exit_status.is_none() {
            let _ = self.child.start_kill();
        }
    }

    /// Write straight to the child's input (the PTY master in PTY mode).
    pub async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| Error::LaunchFailed("process input is closed".to_string()))?;
        stdin
            .write_all(bytes)
            .await
            .map_err(|e| Error::launch("failed to write to process", e))?;
        stdin
            .flush()
            .await
            .map_err(|e| Error::launch("failed to flush process input", e))
    }

    /// Whether every reader has finished and all chunks reached the sink.
    #[must_use]
    pub fn output_finished(&self) -> bool {
        self.pump.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Deliver buffered-but-undelivered chunks, then stop the readers and
    /// close the descriptors. Readers still blocked after `timeout` (for
    /// example on a pipe held open by a background grandchild) are aborted.
    pub async fn drain_and_close(&mut self, timeout: Duration) {
        if let Some(pump) = self.pump.take() {
            let abort = pump.abort_handle();
            if tokio::time::timeout(timeout, pump).await.is_err() {
                debug!(pid = self.pid, "Output drain timed out; aborting readers");
                abort.abort();
            }
        }
        self.close_streams();
    }

    /// Stop the readers and close the descriptors without draining.
    pub fn close_streams(&mut self) {
        for reader in self.readers.drain(..) {
            reader.abort();
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.stdin = None;
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        self.close_streams();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputCollector;

    fn spec(command: &str, mode: TerminalMode) -> LaunchSpec {
        LaunchSpec {
            shell: "/bin/sh".to_string(),
            command: command.to_string(),
            cwd: std::env::temp_dir(),
            mode,
            env: crate::env::build_child_env(None, &Default::default()),
        }
    }

    async fn wait_dead(handle: &mut ProcessHandle) {
        for _ in 0..500 {
            if !handle.is_alive() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("child did not exit");
    }

    #[tokio::test]
    async fn test_pipes_separate_streams() {
        let collector = Arc::new(OutputCollector::new(1024));
        let mut handle = launch(
            &spec("echo out; echo err >&2; exit 3", TerminalMode::Pipes),
            collector.clone(),
        )
        .unwrap();
        wait_dead(&mut handle).await;
        handle.drain_and_close(Duration::from_secs(2)).await;

        assert_eq!(handle.exit_code(), Some(3));
        let out = collector.snapshot();
        assert_eq!(out.stdout, b"out\n");
        assert_eq!(out.stderr, b"err\n");
    }

    #[tokio::test]
    async fn test_pty_merges_streams() {
        let collector = Arc::new(OutputCollector::new(1024));
        let mut handle = launch(
            &spec("echo out; echo err >&2", TerminalMode::Pty),
            collector.clone(),
        )
        .unwrap();
        wait_dead(&mut handle).await;
        handle.drain_and_close(Duration::from_secs(2)).await;

        let out = collector.snapshot();
        let text = String::from_utf8_lossy(&out.stdout);
        assert!(text.contains("out"));
        assert!(text.contains("err"));
        assert!(out.stderr.is_empty());
        assert!(handle.output_finished());
    }

    #[tokio::test]
    async fn test_missing_shell_is_launch_failure() {
        let collector = Arc::new(OutputCollector::new(16));
        let mut bad = spec("true", TerminalMode::Pipes);
        bad.shell = "/nonexistent/shell".to_string();
        assert!(matches!(
            launch(&bad, collector),
            Err(Error::LaunchFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_force_kill_reports_signal_exit() {
        let collector = Arc::new(OutputCollector::new(16));
        let mut handle = launch(&spec("sleep 30", TerminalMode::Pipes), collector).unwrap();
        assert!(handle.is_alive());
        handle.force_kill();
        wait_dead(&mut handle).await;
        assert_eq!(handle.exit_code(), Some(128 + 9));
    }

    #[tokio::test]
    async fn test_write_without_stdin_fails() {
        let collector = Arc::new(OutputCollector::new(16));
        let mut handle = launch(&spec("true", TerminalMode::Pipes), collector).unwrap();
        let err = tokio_test::assert_err!(handle.write(b"x").await);
        assert!(matches!(err, Error::LaunchFailed(_)));
    }
}
