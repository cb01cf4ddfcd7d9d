//! PTY-backed children: one merged stream through a pseudo-terminal

use super::{BoxedReader, BoxedWriter, LaunchSpec, Spawned};
use crate::constants::{PTY_COLS, PTY_ROWS, PTY_TERM};
use crate::error::{Error, Result};
use crate::output::StreamKind;

pub(super) fn spawn(spec: &LaunchSpec) -> Result<Spawned> {
    // Allocate PTY pair
    let (pty, pts) = pty_process::open().map_err(|e| Error::launch("failed to open PTY", e))?;
    pty.resize(pty_process::Size::new(PTY_ROWS, PTY_COLS))
        .map_err(|e| Error::launch("failed to size PTY", e))?;

    // Builder pattern: each method consumes self
    let mut pty_cmd = pty_process::Command::new(&spec.shell)
        .args(spec.shell_args())
        .env_clear();
    for (key, value) in &spec.env {
        pty_cmd = pty_cmd.env(key, value);
    }
    pty_cmd = pty_cmd.env("TERM", PTY_TERM).current_dir(&spec.cwd);

    // `pts` moves into spawn and is dropped on return, closing the parent's
    // copy of the slave so the master sees EOF once the child exits.
    let child = pty_cmd
        .spawn(pts)
        .map_err(|e| Error::launch(&format!("failed to spawn {} on PTY", spec.shell), e))?;

    let (reader, writer) = pty.into_split();

    Ok(Spawned {
        child,
        streams: vec![(StreamKind::Stdout, Box::new(reader) as BoxedReader)],
        stdin: Some(Box::new(writer) as BoxedWriter),
    })
}
