//! Pipe-backed children: independent stdout and stderr streams

use super::{BoxedReader, LaunchSpec, Spawned};
use crate::error::{Error, Result};
use crate::output::StreamKind;
use std::process::Stdio;
use tokio::process::Command;

pub(super) fn spawn(spec: &LaunchSpec) -> Result<Spawned> {
    let mut cmd = Command::new(&spec.shell);
    cmd.args(spec.shell_args())
        .current_dir(&spec.cwd)
        .env_clear()
        .envs(&spec.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0);

    let mut child = cmd
        .spawn()
        .map_err(|e| Error::launch(&format!("failed to spawn {}", spec.shell), e))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::LaunchFailed("stdout pipe unavailable".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::LaunchFailed("stderr pipe unavailable".to_string()))?;

    Ok(Spawned {
        child,
        streams: vec![
            (StreamKind::Stdout, Box::new(stdout) as BoxedReader),
            (StreamKind::Stderr, Box::new(stderr) as BoxedReader),
        ],
        stdin: None,
    })
}
