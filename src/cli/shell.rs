//! `sandshell shell`
//!
//! Relays local stdin lines into a session and prints whatever it writes
//! back, until the session reaches end of stream.

use anyhow::Result;
use clap::Args;
use sandshell_exec::{ExecConfig, SessionId, SessionManager, SessionOpenRequest};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

/// How long one read waits for output before checking for interrupts.
const READ_WAIT: Duration = Duration::from_millis(200);
const READ_CHUNK: usize = 4096;
/// Sent when local stdin closes; a shell on a terminal exits on it.
const END_OF_TRANSMISSION: &[u8] = b"\x04";

#[derive(Args, Debug)]
pub struct ShellArgs {
    /// Command to run; the configured shell itself when omitted
    pub command: Option<String>,

    /// Working directory, relative to the workspace root
    #[arg(long)]
    pub cwd: Option<String>,

    /// Idle window in seconds before the session is evicted
    #[arg(long)]
    pub idle_timeout_secs: Option<u64>,
}

pub async fn run(args: ShellArgs, config: ExecConfig) -> Result<i32> {
    let reaper_interval = config.session_reaper_interval();
    let manager = Arc::new(SessionManager::new(config));
    let reaper = manager.spawn_reaper(reaper_interval);

    let mut request = SessionOpenRequest::new(args.command.unwrap_or_default());
    if let Some(cwd) = args.cwd {
        request = request.with_cwd(cwd);
    }
    if let Some(secs) = args.idle_timeout_secs {
        request = request.with_idle_timeout(Duration::from_secs(secs));
    }

    let id = manager.open_session(request).await?;
    info!(session_id = %id, "Session ready");

    let forwarder = tokio::spawn(forward_stdin(manager.clone(), id.clone()));
    let relayed = relay_output(&manager, &id).await;

    let exit_code = manager
        .list_sessions()
        .await
        .into_iter()
        .find(|s| s.id == id)
        .and_then(|s| s.exit_code)
        .unwrap_or(0);

    forwarder.abort();
    manager.close_all().await;
    reaper.abort();

    relayed?;
    Ok(exit_code)
}

async fn forward_stdin(manager: Arc<SessionManager>, id: SessionId) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let input = format!("{line}\n");
                if let Err(e) = manager.write_to_session(id.as_str(), input.as_bytes()).await {
                    warn!(error = %e, "Session stopped accepting input");
                    return;
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Failed to read stdin");
                break;
            }
        }
    }
    let _ = manager
        .write_to_session(id.as_str(), END_OF_TRANSMISSION)
        .await;
}

async fn relay_output(manager: &SessionManager, id: &SessionId) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    loop {
        let chunk = tokio::select! {
            chunk = manager.read_from_session(id.as_str(), READ_CHUNK, Some(READ_WAIT)) => chunk?,
            _ = tokio::signal::ctrl_c() => {
                info!(session_id = %id, "Interrupted; closing session");
                return Ok(());
            }
        };

        if !chunk.stdout.is_empty() {
            stdout.write_all(chunk.stdout.as_bytes()).await?;
            stdout.flush().await?;
        }
        if chunk.truncated {
            warn!(session_id = %id, "Session output was truncated");
        }
        if chunk.eof {
            return Ok(());
        }
    }
}
