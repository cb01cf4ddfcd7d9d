//! `sandshell exec`

use anyhow::{Context, Result};
use clap::Args;
use sandshell_exec::{ExecConfig, ExecutionEngine, ExecutionRequest, TerminalMode};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Command text, interpreted by the configured shell
    pub command: String,

    /// Working directory, relative to the workspace root
    #[arg(long)]
    pub cwd: Option<String>,

    /// Deadline in seconds (clamped to the configured maximum)
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Run on a pseudo-terminal instead of pipes
    #[arg(long)]
    pub pty: bool,

    /// Print the whole result as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: ExecArgs, config: ExecConfig) -> Result<i32> {
    let engine = ExecutionEngine::new(config);

    let mut request = ExecutionRequest::new(args.command);
    if let Some(cwd) = args.cwd {
        request = request.with_cwd(cwd);
    }
    if let Some(secs) = args.timeout_secs {
        request = request.with_timeout(Duration::from_secs(secs));
    }
    if args.pty {
        request = request.with_terminal_mode(TerminalMode::Pty);
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted; stopping command");
            on_interrupt.cancel();
        }
    });

    let result = engine.execute_with_cancel(request, cancel).await;
    interrupt.abort();
    let result = result?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to encode result")?
        );
        return Ok(result.exit_code);
    }

    let mut stdout = tokio::io::stdout();
    stdout.write_all(result.stdout.as_bytes()).await?;
    stdout.flush().await?;
    let mut stderr = tokio::io::stderr();
    stderr.write_all(result.stderr.as_bytes()).await?;
    stderr.flush().await?;

    if result.truncated {
        warn!("Output was truncated at the configured limit");
    }
    Ok(result.exit_code)
}
