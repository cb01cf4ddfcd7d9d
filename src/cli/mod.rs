//! CLI module for Sandshell
//!
//! Provides commands:
//! - `exec`: run one command to completion under the engine's limits
//! - `shell`: open an interactive session and relay the terminal

use clap::{Parser, Subcommand};

pub mod exec;
pub mod shell;

/// Sandshell CLI
#[derive(Parser, Debug)]
#[command(name = "sandshell")]
#[command(about = "Confined shell execution and interactive sessions")]
#[command(version)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a command and report its output and exit code
    Exec(exec::ExecArgs),
    /// Open an interactive shell session
    Shell(shell::ShellArgs),
}

/// Run the CLI command, returning the process exit code
pub async fn run(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Some(Commands::Exec(args)) => {
            let config = crate::loader::load_config()?;
            exec::run(args, config.exec).await
        }
        Some(Commands::Shell(args)) => {
            let config = crate::loader::load_config()?;
            shell::run(args, config.exec).await
        }
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_exec() {
        let cli = Cli::try_parse_from([
            "sandshell",
            "exec",
            "echo hi",
            "--cwd",
            "work",
            "--timeout-secs",
            "5",
            "--pty",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Exec(args)) => {
                assert_eq!(args.command, "echo hi");
                assert_eq!(args.cwd.as_deref(), Some("work"));
                assert_eq!(args.timeout_secs, Some(5));
                assert!(args.pty);
                assert!(!args.json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_parses_shell_without_command() {
        let cli = Cli::try_parse_from(["sandshell", "--log-json", "shell"]).unwrap();
        assert!(cli.log_json);
        match cli.command {
            Some(Commands::Shell(args)) => {
                assert!(args.command.is_none());
                assert!(args.idle_timeout_secs.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
