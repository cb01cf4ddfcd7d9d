//! Error types for sandshell-exec

use std::path::PathBuf;
use thiserror::Error;

/// Engine error type
///
/// Process-level outcomes (non-zero exit, death by signal, timeout) are not
/// errors; they are encoded in [`crate::ExecutionResult`].
#[derive(Debug, Error)]
pub enum Error {
    /// Working directory is missing, not a directory, or escapes the workspace
    #[error("invalid working directory: {}", .0.display())]
    InvalidWorkingDirectory(PathBuf),

    /// Process could not be started, or a low-level descriptor operation failed
    #[error("launch failed: {0}")]
    LaunchFailed(String),

    /// Session id is unknown, closed or evicted
    #[error("session not found: {0}")]
    SessionNotFound(String),
}

impl Error {
    pub(crate) fn launch(context: &str, err: impl std::fmt::Display) -> Self {
        Self::LaunchFailed(format!("{context}: {err}"))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
