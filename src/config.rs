//! Application configuration

use sandshell_exec::ExecConfig;
use serde::Deserialize;

/// Top-level configuration, one table per subsystem.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Execution engine and session settings
    #[serde(default)]
    pub exec: ExecConfig,
}
