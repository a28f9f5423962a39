//! CLI error type.

use std::fmt;

use imeboot::BootError;

/// Errors reported by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Configuration could not be loaded or is invalid.
    Config(String),
    /// The async runtime could not be created.
    Runtime(String),
    /// Bootstrap ran but a pass was aborted.
    Boot(String),
    /// The locale-data probe rejected the file.
    Probe(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Runtime(msg) => write!(f, "Failed to start runtime: {}", msg),
            CliError::Boot(msg) => write!(f, "Bootstrap incomplete: {}", msg),
            CliError::Probe(msg) => write!(f, "Probe failed: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl From<BootError> for CliError {
    fn from(e: BootError) -> Self {
        match e {
            BootError::Config(msg) => CliError::Config(msg),
            other => CliError::Boot(other.to_string()),
        }
    }
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 2,
            CliError::Runtime(_) | CliError::Boot(_) => 1,
            CliError::Probe(_) => 3,
        }
    }
}
