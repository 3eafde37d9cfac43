//! Error types for version-control operations
//!
//! Transport problems (no repository, process could not start, timeout) and
//! command failures (the process ran but exited non-zero) are kept apart so
//! callers can decide which ones degrade to an empty result.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while running or interpreting VCS commands
#[derive(Debug, Error)]
pub enum VcsError {
    /// Repository not found or invalid
    #[error("Not a git repository: {path}")]
    NotARepository { path: PathBuf },

    /// Bare repository not supported
    #[error("Bare repositories are not supported. Mergetrain requires a working directory to run git commands in.")]
    BareRepository,

    /// Program outside the allowlist
    #[error("Command not allowed: {program}")]
    CommandNotAllowed { program: String },

    /// The process could not be started
    #[error("Failed to start {program}: {reason}")]
    Spawn { program: String, reason: String },

    /// The process was killed after exceeding its time limit
    #[error("{program} timed out")]
    Timeout { program: String },

    /// The command ran but exited non-zero
    #[error("{command}: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// A ref could not be resolved in the repository
    #[error("Unknown ref '{name}': {reason}")]
    UnknownRef { name: String, reason: String },

    /// `gh` produced output we could not decode
    #[error("Failed to parse gh output: {0}")]
    PrParse(#[from] serde_json::Error),
}

impl VcsError {
    /// Build a command failure, falling back to `fallback` when stderr is blank
    pub(crate) fn command_failed(command: &str, stderr: &str, fallback: String) -> Self {
        let stderr = stderr.trim();
        VcsError::CommandFailed {
            command: command.to_string(),
            stderr: if stderr.is_empty() {
                fallback
            } else {
                stderr.to_string()
            },
        }
    }
}

/// Result type alias using VcsError
pub type Result<T> = std::result::Result<T, VcsError>;
