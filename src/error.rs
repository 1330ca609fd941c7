//! Error handling for the task runner
//!
//! Every task returns [`TaskError`]. External tools report failure through
//! their exit status only, so the command line is carried along for context.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for arbalest tasks
#[derive(Error, Debug)]
pub enum TaskError {
    /// IO errors (file operations, manifest reads, directory walks)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors (loading, parsing, validation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The external tool could not be started at all
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The external tool ran and exited non-zero (or was killed by a signal)
    #[error("`{command}` failed with exit code {}", display_code(.code))]
    CommandFailed { command: String, code: Option<i32> },

    /// Uninstall was requested but no install manifest was recorded
    #[error("Install manifest not found: {}", .0.display())]
    ManifestMissing(PathBuf),

    /// One or more manifest entries could not be removed
    #[error("Uninstall left {failed} path(s) in place")]
    Uninstall { failed: usize },

    /// Interpreter platform detection errors
    #[error("Platform detection error: {0}")]
    Platform(String),
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "none (signal)".to_string(),
    }
}

/// Result type alias for task operations
pub type Result<T> = std::result::Result<T, TaskError>;

impl TaskError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a platform detection error
    pub fn platform(msg: impl Into<String>) -> Self {
        Self::Platform(msg.into())
    }

    /// Create a command failure for a finished process
    pub fn command_failed(command: impl Into<String>, code: Option<i32>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            code,
        }
    }

    /// Exit code the binary should report for this error.
    ///
    /// Failed tools pass their own code through so wrapping shells see it.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::CommandFailed { code: Some(c), .. } if *c != 0 => *c,
            _ => 1,
        }
    }
}
