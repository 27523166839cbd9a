//! Error types for command execution

use thiserror::Error;

/// Unified error type for command execution
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to spawn a process
    #[error("failed to spawn process: {reason}")]
    SpawnFailed {
        /// The reason for the spawn failure
        reason: String,
    },

    /// Command not found
    #[error("command not found: {command}")]
    CommandNotFound {
        /// The command that was not found
        command: String,
    },

    /// Image is not present locally or in the registry
    #[error("image not found: {image}")]
    ImageNotFound {
        /// The image reference that could not be resolved
        image: String,
    },

    /// Container operation failed
    #[error("container operation failed: {reason}")]
    DockerOperationFailed {
        /// The detailed reason for the Docker operation failure
        reason: String,
    },

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a spawn failed error
    pub fn spawn_failed(reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            reason: reason.into(),
        }
    }

    /// Create a docker operation error
    pub fn docker(reason: impl Into<String>) -> Self {
        Self::DockerOperationFailed {
            reason: reason.into(),
        }
    }

    /// Map a spawn-time `io::Error` for `program`, keeping "not found" distinct
    pub fn from_spawn(program: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::CommandNotFound {
                command: program.to_string(),
            }
        } else {
            Self::spawn_failed(format!("Failed to spawn {}: {}", program, err))
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
