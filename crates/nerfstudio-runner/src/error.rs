//! Error types for the runner

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building or running tool commands
#[derive(Error, Debug)]
pub enum Error {
    /// No execution environment is active
    #[error("execution environment is not initialized; call initialize() first")]
    NotInitialized,

    /// The container image could not be pulled
    #[error("failed to pull image {image}: {source}")]
    ImagePull {
        /// Image reference
        image: String,
        /// Underlying runtime failure
        #[source]
        source: command_executor::Error,
    },

    /// The execution environment could not be brought up
    #[error("failed to start execution environment: {reason}")]
    EnvironmentStart {
        /// Why startup failed
        reason: String,
    },

    /// Copying an input into the staging area failed
    #[error("failed to stage {}: {source}", path.display())]
    Staging {
        /// The local path being staged
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Process layer failure while running a command
    #[error(transparent)]
    Executor(#[from] command_executor::Error),

    /// Invalid or unreadable configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Reconstruction model selection failed
    #[error("model selection failed: {0}")]
    ModelSelection(String),

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an environment start error
    pub fn environment_start(reason: impl Into<String>) -> Self {
        Self::EnvironmentStart {
            reason: reason.into(),
        }
    }

    /// Whether this error must abort the process (startup failures)
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::ImagePull { .. } | Error::EnvironmentStart { .. })
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
