//! Process management traits and types

use crate::error::Result;
use async_trait::async_trait;

/// A handle to control a running process
#[async_trait]
pub trait ProcessHandle: Send + Sync {
    /// Wait for the process to complete and return its exit status
    async fn wait(&mut self) -> Result<ExitStatus>;
}

/// Process exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    /// Exit code if the process exited normally
    pub code: Option<i32>,
    /// Signal that terminated the process (Unix only)
    #[cfg(unix)]
    pub signal: Option<i32>,
}

impl ExitStatus {
    /// Returns true if the process exited successfully (code 0)
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Returns true if the process was terminated by a signal
    pub fn terminated_by_signal(&self) -> bool {
        #[cfg(unix)]
        {
            self.signal.is_some()
        }
        #[cfg(not(unix))]
        {
            false
        }
    }

    /// Shell-style exit code: the real code, or `128 + signal` when killed.
    pub fn exit_code(&self) -> i32 {
        if let Some(code) = self.code {
            return code;
        }
        #[cfg(unix)]
        {
            if let Some(signal) = self.signal {
                return 128 + signal;
            }
        }
        -1
    }
}

/// Exit status together with the captured output of a finished process
#[derive(Debug, Clone)]
pub struct ExitResult {
    /// How the process ended
    pub status: ExitStatus,
    /// Combined stdout/stderr as captured by the [`OutputTee`](crate::OutputTee)
    pub output: String,
}

impl ExitResult {
    /// Returns true if the process exited successfully (code 0)
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Numeric exit code, see [`ExitStatus::exit_code`]
    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }
}
