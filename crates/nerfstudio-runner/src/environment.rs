//! The active execution environment and its path mapping

use std::path::{Path, PathBuf};

/// Where commands run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Inside a long-lived container
    Containerized,
    /// As direct child processes on the host
    HostLocal,
}

/// Paths and handle of an initialized environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionEnvironment {
    /// Container or host execution
    pub mode: ExecutionMode,
    /// Absolute local workspace directory
    pub workspace_host_path: PathBuf,
    /// Workspace path as the tool sees it
    pub workspace_remote_path: String,
    /// Local staging directory (created at startup)
    pub staging_host_path: PathBuf,
    /// Staging path as the tool sees it
    pub staging_remote_path: String,
    /// Running container id, `None` in host-local mode
    pub handle: Option<String>,
}

impl ExecutionEnvironment {
    /// Host-local environment: remote paths equal host paths
    pub(crate) fn host_local(workspace: PathBuf, staging: PathBuf) -> Self {
        Self {
            mode: ExecutionMode::HostLocal,
            workspace_remote_path: workspace.to_string_lossy().into_owned(),
            staging_remote_path: staging.to_string_lossy().into_owned(),
            workspace_host_path: workspace,
            staging_host_path: staging,
            handle: None,
        }
    }

    /// Short container id for log lines
    pub fn short_id(&self) -> Option<&str> {
        self.handle.as_deref().map(|id| id.get(..12).unwrap_or(id))
    }

    /// Whether `path` (absolute, normalized) lies inside the workspace
    pub fn in_workspace(&self, path: &Path) -> bool {
        path.starts_with(&self.workspace_host_path)
    }
}
