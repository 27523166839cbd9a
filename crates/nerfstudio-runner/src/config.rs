//! Execution manager configuration

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// Image used when none is configured explicitly
pub const DEFAULT_IMAGE: &str = "ghcr.io/nerfstudio-project/nerfstudio:latest";
/// Mount point of the workspace inside the container
pub const REMOTE_WORKSPACE: &str = "/workspace";
/// Mount point of the staging directory inside the container
pub const REMOTE_STAGING: &str = "/ns_temp_data";
/// Name of the staging directory created under the workspace
pub const STAGING_DIR_NAME: &str = ".ns_temp_data";
/// Port of the tool's web viewer
pub const VIEWER_PORT: u16 = 7007;

/// Configuration for an [`ExecutionManager`](crate::ExecutionManager)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Local directory the tool uses as its working/output root
    pub workspace: PathBuf,
    /// Container image; `None` runs the tool directly on the host
    pub image: Option<String>,
    /// Workspace path as seen inside the container
    pub remote_workspace: String,
    /// Name of the staging directory under the workspace
    pub staging_dir_name: String,
    /// Staging path as seen inside the container
    pub remote_staging: String,
    /// IPC mode for the container (shared-memory heavy data loaders)
    pub ipc_mode: Option<String>,
    /// Explicit /dev/shm size, used alongside or instead of `ipc_mode`
    pub shm_size: Option<String>,
    /// Request every available GPU
    pub gpus: bool,
    /// Ports published 1:1 on the host
    pub ports: Vec<u16>,
    /// Environment variables set in the container
    pub env: BTreeMap<String, String>,
    /// Run the container as the invoking user so outputs stay owned by them
    pub run_as_current_user: bool,
    /// Glob patterns of transient files skipped when staging directories
    pub staging_excludes: Vec<String>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        let env = BTreeMap::from([
            (
                "XDG_DATA_HOME".to_string(),
                format!("{}/.local/share", REMOTE_WORKSPACE),
            ),
            (
                "TORCH_HOME".to_string(),
                format!("{}/.cache/torch", REMOTE_WORKSPACE),
            ),
        ]);

        Self {
            workspace: PathBuf::from("nerfstudio_output"),
            image: Some(DEFAULT_IMAGE.to_string()),
            remote_workspace: REMOTE_WORKSPACE.to_string(),
            staging_dir_name: STAGING_DIR_NAME.to_string(),
            remote_staging: REMOTE_STAGING.to_string(),
            ipc_mode: Some("host".to_string()),
            shm_size: None,
            gpus: true,
            ports: vec![VIEWER_PORT],
            env,
            run_as_current_user: true,
            staging_excludes: vec!["*.tmp".to_string(), "*.swp".to_string(), "*~".to_string()],
        }
    }
}

impl ManagerConfig {
    /// Containerized config for `workspace` using the default image
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            ..Default::default()
        }
    }

    /// Host-local config for `workspace` (no container)
    pub fn host_local(workspace: impl Into<PathBuf>) -> Self {
        Self::new(workspace).without_image()
    }

    /// Run inside `image`
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Run directly on the host
    pub fn without_image(mut self) -> Self {
        self.image = None;
        self
    }

    /// Set the shared memory size
    pub fn with_shm_size(mut self, size: impl Into<String>) -> Self {
        self.shm_size = Some(size.into());
        self
    }

    /// Set the IPC mode
    pub fn with_ipc_mode(mut self, mode: impl Into<String>) -> Self {
        self.ipc_mode = Some(mode.into());
        self
    }

    /// Publish another port
    pub fn with_port(mut self, port: u16) -> Self {
        if !self.ports.contains(&port) {
            self.ports.push(port);
        }
        self
    }

    /// Add a container environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Replace the staging exclude patterns
    pub fn with_staging_excludes<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.staging_excludes = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Parse a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.yaml`/`.yml` or `.json` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        let config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&contents)?,
            Some("json") => serde_json::from_str(&contents)?,
            _ => {
                return Err(Error::Config(format!(
                    "unsupported config file extension: {}",
                    path.display()
                )));
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.workspace.as_os_str().is_empty() {
            return Err(Error::Config("workspace must not be empty".to_string()));
        }

        let mut components = Path::new(&self.staging_dir_name).components();
        if !matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) {
            return Err(Error::Config(format!(
                "staging_dir_name must be a plain directory name, got {:?}",
                self.staging_dir_name
            )));
        }

        if self.image.is_some() {
            for remote in [&self.remote_workspace, &self.remote_staging] {
                if !remote.starts_with('/') {
                    return Err(Error::Config(format!(
                        "container paths must be absolute, got {:?}",
                        remote
                    )));
                }
            }
        }

        self.exclude_patterns().map(|_| ())
    }

    /// Compiled staging exclude patterns
    pub fn exclude_patterns(&self) -> Result<Vec<glob::Pattern>> {
        self.staging_excludes
            .iter()
            .map(|p| {
                glob::Pattern::new(p)
                    .map_err(|e| Error::Config(format!("bad staging exclude {:?}: {}", p, e)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ManagerConfig::default();

        assert_eq!(config.image.as_deref(), Some(DEFAULT_IMAGE));
        assert_eq!(config.remote_workspace, "/workspace");
        assert_eq!(config.remote_staging, "/ns_temp_data");
        assert_eq!(config.ipc_mode.as_deref(), Some("host"));
        assert_eq!(config.ports, vec![7007]);
        assert_eq!(
            config.env.get("TORCH_HOME").map(String::as_str),
            Some("/workspace/.cache/torch")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_host_local() {
        let config = ManagerConfig::host_local("/tmp/out");
        assert_eq!(config.workspace, PathBuf::from("/tmp/out"));
        assert!(config.image.is_none());
    }

    #[test]
    fn test_builder_pattern() {
        let config = ManagerConfig::new("/tmp/out")
            .with_image("ghcr.io/nerfstudio-project/nerfstudio:1.1.3")
            .with_shm_size("12gb")
            .with_port(8080)
            .with_port(8080)
            .with_env("FOO", "bar");

        assert_eq!(config.shm_size.as_deref(), Some("12gb"));
        assert_eq!(config.ports, vec![7007, 8080]);
        assert_eq!(config.env.get("FOO").map(String::as_str), Some("bar"));
    }

    #[test]
    fn test_from_yaml_str_uses_defaults() {
        let config = ManagerConfig::from_yaml_str(
            "workspace: /tmp/out\nimage: null\nstaging_excludes: ['*.part']\n",
        )
        .unwrap();

        assert_eq!(config.workspace, PathBuf::from("/tmp/out"));
        assert!(config.image.is_none());
        assert_eq!(config.staging_excludes, vec!["*.part"]);
        assert_eq!(config.remote_staging, REMOTE_STAGING);
    }

    #[test]
    fn test_rejects_nested_staging_dir() {
        let mut config = ManagerConfig::host_local("/tmp/out");
        config.staging_dir_name = "a/b".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_relative_remote_paths() {
        let mut config = ManagerConfig::new("/tmp/out");
        config.remote_workspace = "workspace".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_glob() {
        let config = ManagerConfig::host_local("/tmp/out").with_staging_excludes(["[unclosed"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("runner.json");
        std::fs::write(&path, r#"{"workspace": "/tmp/out", "gpus": false}"#).unwrap();

        let config = ManagerConfig::from_file(&path).unwrap();
        assert!(!config.gpus);
        assert_eq!(config.image.as_deref(), Some(DEFAULT_IMAGE));
    }

    #[test]
    fn test_from_file_unknown_extension() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("runner.toml");
        std::fs::write(&path, "workspace = '/tmp'").unwrap();

        assert!(matches!(ManagerConfig::from_file(&path), Err(Error::Config(_))));
    }
}
