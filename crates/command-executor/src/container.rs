//! Container runtime abstraction
//!
//! A [`ContainerRuntime`] brings up one long-lived container from a
//! [`ContainerSpec`] and wraps host-side [`Command`]s so they execute inside it.
//! The built-in implementation is [`DockerCli`](crate::DockerCli).

use crate::command::Command;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Operations a container engine must provide
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Whether `image` is present locally
    async fn image_exists(&self, image: &str) -> Result<bool>;

    /// Pull `image` from its registry
    async fn pull_image(&self, image: &str) -> Result<()>;

    /// Start a detached container and return its id
    async fn run_container(&self, spec: &ContainerSpec) -> Result<String>;

    /// Build the host command that runs `shell_line` inside the container
    fn exec_command(&self, container_id: &str, working_dir: &str, shell_line: &str) -> Command;

    /// Stop a running container
    async fn stop_container(&self, container_id: &str) -> Result<StopOutcome>;
}

/// Result of a stop request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The container was running and has been stopped
    Stopped,
    /// The container was already stopped or removed
    AlreadyGone,
}

/// A bind mount from the host into the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeBind {
    /// Host directory
    pub host: PathBuf,
    /// Mount point inside the container
    pub remote: String,
    /// Mount read-only instead of read-write
    pub read_only: bool,
}

impl VolumeBind {
    /// Read-write bind of `host` at `remote`
    pub fn read_write(host: impl Into<PathBuf>, remote: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            remote: remote.into(),
            read_only: false,
        }
    }

    /// `host:remote:mode` form understood by `docker run -v`
    pub fn to_arg(&self) -> String {
        let mode = if self.read_only { "ro" } else { "rw" };
        format!("{}:{}:{}", self.host.display(), self.remote, mode)
    }
}

/// Docker container configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Docker image to run
    image: String,
    /// Optional container name
    name: Option<String>,
    /// Environment variables
    env: BTreeMap<String, String>,
    /// Volume mounts
    volumes: Vec<VolumeBind>,
    /// Working directory in container
    working_dir: Option<String>,
    /// Remove container once it stops
    remove_on_exit: bool,
    /// GPU request passed to `--gpus`
    gpus: Option<String>,
    /// IPC namespace mode
    ipc_mode: Option<String>,
    /// Size of /dev/shm
    shm_size: Option<String>,
    /// Published ports (host, container)
    ports: Vec<(u16, u16)>,
    /// User to run as
    user: Option<String>,
    /// Command run as the container's main process
    command: Vec<String>,
}

impl ContainerSpec {
    /// Create a new Docker container configuration
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            name: None,
            env: BTreeMap::new(),
            volumes: Vec::new(),
            working_dir: None,
            remove_on_exit: true,
            gpus: None,
            ipc_mode: None,
            shm_size: None,
            ports: Vec::new(),
            user: None,
            command: Vec::new(),
        }
    }

    /// Set container name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Add volume mount
    pub fn with_volume(mut self, bind: VolumeBind) -> Self {
        self.volumes.push(bind);
        self
    }

    /// Set working directory
    pub fn with_working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set whether to remove container on exit
    pub fn with_remove_on_exit(mut self, remove: bool) -> Self {
        self.remove_on_exit = remove;
        self
    }

    /// Request GPUs (`"all"` for every device)
    pub fn with_gpus(mut self, gpus: impl Into<String>) -> Self {
        self.gpus = Some(gpus.into());
        self
    }

    /// Set the IPC mode (e.g. `host`)
    pub fn with_ipc_mode(mut self, mode: impl Into<String>) -> Self {
        self.ipc_mode = Some(mode.into());
        self
    }

    /// Set the shared memory size (e.g. `12gb`)
    pub fn with_shm_size(mut self, size: impl Into<String>) -> Self {
        self.shm_size = Some(size.into());
        self
    }

    /// Publish a container port on the host
    pub fn with_port(mut self, host: u16, container: u16) -> Self {
        self.ports.push((host, container));
        self
    }

    /// Run as the given user (`uid` or `uid:gid`)
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the container's main command
    pub fn with_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    /// Get the image
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Get the container name
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Get the environment variables
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Get the volume mounts
    pub fn volumes(&self) -> &[VolumeBind] {
        &self.volumes
    }

    /// Arguments for `docker run`, starting with `run -d`
    pub fn run_args(&self) -> Vec<String> {
        let mut args = vec!["run".to_string(), "-d".to_string()];

        if self.remove_on_exit {
            args.push("--rm".to_string());
        }
        if let Some(name) = &self.name {
            args.extend(["--name".to_string(), name.clone()]);
        }
        if let Some(gpus) = &self.gpus {
            args.extend(["--gpus".to_string(), gpus.clone()]);
        }
        if let Some(mode) = &self.ipc_mode {
            args.extend(["--ipc".to_string(), mode.clone()]);
        }
        if let Some(size) = &self.shm_size {
            args.extend(["--shm-size".to_string(), size.clone()]);
        }
        if let Some(user) = &self.user {
            args.extend(["--user".to_string(), user.clone()]);
        }
        for (host, container) in &self.ports {
            args.extend(["-p".to_string(), format!("{}:{}", host, container)]);
        }
        for (key, value) in &self.env {
            args.extend(["-e".to_string(), format!("{}={}", key, value)]);
        }
        for bind in &self.volumes {
            args.extend(["-v".to_string(), bind.to_arg()]);
        }
        if let Some(dir) = &self.working_dir {
            args.extend(["-w".to_string(), dir.clone()]);
        }

        args.push(self.image.clone());
        args.extend(self.command.iter().cloned());
        args
    }
}
