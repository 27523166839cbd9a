//! Docker support via CLI wrapper

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, info};

use crate::backends::local::LocalLauncher;
use crate::command::Command;
use crate::container::{ContainerRuntime, ContainerSpec, StopOutcome};
use crate::error::{Error, Result};
use crate::event::ProcessEventType;
use crate::launcher::Launcher;
use crate::process::ProcessHandle;

/// Drives a docker-compatible CLI (`docker`, `podman`) through [`LocalLauncher`]
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
    launcher: LocalLauncher,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerCli {
    /// Use the `docker` binary from `PATH`
    pub fn new() -> Self {
        Self::with_binary("docker")
    }

    /// Use another docker-compatible binary
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            launcher: LocalLauncher,
        }
    }

    /// The CLI binary in use
    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn cli<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        Command::builder(&self.binary).args(args).build()
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn image_exists(&self, image: &str) -> Result<bool> {
        let cmd = self.cli(["images", "-q", image]);
        let (mut events, mut handle) = self.launcher.launch(cmd).await?;

        let mut has_output = false;
        while let Some(event) = events.next().await {
            if event.event_type == ProcessEventType::Stdout {
                if let Some(data) = &event.data {
                    if !data.trim().is_empty() {
                        has_output = true;
                    }
                }
            }
        }

        let status = handle.wait().await?;
        Ok(status.success() && has_output)
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        let cmd = self.cli(["pull", image]);
        let (mut events, mut handle) = self.launcher.launch(cmd).await?;

        let mut output = String::new();
        while let Some(event) = events.next().await {
            if let Some(line) = event.output_line() {
                info!("[{} pull] {}", self.binary, line);
                output.push_str(line);
                output.push('\n');
            }
        }

        let status = handle.wait().await?;
        if status.success() {
            return Ok(());
        }
        if output.contains("not found") || output.contains("manifest unknown") {
            return Err(Error::ImageNotFound {
                image: image.to_string(),
            });
        }
        Err(Error::docker(format!(
            "{} pull {} failed: {}",
            self.binary,
            image,
            output.trim()
        )))
    }

    async fn run_container(&self, spec: &ContainerSpec) -> Result<String> {
        let cmd = self.cli(spec.run_args());
        debug!("Starting container: {}", cmd.display());

        let result = self.launcher.execute(cmd).await?;
        if !result.success() {
            return Err(Error::docker(format!(
                "Failed to create container: {}",
                result.output.trim()
            )));
        }

        // `run -d` prints the container id as its last line
        let container_id = result
            .output
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default()
            .to_string();

        if container_id.is_empty() {
            return Err(Error::docker("Failed to get container ID"));
        }

        Ok(container_id)
    }

    fn exec_command(&self, container_id: &str, working_dir: &str, shell_line: &str) -> Command {
        self.cli(["exec", "-w", working_dir, container_id, "sh", "-c", shell_line])
    }

    async fn stop_container(&self, container_id: &str) -> Result<StopOutcome> {
        let cmd = self.cli(["stop", container_id]);
        let result = self.launcher.execute(cmd).await?;

        if result.success() {
            return Ok(StopOutcome::Stopped);
        }
        if result.output.contains("No such container") || result.output.contains("is not running") {
            return Ok(StopOutcome::AlreadyGone);
        }
        Err(Error::docker(format!(
            "Failed to stop container {}: {}",
            container_id,
            result.output.trim()
        )))
    }
}
