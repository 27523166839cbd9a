//! Execution manager: owns the execution environment and runs tool commands

use crate::config::ManagerConfig;
use crate::environment::{ExecutionEnvironment, ExecutionMode};
use crate::error::{Error, Result};
use crate::staging::{self, PathArg, StageOutcome, Stager};
use command_executor::{
    Command, ContainerRuntime, ContainerSpec, DockerCli, ExitResult, Launcher, LocalLauncher,
    OutputFraming, OutputTee, StopOutcome, VolumeBind, shell_line,
};
use std::fs;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Runs tool commands in a container or directly on the host
///
/// A manager is inert until [`initialize`](Self::initialize) brings up its
/// environment. [`cleanup`](Self::cleanup) tears it down again; dropping an
/// initialized manager cleans up as well.
pub struct ExecutionManager {
    config: ManagerConfig,
    excludes: Vec<glob::Pattern>,
    runtime: Box<dyn ContainerRuntime>,
    launcher: LocalLauncher,
    state: Mutex<Option<Arc<ExecutionEnvironment>>>,
}

impl std::fmt::Debug for ExecutionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionManager")
            .field("config", &self.config)
            .field("environment", &self.environment())
            .finish_non_exhaustive()
    }
}

impl ExecutionManager {
    /// Manager using the docker CLI as container runtime
    pub fn new(config: ManagerConfig) -> Result<Self> {
        Self::with_runtime(config, DockerCli::new())
    }

    /// Manager using a custom container runtime
    pub fn with_runtime(config: ManagerConfig, runtime: impl ContainerRuntime + 'static) -> Result<Self> {
        config.validate()?;
        let excludes = config.exclude_patterns()?;
        Ok(Self {
            config,
            excludes,
            runtime: Box::new(runtime),
            launcher: LocalLauncher,
            state: Mutex::new(None),
        })
    }

    /// The configuration this manager was built from
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    fn state(&self) -> MutexGuard<'_, Option<Arc<ExecutionEnvironment>>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The active environment, if any
    pub fn environment(&self) -> Option<Arc<ExecutionEnvironment>> {
        self.state().clone()
    }

    /// Whether an environment is active
    pub fn is_initialized(&self) -> bool {
        self.state().is_some()
    }

    /// Bring up the execution environment
    ///
    /// Creates the workspace and staging directories, then either starts the
    /// keep-alive container (image configured) or selects host-local
    /// execution. Calling this again while an environment is active returns
    /// the existing one.
    pub async fn initialize(&self) -> Result<Arc<ExecutionEnvironment>> {
        if let Some(env) = self.environment() {
            debug!("Execution environment already initialized");
            return Ok(env);
        }

        let workspace = staging::absolutize(&self.config.workspace)?;
        fs::create_dir_all(&workspace)?;
        let staging_dir = workspace.join(&self.config.staging_dir_name);
        fs::create_dir_all(&staging_dir)?;

        let env = match &self.config.image {
            None => {
                info!("Running commands on the host in {}", workspace.display());
                ExecutionEnvironment::host_local(workspace, staging_dir)
            }
            Some(image) => match self.start_container(image, &workspace, &staging_dir).await {
                Ok(id) => ExecutionEnvironment {
                    mode: ExecutionMode::Containerized,
                    workspace_host_path: workspace,
                    workspace_remote_path: self.config.remote_workspace.clone(),
                    staging_host_path: staging_dir,
                    staging_remote_path: self.config.remote_staging.clone(),
                    handle: Some(id),
                },
                Err(e) => {
                    if let Err(rm) = fs::remove_dir_all(&staging_dir) {
                        debug!("Could not remove staging dir after failed start: {}", rm);
                    }
                    return Err(e);
                }
            },
        };

        debug!("Staging directory: {}", env.staging_host_path.display());
        let env = Arc::new(env);
        *self.state() = Some(env.clone());
        Ok(env)
    }

    async fn start_container(
        &self,
        image: &str,
        workspace: &std::path::Path,
        staging_dir: &std::path::Path,
    ) -> Result<String> {
        let exists = self.runtime.image_exists(image).await.map_err(|e| {
            Error::environment_start(format!("container runtime unavailable: {}", e))
        })?;

        if exists {
            info!("Image {} found locally", image);
        } else {
            info!("Image {} not found locally, pulling", image);
            self.runtime
                .pull_image(image)
                .await
                .map_err(|source| Error::ImagePull {
                    image: image.to_string(),
                    source,
                })?;
            info!("Pulled image {}", image);
        }

        let spec = self.container_spec(image, workspace, staging_dir);
        let id = self
            .runtime
            .run_container(&spec)
            .await
            .map_err(|e| Error::environment_start(e.to_string()))?;

        info!("Started container {} from {}", id.get(..12).unwrap_or(&id), image);
        Ok(id)
    }

    fn container_spec(
        &self,
        image: &str,
        workspace: &std::path::Path,
        staging_dir: &std::path::Path,
    ) -> ContainerSpec {
        let config = &self.config;
        let mut spec = ContainerSpec::new(image)
            .with_name(format!("nerfstudio-runner-{}", Uuid::new_v4()))
            .with_volume(VolumeBind::read_write(workspace, &config.remote_workspace))
            .with_volume(VolumeBind::read_write(staging_dir, &config.remote_staging))
            .with_working_dir(&config.remote_workspace)
            .with_command(["sleep", "infinity"]);

        if config.gpus {
            spec = spec.with_gpus("all");
        }
        if let Some(mode) = &config.ipc_mode {
            spec = spec.with_ipc_mode(mode);
        }
        if let Some(size) = &config.shm_size {
            spec = spec.with_shm_size(size);
        }
        for port in &config.ports {
            spec = spec.with_port(*port, *port);
        }
        for (key, value) in &config.env {
            spec = spec.with_env(key, value);
        }
        if config.run_as_current_user {
            spec = spec.with_user(format!(
                "{}:{}",
                nix::unistd::getuid(),
                nix::unistd::getgid()
            ));
        }

        spec
    }

    /// Make a local path visible to the tool
    pub fn stage(&self, arg: &PathArg) -> Result<StageOutcome> {
        let env = self.environment().ok_or(Error::NotInitialized)?;
        Stager::new(&env, &self.excludes).stage(arg)
    }

    /// Run `tokens`, streaming output to stdout
    pub async fn execute<S: AsRef<str>>(&self, tokens: &[S]) -> Result<ExitResult> {
        self.execute_with_sink(tokens, io::stdout()).await
    }

    /// Run `tokens`, streaming output into `sink` as it arrives
    ///
    /// On the host output is forwarded line by line. In a container it is
    /// forwarded in raw chunks, so carriage-return progress bars and the exact
    /// bytes the tool wrote come through unchanged. The first token is the base invocation and may contain spaces
    /// (`ns-process-data images`). A non-zero exit is logged and returned,
    /// not raised.
    pub async fn execute_with_sink<S, W>(&self, tokens: &[S], sink: W) -> Result<ExitResult>
    where
        S: AsRef<str>,
        W: Write + Send,
    {
        let env = self.environment().ok_or(Error::NotInitialized)?;
        let command = self.build_command(&env, tokens)?;

        info!("Running: {}", command.display());
        let mut tee = OutputTee::new(sink);
        let status = self.launcher.execute_tee(command, &mut tee).await?;

        if !status.success() {
            error!("Command exited with code {}", status.exit_code());
        }

        Ok(ExitResult {
            status,
            output: tee.into_output(),
        })
    }

    fn build_command<S: AsRef<str>>(&self, env: &ExecutionEnvironment, tokens: &[S]) -> Result<Command> {
        let Some((base, rest)) = tokens.split_first() else {
            return Err(command_executor::Error::spawn_failed("empty command").into());
        };

        match (&env.mode, &env.handle) {
            (ExecutionMode::Containerized, Some(id)) => {
                let line = shell_line(base.as_ref(), rest);
                let mut command = self
                    .runtime
                    .exec_command(id, &env.workspace_remote_path, &line);
                command.output_framing(OutputFraming::Chunks);
                Ok(command)
            }
            _ => {
                let rest: Vec<&str> = rest.iter().map(|t| t.as_ref()).collect();
                let mut command = Command::from_invocation(base.as_ref(), rest).ok_or_else(|| {
                    command_executor::Error::spawn_failed("empty base invocation")
                })?;
                command.current_dir(&env.workspace_host_path);
                Ok(command)
            }
        }
    }

    /// Tear down the environment
    ///
    /// Stops the container (already stopped counts as success) and removes
    /// the staging directory. Failures are logged and the remaining steps
    /// still run. Safe to call repeatedly.
    pub async fn cleanup(&self) {
        let Some(env) = self.state().take() else {
            debug!("Nothing to clean up");
            return;
        };

        if let Some(id) = &env.handle {
            let short = env.short_id().unwrap_or(id);
            info!("Stopping container {}", short);
            match self.runtime.stop_container(id).await {
                Ok(StopOutcome::Stopped) => info!("Container {} stopped", short),
                Ok(StopOutcome::AlreadyGone) => debug!("Container {} was already stopped", short),
                Err(e) => warn!("Failed to stop container {}: {}", short, e),
            }
        }

        match fs::remove_dir_all(&env.staging_host_path) {
            Ok(()) => info!(
                "Removed staging directory {}",
                env.staging_host_path.display()
            ),
            Err(e) if e.kind() == io::ErrorKind::NotFound => debug!(
                "Staging directory {} already removed",
                env.staging_host_path.display()
            ),
            Err(e) => error!(
                "Failed to remove staging directory {}: {}",
                env.staging_host_path.display(),
                e
            ),
        }
    }

    /// [`cleanup`](Self::cleanup) for synchronous contexts (exit hooks, drop)
    pub fn cleanup_blocking(&self) {
        futures_lite::future::block_on(self.cleanup());
    }
}

impl Drop for ExecutionManager {
    fn drop(&mut self) {
        if self.is_initialized() {
            self.cleanup_blocking();
        }
    }
}
