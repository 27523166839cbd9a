//! Shared fixtures for runner integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use command_executor::{Command, ContainerRuntime, ContainerSpec, Error, Result, StopOutcome};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const CONTAINER_ID: &str = "c0ffee0123456789c0ffee0123456789";

/// What the fake runtime has been asked to do
#[derive(Debug, Default)]
pub struct Calls {
    pub image_checks: Vec<String>,
    pub pulls: Vec<String>,
    pub runs: Vec<ContainerSpec>,
    pub execs: Vec<(String, String, String)>,
    pub stops: Vec<String>,
}

/// Container runtime that never talks to a daemon
///
/// Exec lines run through the host shell inside `exec_root`, which stands in
/// for the container's working directory.
#[derive(Clone)]
pub struct FakeRuntime {
    pub calls: Arc<Mutex<Calls>>,
    pub image_present: bool,
    pub pull_fails: bool,
    pub run_fails: bool,
    pub stop_outcome: StopOutcome,
    pub exec_root: PathBuf,
}

impl FakeRuntime {
    pub fn new(exec_root: &Path) -> Self {
        Self {
            calls: Arc::default(),
            image_present: true,
            pull_fails: false,
            run_fails: false,
            stop_outcome: StopOutcome::Stopped,
            exec_root: exec_root.to_path_buf(),
        }
    }

    pub fn calls(&self) -> std::sync::MutexGuard<'_, Calls> {
        self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn image_exists(&self, image: &str) -> Result<bool> {
        self.calls().image_checks.push(image.to_string());
        Ok(self.image_present)
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        self.calls().pulls.push(image.to_string());
        if self.pull_fails {
            return Err(Error::ImageNotFound {
                image: image.to_string(),
            });
        }
        Ok(())
    }

    async fn run_container(&self, spec: &ContainerSpec) -> Result<String> {
        self.calls().runs.push(spec.clone());
        if self.run_fails {
            return Err(Error::docker("could not select device driver"));
        }
        Ok(CONTAINER_ID.to_string())
    }

    fn exec_command(&self, container_id: &str, working_dir: &str, shell_line: &str) -> Command {
        self.calls().execs.push((
            container_id.to_string(),
            working_dir.to_string(),
            shell_line.to_string(),
        ));
        Command::builder("sh")
            .arg("-c")
            .arg(shell_line)
            .current_dir(&self.exec_root)
            .build()
    }

    async fn stop_container(&self, container_id: &str) -> Result<StopOutcome> {
        self.calls().stops.push(container_id.to_string());
        Ok(self.stop_outcome)
    }
}
