//! DockerCli against a scripted stand-in for the docker binary

#![cfg(unix)]

use command_executor::{ContainerRuntime, ContainerSpec, DockerCli, Error, Launcher, LocalLauncher, StopOutcome};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tempfile::TempDir;

/// Writes an executable script that logs its arguments and answers like docker
fn fake_docker(dir: &Path) -> DockerCli {
    let log = dir.join("calls.log");
    let script = format!(
        r#"#!/bin/sh
echo "$*" >> '{log}'
case "$1" in
  images)
    if [ "$3" = "present:latest" ]; then echo 3f2a1b; fi
    ;;
  pull)
    if [ "$2" = "missing:latest" ]; then
      echo "Error response from daemon: manifest unknown" >&2
      exit 1
    fi
    echo "latest: Pulling from $2"
    ;;
  run)
    echo "Unable to find image locally"
    echo "0123456789abcdef0123456789abcdef"
    ;;
  stop)
    if [ "$2" = "gone" ]; then
      echo "Error response from daemon: No such container: gone" >&2
      exit 1
    fi
    if [ "$2" = "broken" ]; then
      echo "permission denied" >&2
      exit 1
    fi
    echo "$2"
    ;;
esac
"#,
        log = log.display()
    );

    let path = dir.join("docker");
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    DockerCli::with_binary(path.to_string_lossy())
}

fn calls(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("calls.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

#[smol_potat::test]
async fn test_image_exists() {
    let dir = TempDir::new().unwrap();
    let docker = fake_docker(dir.path());

    assert!(docker.image_exists("present:latest").await.unwrap());
    assert!(!docker.image_exists("absent:latest").await.unwrap());
    assert_eq!(calls(dir.path())[0], "images -q present:latest");
}

#[smol_potat::test]
async fn test_pull_image() {
    let dir = TempDir::new().unwrap();
    let docker = fake_docker(dir.path());

    docker.pull_image("other:latest").await.unwrap();

    let err = docker.pull_image("missing:latest").await.unwrap_err();
    assert!(matches!(err, Error::ImageNotFound { ref image } if image == "missing:latest"));
}

#[smol_potat::test]
async fn test_run_container_returns_last_line() {
    let dir = TempDir::new().unwrap();
    let docker = fake_docker(dir.path());
    let spec = ContainerSpec::new("present:latest")
        .with_name("runner-test")
        .with_command(["sleep", "infinity"]);

    let id = docker.run_container(&spec).await.unwrap();
    assert_eq!(id, "0123456789abcdef0123456789abcdef");
    assert_eq!(
        calls(dir.path())[0],
        "run -d --rm --name runner-test present:latest sleep infinity"
    );
}

#[smol_potat::test]
async fn test_stop_container_outcomes() {
    let dir = TempDir::new().unwrap();
    let docker = fake_docker(dir.path());

    assert_eq!(docker.stop_container("abc").await.unwrap(), StopOutcome::Stopped);
    assert_eq!(docker.stop_container("gone").await.unwrap(), StopOutcome::AlreadyGone);
    assert!(matches!(
        docker.stop_container("broken").await,
        Err(Error::DockerOperationFailed { .. })
    ));
}

#[smol_potat::test]
async fn test_exec_command_is_launchable() {
    let dir = TempDir::new().unwrap();
    let docker = fake_docker(dir.path());

    let command = docker.exec_command("abc", "/workspace", "echo 'a b'");
    let result = LocalLauncher.execute(command).await.unwrap();

    assert!(result.success());
    assert_eq!(calls(dir.path())[0], "exec -w /workspace abc sh -c echo 'a b'");
}
