//! Backend implementations for different execution contexts
//!
//! [`local`] spawns child processes on the host. [`docker`] implements
//! [`ContainerRuntime`](crate::container::ContainerRuntime) on top of it by
//! driving the docker CLI, so container commands are plain local processes
//! (`docker exec ...`) and stream through the same event machinery.

pub mod docker;
pub mod local;

pub use docker::DockerCli;
pub use local::LocalLauncher;
