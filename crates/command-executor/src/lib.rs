//! Runtime-agnostic command execution library
//!
//! This crate provides the process layer used to run an external tool either
//! as a direct child process on the host or through `docker exec` inside a
//! long-lived container. Output is exposed as a stream of [`ProcessEvent`]s and
//! can be teed into a caller sink while being captured.

#![warn(missing_docs)]

pub mod backends;
pub mod command;
pub mod container;
pub mod error;
pub mod event;
pub mod launcher;
pub mod output;
pub mod process;

pub use backends::docker::DockerCli;
pub use backends::local::LocalLauncher;
pub use command::{Command, CommandBuilder, OutputFraming, shell_escape, shell_line};
pub use container::{ContainerRuntime, ContainerSpec, StopOutcome, VolumeBind};
pub use error::{Error, Result};
pub use event::{LogSource, ProcessEvent, ProcessEventType};
pub use launcher::Launcher;
pub use output::OutputTee;
pub use process::{ExitResult, ExitStatus, ProcessHandle};
