//! Fluent command building and execution for the nerfstudio CLI
//!
//! Commands are assembled from dotted argument names and values, local
//! inputs are staged so the tool can see them, and the final token list runs
//! either inside a long-lived container or directly on the host.
//!
//! ```no_run
//! use nerfstudio_runner::{ExecutionManager, ManagerConfig, path, process_images};
//!
//! # fn main() -> nerfstudio_runner::Result<()> {
//! smol::block_on(async {
//!     let manager = ExecutionManager::new(ManagerConfig::new("nerfstudio_output"))?;
//!     manager.initialize().await?;
//!
//!     let result = process_images(&manager, path("/data/raw"), "processed")
//!         .run()
//!         .await?;
//!     if !result.success() {
//!         eprintln!("processing failed with code {}", result.exit_code());
//!     }
//!
//!     manager.cleanup().await;
//!     Ok::<_, nerfstudio_runner::Error>(())
//! })
//! # }
//! ```

#![warn(missing_docs)]

pub mod args;
pub mod colmap;
pub mod command;
pub mod config;
pub mod environment;
pub mod error;
pub mod global;
pub mod logging;
pub mod manager;
pub mod staging;

pub use args::{ArgValue, ArgumentPath};
pub use command::{ArgumentBuilder, Command, custom_command, process_data, process_images, train};
pub use command_executor::{ExitResult, ExitStatus};
pub use config::ManagerConfig;
pub use environment::{ExecutionEnvironment, ExecutionMode};
pub use error::{Error, Result};
pub use manager::ExecutionManager;
pub use staging::{PathArg, StageOutcome, StagedPathMapping, path, path_with_depth};
