//! Process-wide execution manager
//!
//! Scripts that drive a single pipeline can call [`init`] once and then build
//! commands without passing a manager around. The environment is cleaned up
//! when the process exits normally.

use crate::args::ArgValue;
use crate::command::{self, Command};
use crate::config::ManagerConfig;
use crate::error::{Error, Result};
use crate::manager::ExecutionManager;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::error;

static MANAGER: OnceLock<ExecutionManager> = OnceLock::new();

static EXIT_HOOK_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Create and initialize the process-wide manager
///
/// The first call wins; later calls return the existing manager and ignore
/// `config`. If the environment cannot be started the error is logged and
/// the process exits with status 1.
pub fn init(config: ManagerConfig) -> &'static ExecutionManager {
    MANAGER.get_or_init(|| {
        let manager = match ExecutionManager::new(config) {
            Ok(manager) => manager,
            Err(e) => {
                error!("Invalid runner configuration: {}", e);
                std::process::exit(1);
            }
        };

        if let Err(e) = futures_lite::future::block_on(manager.initialize()) {
            error!("Failed to initialize execution environment: {}", e);
            std::process::exit(1);
        }

        install_exit_hook();
        manager
    })
}

/// The process-wide manager, if [`init`] has run and it is still active
pub fn manager() -> Result<&'static ExecutionManager> {
    MANAGER
        .get()
        .filter(|m| m.is_initialized())
        .ok_or(Error::NotInitialized)
}

/// Clean up the process-wide manager now instead of at exit
pub fn cleanup() {
    if let Some(manager) = MANAGER.get() {
        manager.cleanup_blocking();
    }
}

fn install_exit_hook() {
    if EXIT_HOOK_INSTALLED.swap(true, Ordering::SeqCst) {
        return;
    }

    extern "C" fn cleanup_on_exit() {
        cleanup();
    }

    // SAFETY: the hook takes no arguments and only touches the OnceLock
    #[allow(unsafe_code)]
    unsafe {
        libc::atexit(cleanup_on_exit);
    }
}

/// [`Command::new`] against the process-wide manager
pub fn command(base: impl Into<String>) -> Result<Command<'static>> {
    Ok(Command::new(manager()?, base))
}

/// [`command::train`] against the process-wide manager
pub fn train(method: &str) -> Result<Command<'static>> {
    Ok(command::train(manager()?, method))
}

/// [`command::process_data`] against the process-wide manager
pub fn process_data(processor: &str, data: impl Into<ArgValue>) -> Result<Command<'static>> {
    Ok(command::process_data(manager()?, processor, data))
}

/// [`command::process_images`] against the process-wide manager
pub fn process_images(
    input: impl Into<ArgValue>,
    output_dir: impl Into<ArgValue>,
) -> Result<Command<'static>> {
    Ok(command::process_images(manager()?, input, output_dir))
}

/// [`command::custom_command`] against the process-wide manager
pub fn custom_command(base: impl Into<String>) -> Result<Command<'static>> {
    Ok(command::custom_command(manager()?, base))
}
