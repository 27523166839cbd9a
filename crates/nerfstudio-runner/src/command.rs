//! Fluent command builder and the tool's command factories

use crate::args::{ArgValue, ArgumentPath};
use crate::error::{Error, Result};
use crate::manager::ExecutionManager;
use command_executor::ExitResult;
use std::io::Write;
use tracing::debug;

/// A tool invocation being assembled
///
/// Holds the base invocation (`ns-train nerfacto`) and the tokens appended
/// so far. Arguments are added through [`arg`](Self::arg), which returns an
/// [`ArgumentBuilder`] that can be extended with nested segments before a
/// value is supplied:
///
/// ```no_run
/// # async fn demo(manager: &nerfstudio_runner::ExecutionManager) -> nerfstudio_runner::Result<()> {
/// use nerfstudio_runner::{path, train};
///
/// let result = train(manager, "nerfacto")
///     .arg("data").set(path("/data/processed"))
///     .arg("max_num_iterations").set(30000)
///     .arg("pipeline").arg("model").arg("predict_normals").set(true)
///     .arg("viewer_quit_on_train_completion").set(true)
///     .run()
///     .await?;
/// println!("exit code {}", result.exit_code());
/// # Ok(())
/// # }
/// ```
///
/// Staging failures do not interrupt the chain; the first one is kept and
/// returned by [`run`](Self::run).
#[derive(Debug)]
pub struct Command<'m> {
    manager: &'m ExecutionManager,
    base: String,
    tokens: Vec<String>,
    error: Option<Error>,
}

impl<'m> Command<'m> {
    /// Start a command with the given base invocation
    pub fn new(manager: &'m ExecutionManager, base: impl Into<String>) -> Self {
        Self {
            manager,
            base: base.into(),
            tokens: Vec::new(),
            error: None,
        }
    }

    /// Begin an argument named `name`
    pub fn arg(self, name: &str) -> ArgumentBuilder<'m> {
        ArgumentBuilder {
            path: ArgumentPath::root(name),
            command: self,
        }
    }

    /// Append `--name` with no value
    pub fn flag(self, name: &str) -> Self {
        self.arg(name).flag()
    }

    /// Append a bare token at the current position
    ///
    /// Never stages: a local path passed here must already be valid for the
    /// tool, e.g. relative to the workspace.
    pub fn add_positional_arg(mut self, token: impl Into<String>) -> Self {
        self.tokens.push(token.into());
        self
    }

    /// The base invocation
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The full token list: base invocation followed by every argument
    pub fn tokens(&self) -> Vec<String> {
        std::iter::once(self.base.clone())
            .chain(self.tokens.iter().cloned())
            .collect()
    }

    /// The first error recorded while building, if any
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    fn push(&mut self, flag: String, value: ArgValue) {
        if self.error.is_some() {
            debug!("Skipping {} after an earlier build error", flag);
            return;
        }

        match value {
            ArgValue::Absent => self.tokens.push(flag),
            ArgValue::Literal(value) => self.tokens.extend([flag, value]),
            ArgValue::Path(path) => match self.manager.stage(&path) {
                Ok(outcome) => self.tokens.extend([flag, outcome.into_value()]),
                Err(e) => self.error = Some(e),
            },
        }
    }

    /// Run the command, streaming its output to stdout
    pub async fn run(self) -> Result<ExitResult> {
        self.run_with_sink(std::io::stdout()).await
    }

    /// Run the command, streaming its output into `sink`
    pub async fn run_with_sink<W: Write + Send>(mut self, sink: W) -> Result<ExitResult> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        let tokens = self.tokens();
        self.manager.execute_with_sink(&tokens, sink).await
    }
}

/// A pending argument on a [`Command`]
#[derive(Debug)]
pub struct ArgumentBuilder<'m> {
    command: Command<'m>,
    path: ArgumentPath,
}

impl<'m> ArgumentBuilder<'m> {
    /// Extend the dotted name with another segment
    pub fn arg(mut self, segment: &str) -> Self {
        self.path = self.path.extend(segment);
        self
    }

    /// The accumulated name
    pub fn path(&self) -> &ArgumentPath {
        &self.path
    }

    /// Supply the value and return to the command
    pub fn set(self, value: impl Into<ArgValue>) -> Command<'m> {
        self.finish(value.into(), false)
    }

    /// Like [`set`](Self::set), but the flag keeps its underscores
    pub fn set_keep_underscore(self, value: impl Into<ArgValue>) -> Command<'m> {
        self.finish(value.into(), true)
    }

    /// Emit the flag alone
    pub fn flag(self) -> Command<'m> {
        self.finish(ArgValue::Absent, false)
    }

    fn finish(self, value: ArgValue, keep_underscore: bool) -> Command<'m> {
        let Self { mut command, path } = self;
        command.push(path.flag(keep_underscore), value);
        command
    }
}

/// `ns-train <method>`
pub fn train<'m>(manager: &'m ExecutionManager, method: &str) -> Command<'m> {
    Command::new(manager, format!("ns-train {}", method))
}

/// `ns-process-data <processor> --data <data>`
///
/// `data` is staged when given as a [`PathArg`](crate::PathArg), otherwise
/// passed verbatim.
pub fn process_data<'m>(
    manager: &'m ExecutionManager,
    processor: &str,
    data: impl Into<ArgValue>,
) -> Command<'m> {
    Command::new(manager, format!("ns-process-data {}", processor))
        .arg("data")
        .set(data)
}

/// `ns-process-data images --data <input> --output-dir <output_dir>`
pub fn process_images<'m>(
    manager: &'m ExecutionManager,
    input: impl Into<ArgValue>,
    output_dir: impl Into<ArgValue>,
) -> Command<'m> {
    process_data(manager, "images", input)
        .arg("output_dir")
        .set(output_dir)
}

/// Any other tool invocation, e.g. `ns-export pointcloud`
pub fn custom_command<'m>(manager: &'m ExecutionManager, base: impl Into<String>) -> Command<'m> {
    Command::new(manager, base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManagerConfig;
    use crate::staging::path;
    use futures::executor::block_on;
    use tempfile::TempDir;

    fn host_manager(dir: &TempDir) -> ExecutionManager {
        ExecutionManager::new(ManagerConfig::host_local(dir.path().join("out"))).unwrap()
    }

    #[test]
    fn test_tokens_from_chained_args() {
        let dir = TempDir::new().unwrap();
        let manager = host_manager(&dir);

        let cmd = train(&manager, "nerfacto")
            .arg("max_num_iterations")
            .set(30000)
            .arg("pipeline")
            .arg("model")
            .arg("some_arg")
            .set(0.5)
            .arg("viewer_websocket_port")
            .set(7008)
            .flag("vis")
            .arg("machine")
            .arg("num_devices")
            .set_keep_underscore(1)
            .add_positional_arg("colmap");

        assert!(cmd.error().is_none());
        assert_eq!(
            cmd.tokens(),
            [
                "ns-train nerfacto",
                "--max-num-iterations",
                "30000",
                "--pipeline.model.some-arg",
                "0.5",
                "--viewer.websocket-port",
                "7008",
                "--vis",
                "--machine.num_devices",
                "1",
                "colmap",
            ]
        );
    }

    #[test]
    fn test_booleans_and_absent_values() {
        let dir = TempDir::new().unwrap();
        let manager = host_manager(&dir);

        let cmd = custom_command(&manager, "ns-export pointcloud")
            .arg("normal_method")
            .set(None::<String>)
            .arg("remove_outliers")
            .set(false);

        assert_eq!(
            cmd.tokens(),
            ["ns-export pointcloud", "--normal-method", "--remove-outliers", "False"]
        );
    }

    #[test]
    fn test_staging_before_initialize_is_deferred() {
        let dir = TempDir::new().unwrap();
        let manager = host_manager(&dir);

        let cmd = process_data(&manager, "video", path(dir.path()))
            .arg("num_frames_target")
            .set(300);

        assert!(matches!(cmd.error(), Some(Error::NotInitialized)));
        assert_eq!(cmd.tokens(), ["ns-process-data video"]);
        assert!(matches!(block_on(cmd.run()), Err(Error::NotInitialized)));
    }

    #[test]
    fn test_process_data_with_workspace_relative_string() {
        let dir = TempDir::new().unwrap();
        let manager = host_manager(&dir);

        let cmd = process_data(&manager, "images", "raw/images");
        assert_eq!(cmd.tokens(), ["ns-process-data images", "--data", "raw/images"]);
    }
}
