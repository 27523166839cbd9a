//! Launcher trait for executing commands

use crate::command::Command;
use crate::error::Result;
use crate::event::ProcessEvent;
use crate::output::OutputTee;
use crate::process::{ExitResult, ExitStatus, ProcessHandle};
use async_trait::async_trait;
use futures::stream::Stream;
use std::io::Write;
use tracing::debug;

/// A launcher that can execute commands in a specific context
#[async_trait]
pub trait Launcher: Send + Sync + 'static {
    /// The event stream type this launcher produces
    type EventStream: Stream<Item = ProcessEvent> + Send + Unpin;

    /// The process handle type this launcher produces
    type Handle: ProcessHandle;

    /// Launch a command, returning event stream and control handle
    async fn launch(&self, command: Command) -> Result<(Self::EventStream, Self::Handle)>;

    /// Run a command to completion, streaming its output through `tee`
    ///
    /// Line events are pushed as lines and chunk events as raw bytes, so the
    /// command's [`OutputFraming`](crate::OutputFraming) decides which.
    async fn execute_tee<W>(&self, command: Command, tee: &mut OutputTee<W>) -> Result<ExitStatus>
    where
        W: Write + Send,
    {
        use futures::StreamExt;

        let (mut events, mut handle) = self.launch(command).await?;

        while let Some(event) = events.next().await {
            let pushed = if let Some(bytes) = event.output_chunk() {
                tee.push_chunk(bytes)
            } else if let Some(line) = event.output_line() {
                tee.push_line(line)
            } else {
                continue;
            };
            if let Err(e) = pushed {
                debug!("Output sink rejected output: {}", e);
            }
        }

        handle.wait().await
    }

    /// Execute a command and wait for it to complete, capturing output
    async fn execute(&self, command: Command) -> Result<ExitResult> {
        let mut tee = OutputTee::new(std::io::sink());
        let status = self.execute_tee(command, &mut tee).await?;
        Ok(ExitResult {
            status,
            output: tee.into_output(),
        })
    }
}
