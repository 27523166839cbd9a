//! Local process execution backend

use async_process::{Child, ChildStderr, ChildStdout, Stdio};
use async_trait::async_trait;
use futures::stream::Stream;
use futures_lite::io::{AsyncBufRead, AsyncRead, BufReader};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::debug;

use crate::command::{Command, OutputFraming};
use crate::error::{Error, Result};
use crate::event::{LogSource, ProcessEvent, ProcessEventType};
use crate::launcher::Launcher;
use crate::process::{ExitStatus, ProcessHandle};

/// Launcher for executing processes locally
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalLauncher;

/// A handle to control a local process
///
/// Dropping the handle kills the child if it is still running.
pub struct LocalProcessHandle {
    /// The underlying child process
    child: Child,
}

/// Stream of process events, merging stdout and stderr
///
/// Each pipe is read until EOF regardless of what it carries, so the child
/// never writes into a closed pipe. Lines that are not valid UTF-8 are
/// decoded lossily.
pub struct ProcessEventStream {
    stdout: Option<Pipe<ChildStdout>>,
    stderr: Option<Pipe<ChildStderr>>,
    framing: OutputFraming,
    started_sent: bool,
    child_id: u32,
}

/// One output pipe and the bytes of a line not yet terminated
struct Pipe<R> {
    reader: BufReader<R>,
    pending: Vec<u8>,
    source: LogSource,
}

#[async_trait]
impl Launcher for LocalLauncher {
    type EventStream = ProcessEventStream;
    type Handle = LocalProcessHandle;

    async fn launch(&self, command: Command) -> Result<(Self::EventStream, Self::Handle)> {
        let program = command.get_program().to_string_lossy().into_owned();
        debug!("Launching local process: {}", command.display());

        let mut async_cmd = command.prepare();
        async_cmd.stdin(Stdio::null());
        async_cmd.stdout(Stdio::piped());
        async_cmd.stderr(Stdio::piped());

        let mut child = async_cmd
            .spawn()
            .map_err(|e| Error::from_spawn(&program, e))?;

        let child_id = child.id();

        let stdout = child.stdout.take().map(|s| Pipe::new(s, LogSource::Stdout));
        let stderr = child.stderr.take().map(|s| Pipe::new(s, LogSource::Stderr));

        let events = ProcessEventStream {
            stdout,
            stderr,
            framing: command.get_output_framing(),
            started_sent: false,
            child_id,
        };

        let handle = LocalProcessHandle { child };

        Ok((events, handle))
    }
}

#[async_trait]
impl ProcessHandle for LocalProcessHandle {
    async fn wait(&mut self) -> Result<ExitStatus> {
        let status = self
            .child
            .status()
            .await
            .map_err(|e| Error::spawn_failed(format!("Failed to wait for process: {}", e)))?;

        Ok(ExitStatus {
            code: status.code(),
            #[cfg(unix)]
            signal: {
                use std::os::unix::process::ExitStatusExt;
                status.signal()
            },
        })
    }
}

impl Drop for LocalProcessHandle {
    fn drop(&mut self) {
        // Synchronous kill; the process may already have exited
        let _ = self.child.kill();
    }
}

impl<R: AsyncRead + Unpin> Pipe<R> {
    fn new(inner: R, source: LogSource) -> Self {
        Self {
            reader: BufReader::new(inner),
            pending: Vec::new(),
            source,
        }
    }

    /// Next event from this pipe; `Ready(None)` once it reached EOF
    fn poll_event(&mut self, framing: OutputFraming, cx: &mut Context<'_>) -> Poll<Option<ProcessEvent>> {
        loop {
            let available = match Pin::new(&mut self.reader).poll_fill_buf(cx) {
                Poll::Ready(Ok(buf)) => buf,
                Poll::Ready(Err(e)) if e.kind() == io::ErrorKind::Interrupted => continue,
                Poll::Ready(Err(e)) => {
                    debug!("Reading {:?} failed, treating as closed: {}", self.source, e);
                    &[][..]
                }
                Poll::Pending => return Poll::Pending,
            };

            if available.is_empty() {
                // EOF: an unterminated last line is still a line
                if self.pending.is_empty() {
                    return Poll::Ready(None);
                }
                return Poll::Ready(Some(self.take_line()));
            }

            match framing {
                OutputFraming::Chunks => {
                    let bytes = available.to_vec();
                    Pin::new(&mut self.reader).consume(bytes.len());
                    return Poll::Ready(Some(ProcessEvent::new_chunk(self.source, bytes)));
                }
                OutputFraming::Lines => match available.iter().position(|b| *b == b'\n') {
                    Some(end) => {
                        self.pending.extend_from_slice(&available[..end]);
                        Pin::new(&mut self.reader).consume(end + 1);
                        return Poll::Ready(Some(self.take_line()));
                    }
                    None => {
                        let len = available.len();
                        self.pending.extend_from_slice(available);
                        Pin::new(&mut self.reader).consume(len);
                    }
                },
            }
        }
    }

    fn take_line(&mut self) -> ProcessEvent {
        if self.pending.last() == Some(&b'\r') {
            self.pending.pop();
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        ProcessEvent::new_with_data(self.source.into(), line)
    }
}

impl ProcessEventStream {
    fn poll_pipe<R: AsyncRead + Unpin>(
        pipe: &mut Option<Pipe<R>>,
        framing: OutputFraming,
        cx: &mut Context<'_>,
    ) -> Poll<Option<ProcessEvent>> {
        let Some(open) = pipe else {
            return Poll::Ready(None);
        };
        let polled = open.poll_event(framing, cx);
        if let Poll::Ready(None) = polled {
            *pipe = None;
        }
        polled
    }
}

impl Stream for ProcessEventStream {
    type Item = ProcessEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        if !this.started_sent {
            this.started_sent = true;
            let event = ProcessEvent::new(ProcessEventType::Started { pid: this.child_id });
            return Poll::Ready(Some(event));
        }

        if let Poll::Ready(Some(event)) = Self::poll_pipe(&mut this.stdout, this.framing, cx) {
            return Poll::Ready(Some(event));
        }

        if let Poll::Ready(Some(event)) = Self::poll_pipe(&mut this.stderr, this.framing, cx) {
            return Poll::Ready(Some(event));
        }

        if this.stdout.is_none() && this.stderr.is_none() {
            return Poll::Ready(None);
        }

        Poll::Pending
    }
}
