//! Child processes exposed as byte streams.
//!
//! [`ProcessStream::spawn`] starts a tool with its stdout piped back as a
//! [`Stream`] of [`Bytes`]. An optional input stream is copied into the
//! child's stdin by a feeder task. A supervisor task owns the [`Child`]:
//! when the stream is dropped before the process finishes, the supervisor
//! kills it, so an abandoned HTTP response never leaves a tool running.
//!
//! A non-zero exit is reported as the final item of the stream, carrying the
//! tail of the tool's stderr.

use std::collections::VecDeque;
use std::future::Future;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use futures::stream::{BoxStream, Stream};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::io::{ReaderStream, StreamReader};

use crate::command::tool_name;

/// The byte stream type passed between extractor, transcoder and HTTP body.
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// Number of stderr lines kept for error messages.
const STDERR_TAIL_LINES: usize = 8;

#[derive(Debug)]
struct ExitReport {
    status: ExitStatus,
    stderr_tail: String,
}

/// Stdout of a running tool.
pub struct ProcessStream {
    tool: String,
    stdout: ReaderStream<ChildStdout>,
    stdout_done: bool,
    exit: Option<oneshot::Receiver<io::Result<ExitReport>>>,
    feeder: Option<JoinHandle<io::Result<u64>>>,
    // Dropping this tells the supervisor nobody is listening any more.
    _cancel: oneshot::Sender<()>,
}

impl ProcessStream {
    /// Spawn `program` with `args`, feeding `input` (if any) to its stdin.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(
        program: &Path,
        args: &[String],
        input: Option<ByteStream>,
    ) -> cf_core::Result<Self> {
        let tool = tool_name(program);

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(tool = %tool, ?args, "Spawning streaming tool");

        let mut child = cmd
            .spawn()
            .map_err(|e| cf_core::Error::tool(&tool, format!("failed to spawn: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| cf_core::Error::tool(&tool, "stdout was not captured"))?;

        let feeder = match (input, child.stdin.take()) {
            (Some(input), Some(mut stdin)) => Some(tokio::spawn(async move {
                let mut reader = StreamReader::new(input);
                let copied = tokio::io::copy(&mut reader, &mut stdin).await;
                drop(stdin);
                match copied {
                    // The consumer stopped reading (ffmpeg got what it needed
                    // or exited); its own status decides the outcome.
                    Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(0),
                    other => other,
                }
            })),
            _ => None,
        };

        let stderr = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(collect_stderr(tool.clone(), stderr)));

        let (exit_tx, exit_rx) = oneshot::channel();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        tokio::spawn(supervise(tool.clone(), child, stderr, exit_tx, cancel_rx));

        Ok(Self {
            tool,
            stdout: ReaderStream::new(stdout),
            stdout_done: false,
            exit: Some(exit_rx),
            feeder,
            _cancel: cancel_tx,
        })
    }

    /// Box this stream as a [`ByteStream`].
    pub fn boxed(self) -> ByteStream {
        Box::pin(self)
    }
}

impl Drop for ProcessStream {
    fn drop(&mut self) {
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
    }
}

impl Stream for ProcessStream {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if !this.stdout_done {
            match ready!(Pin::new(&mut this.stdout).poll_next(cx)) {
                Some(chunk) => return Poll::Ready(Some(chunk)),
                None => this.stdout_done = true,
            }
        }

        if let Some(exit) = this.exit.as_mut() {
            let report = ready!(Pin::new(exit).poll(cx));
            this.exit = None;
            match report {
                Ok(Ok(report)) if report.status.success() => {}
                Ok(Ok(report)) => {
                    return Poll::Ready(Some(Err(io::Error::other(format!(
                        "{} exited with {}: {}",
                        this.tool, report.status, report.stderr_tail
                    )))));
                }
                Ok(Err(e)) => return Poll::Ready(Some(Err(e))),
                Err(_) => {
                    return Poll::Ready(Some(Err(io::Error::other(format!(
                        "{} supervisor stopped unexpectedly",
                        this.tool
                    )))));
                }
            }
        }

        if let Some(feeder) = this.feeder.as_mut() {
            let fed = ready!(Pin::new(feeder).poll(cx));
            this.feeder = None;
            match fed {
                Ok(Ok(bytes)) => {
                    tracing::trace!(tool = %this.tool, bytes, "Input fully delivered");
                }
                Ok(Err(e)) => return Poll::Ready(Some(Err(e))),
                Err(join) => return Poll::Ready(Some(Err(io::Error::other(join)))),
            }
        }

        Poll::Ready(None)
    }
}

/// Wait for the child to exit or for the consumer to go away, whichever
/// comes first.
async fn supervise(
    tool: String,
    mut child: Child,
    stderr: Option<JoinHandle<String>>,
    exit_tx: oneshot::Sender<io::Result<ExitReport>>,
    cancel_rx: oneshot::Receiver<()>,
) {
    let finished = tokio::select! {
        status = child.wait() => Some(status),
        _ = cancel_rx => None,
    };

    match finished {
        Some(status) => {
            let stderr_tail = match stderr {
                Some(handle) => handle.await.unwrap_or_default(),
                None => String::new(),
            };
            let report = status.map(|status| {
                if !status.success() {
                    tracing::warn!(tool = %tool, %status, stderr = %stderr_tail, "Tool failed");
                }
                ExitReport {
                    status,
                    stderr_tail,
                }
            });
            let _ = exit_tx.send(report);
        }
        None => {
            if let Err(e) = child.start_kill() {
                tracing::debug!(tool = %tool, "Kill failed (already exited?): {e}");
            }
            let _ = child.wait().await;
            tracing::debug!(tool = %tool, "Stopped after consumer went away");
        }
    }
}

/// Log stderr lines at debug level and keep the last few.
async fn collect_stderr(tool: String, stderr: ChildStderr) -> String {
    let mut lines = BufReader::new(stderr).lines();
    let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim_end().to_string();
                if line.is_empty() {
                    continue;
                }
                tracing::debug!(tool = %tool, "{line}");
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(tool = %tool, "stderr read error: {e}");
                break;
            }
        }
    }

    Vec::from(tail).join("\n")
}
