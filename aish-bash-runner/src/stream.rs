//! Streamed-foreground execution.
//!
//! The child's stdout and stderr are piped. One reader task per pipe pushes
//! lines into an unbounded queue and finishes with [`StreamEvent::Closed`].
//! The caller polls both queues without blocking, echoes each line as it
//! arrives and keeps a copy, and returns once both queues are closed and the
//! child has exited.

use std::io::Write;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};
use tracing::{debug, warn};

use crate::executor::{ExecutionResult, INTERRUPT_MARKER, INTERRUPTED_EXIT_CODE, exit_code_of};
use crate::interrupt::SigintGuard;
use crate::process_group::{self, DEFAULT_GRACEFUL_TIMEOUT_MS, KillSignal};
use crate::style::style;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Variables that coax common tools into colored output through a pipe.
pub const COLOR_ENV: &[(&str, &str)] = &[
    ("FORCE_COLOR", "1"),
    ("CLICOLOR_FORCE", "1"),
    ("CLICOLOR", "1"),
    ("COLORTERM", "truecolor"),
    ("TERM", "xterm-256color"),
    ("GIT_PAGER", "cat"),
];

#[derive(Debug, PartialEq, Eq)]
enum StreamEvent {
    Line(String),
    Closed,
}

async fn forward_lines<R>(reader: R, tx: UnboundedSender<StreamEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).into_owned();
                if tx.send(StreamEvent::Line(line)).is_err() {
                    return;
                }
            }
            Err(err) => {
                debug!(error = %err, "pipe read failed");
                break;
            }
        }
    }
    let _ = tx.send(StreamEvent::Closed);
}

/// One output stream being drained by the orchestrator.
struct Channel {
    rx: UnboundedReceiver<StreamEvent>,
    open: bool,
    captured: String,
    echo: fn(&str),
}

impl Channel {
    fn spawn<R>(reader: Option<R>, echo: fn(&str)) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        match reader {
            Some(reader) => {
                tokio::spawn(forward_lines(reader, tx));
            }
            None => {
                let _ = tx.send(StreamEvent::Closed);
            }
        }
        Self {
            rx,
            open: true,
            captured: String::new(),
            echo,
        }
    }

    /// Pull everything currently queued without waiting.
    fn drain(&mut self) {
        while self.open {
            match self.rx.try_recv() {
                Ok(StreamEvent::Line(line)) => {
                    (self.echo)(&line);
                    self.captured.push_str(&line);
                }
                Ok(StreamEvent::Closed) | Err(TryRecvError::Disconnected) => self.open = false,
                Err(TryRecvError::Empty) => break,
            }
        }
    }
}

fn echo_stdout(line: &str) {
    let mut stdout = std::io::stdout().lock();
    let _ = stdout.write_all(line.as_bytes());
    let _ = stdout.flush();
}

fn echo_stderr(line: &str) {
    let (body, newline) = match line.strip_suffix('\n') {
        Some(body) => (body, "\n"),
        None => (line, ""),
    };
    let mut stderr = std::io::stderr().lock();
    let _ = write!(stderr, "{}{newline}", style(body).red().for_stderr());
    let _ = stderr.flush();
}

/// Drive an already spawned child with piped stdout/stderr to completion.
pub(crate) async fn stream_child(mut child: Child) -> ExecutionResult {
    let guard = SigintGuard::install()
        .map_err(|err| warn!(error = %err, "could not install SIGINT guard"))
        .ok();

    let mut stdout = Channel::spawn(child.stdout.take(), echo_stdout);
    let mut stderr = Channel::spawn(child.stderr.take(), echo_stderr);
    let mut status: Option<ExitStatus> = None;

    loop {
        if guard.as_ref().is_some_and(SigintGuard::interrupted) {
            interrupt_child(&mut child).await;
            stdout.drain();
            stderr.drain();
            let mut message = stderr.captured;
            message.push('\n');
            message.push_str(INTERRUPT_MARKER);
            return ExecutionResult {
                exit_code: INTERRUPTED_EXIT_CODE,
                stdout: stdout.captured,
                stderr: message,
                streamed: true,
            };
        }

        stdout.drain();
        stderr.drain();

        if status.is_none() {
            match child.try_wait() {
                Ok(exited) => status = exited,
                Err(err) => {
                    warn!(error = %err, "failed to poll child status");
                    return ExecutionResult {
                        exit_code: crate::executor::ABORTED_EXIT_CODE,
                        stdout: stdout.captured,
                        stderr: format!("Failed to wait for command: {err}"),
                        streamed: true,
                    };
                }
            }
        }

        if let Some(status) = status
            && !stdout.open
            && !stderr.open
        {
            stdout.drain();
            stderr.drain();
            return ExecutionResult {
                exit_code: exit_code_of(status),
                stdout: stdout.captured,
                stderr: stderr.captured,
                streamed: true,
            };
        }

        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// SIGTERM the child, then SIGKILL if it has not exited after the grace period.
async fn interrupt_child(child: &mut Child) {
    let Some(pid) = child.id() else {
        return;
    };
    debug!(pid, "interrupting streamed command");
    if let Err(err) = process_group::signal_process(pid, KillSignal::Term) {
        warn!(pid, error = %err, "failed to send SIGTERM");
    }

    let grace = Duration::from_millis(DEFAULT_GRACEFUL_TIMEOUT_MS);
    if tokio::time::timeout(grace, child.wait()).await.is_err() {
        debug!(pid, "grace period elapsed, killing");
        if let Err(err) = child.start_kill() {
            warn!(pid, error = %err, "failed to kill child");
        }
        let _ = child.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Stdio;
    use tokio::process::Command;

    fn spawn_piped(script: &str) -> Child {
        Command::new("/bin/bash")
            .arg("-c")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap()
    }

    #[tokio::test]
    async fn reader_sends_partial_line_then_closed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        forward_lines(&b"one\ntwo"[..], tx).await;
        assert_eq!(rx.recv().await, Some(StreamEvent::Line("one\n".into())));
        assert_eq!(rx.recv().await, Some(StreamEvent::Line("two".into())));
        assert_eq!(rx.recv().await, Some(StreamEvent::Closed));
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn captures_both_streams_and_exit_code() {
        let result = stream_child(spawn_piped("echo out; echo err >&2; printf tail; exit 3")).await;
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.stdout, "out\ntail");
        assert_eq!(result.stderr, "err\n");
        assert!(result.streamed);
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn repeated_runs_produce_identical_output() {
        let script = "for i in 1 2 3; do echo line $i; done";
        let first = stream_child(spawn_piped(script)).await;
        let second = stream_child(spawn_piped(script)).await;
        assert_eq!(first, second);
        assert_eq!(first.stdout, "line 1\nline 2\nline 3\n");
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn sigint_terminates_child_and_marks_result() {
        let child = spawn_piped("echo started; sleep 30");
        let handle = tokio::spawn(stream_child(child));
        tokio::time::sleep(Duration::from_millis(300)).await;
        nix::sys::signal::raise(nix::sys::signal::Signal::SIGINT).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.exit_code, INTERRUPTED_EXIT_CODE);
        assert!(result.stdout.contains("started"));
        assert!(result.stderr.ends_with(INTERRUPT_MARKER));
        crate::interrupt::clear_interrupt();
    }
}
