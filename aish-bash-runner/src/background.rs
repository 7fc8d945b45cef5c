//! Detached background launches.
//!
//! A unit ending in `&` is wrapped as
//! `nohup <shell> -c '<unit>' > <out> 2> <err> & echo $!` and run in a new
//! session, so the job outlives the prompt loop and never receives the
//! shell's terminal signals. The echoed PID and the two output files are
//! handed to the [`BackgroundJobRegistry`].

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tempfile::Builder;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::env::SessionEnv;
use crate::executor::spawn_recovering;
use crate::jobs::BackgroundJobRegistry;
use crate::process_group;
use crate::style::style;

#[derive(Debug, Error)]
pub enum BackgroundLaunchError {
    #[error("failed to create output file: {0}")]
    OutputFile(#[source] std::io::Error),
    #[error("failed to start command: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("failed to wait for launcher: {0}")]
    Wait(#[source] std::io::Error),
    #[error("nothing to run in background")]
    EmptyCommand,
}

/// A job that was started, with or without a trackable PID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launched {
    Tracked { id: u32, pid: u32 },
    Untracked,
}

/// Strip the trailing `&` marking a background unit.
pub fn strip_background_marker(unit: &str) -> &str {
    let trimmed = unit.trim();
    trimmed.strip_suffix('&').unwrap_or(trimmed).trim_end()
}

/// Build the launcher script for `command`.
pub fn wrapper_script(shell: &Path, command: &str, stdout: &Path, stderr: &Path) -> String {
    format!(
        "nohup {} -c {} > {} 2> {} & echo $!",
        escape(&shell.to_string_lossy()),
        escape(command),
        escape(&stdout.to_string_lossy()),
        escape(&stderr.to_string_lossy()),
    )
}

fn escape(text: &str) -> Cow<'_, str> {
    shell_escape::unix::escape(Cow::Borrowed(text))
}

fn keep_temp_file(prefix: &str) -> Result<PathBuf, BackgroundLaunchError> {
    let file = Builder::new()
        .prefix(prefix)
        .suffix(".log")
        .tempfile()
        .map_err(BackgroundLaunchError::OutputFile)?;
    file.into_temp_path()
        .keep()
        .map_err(|err| BackgroundLaunchError::OutputFile(err.error))
}

/// Launch `unit` detached and register it with `jobs`.
pub async fn launch(
    shell: &Path,
    unit: &str,
    env: &SessionEnv,
    jobs: &BackgroundJobRegistry,
) -> Result<Launched, BackgroundLaunchError> {
    let command_text = strip_background_marker(unit);
    if command_text.is_empty() {
        return Err(BackgroundLaunchError::EmptyCommand);
    }

    let stdout_path = keep_temp_file("aish_bg_stdout_")?;
    let stderr_path = keep_temp_file("aish_bg_stderr_")?;
    let script = wrapper_script(shell, command_text, &stdout_path, &stderr_path);
    debug!(%script, "launching background job");

    let mut launcher = Command::new(shell);
    launcher
        .arg("-c")
        .arg(&script)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    env.apply(&mut launcher);
    #[cfg(unix)]
    unsafe {
        launcher.pre_exec(process_group::detach_from_tty);
    }

    let child = spawn_recovering(|| launcher.spawn()).map_err(BackgroundLaunchError::Spawn)?;
    let output = child
        .wait_with_output()
        .await
        .map_err(BackgroundLaunchError::Wait)?;

    let echoed = String::from_utf8_lossy(&output.stdout);
    match echoed.trim().parse::<u32>() {
        Ok(pid) => {
            let id = jobs.register(pid, command_text, stdout_path, stderr_path);
            println!(
                "{}",
                style(format!(
                    "[{id}] Running in background: {command_text} (PID: {pid})"
                ))
                .blue()
            );
            Ok(Launched::Tracked { id, pid })
        }
        Err(_) => {
            debug!(output = %echoed, "launcher did not report a PID");
            println!(
                "{}",
                style(format!(
                    "Running in background: {command_text} (unable to track PID)"
                ))
                .blue()
            );
            Ok(Launched::Untracked)
        }
    }
}
