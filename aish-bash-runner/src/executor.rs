//! Unit execution.
//!
//! [`ProcessRunner`] picks a mode for each unit (background for a trailing
//! `&`, interactive for programs that need the terminal, streamed otherwise)
//! and runs it through the configured shell with the session environment.
//! A spawn failure caused by a vanished working directory is retried once
//! from the home directory.

use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::background;
use crate::classify::InteractivityClassifier;
use crate::env::SessionEnv;
use crate::interrupt::SigintGuard;
use crate::jobs::BackgroundJobRegistry;
use crate::stream::{self, COLOR_ENV};
use crate::style::warning_text;

/// Exit code for commands aborted before or during launch.
pub const ABORTED_EXIT_CODE: i32 = -1;
/// Exit code for streamed commands cancelled with Ctrl+C.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;
/// Appended to stderr when a streamed command is cancelled.
pub const INTERRUPT_MARKER: &str = "Command interrupted by user";
/// Stderr of an interactive command interrupted with Ctrl+C.
pub const INTERACTIVE_INTERRUPT_MESSAGE: &str = "Interactive command interrupted by user (Ctrl+C)";

/// Shell used for every command unless configured otherwise.
pub const DEFAULT_SHELL: &str = "/bin/bash";

/// Normalized outcome of running one command unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Output was already echoed to the terminal while the command ran.
    pub streamed: bool,
}

impl ExecutionResult {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        Self {
            exit_code: ABORTED_EXIT_CODE,
            stderr: message.into(),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// True when the user cancelled the command with Ctrl+C.
    pub fn was_interrupted(&self) -> bool {
        match self.exit_code {
            INTERRUPTED_EXIT_CODE => self.stderr.contains(INTERRUPT_MARKER),
            ABORTED_EXIT_CODE => self.stderr.contains("interrupted by user"),
            _ => false,
        }
    }
}

/// How a unit is attached to the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Inherits the terminal; output is not captured.
    Interactive,
    /// Output piped, echoed live and captured.
    Streamed,
    /// Detached, output redirected to files and followed by the job monitor.
    Background,
}

impl ExecutionMode {
    pub fn select(unit: &str, classifier: &InteractivityClassifier) -> Self {
        if unit.trim_end().ends_with('&') {
            ExecutionMode::Background
        } else if classifier.is_interactive(unit) {
            ExecutionMode::Interactive
        } else {
            ExecutionMode::Streamed
        }
    }
}

/// Runs one command unit. Implemented by [`ProcessRunner`]; the seam lets the
/// dispatcher be exercised without spawning processes.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, unit: &str) -> ExecutionResult;
}

/// Knobs for [`ProcessRunner`].
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    pub shell: PathBuf,
    pub classifier: InteractivityClassifier,
    /// Inject [`COLOR_ENV`] into streamed children.
    pub force_color: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            shell: PathBuf::from(DEFAULT_SHELL),
            classifier: InteractivityClassifier::default(),
            force_color: true,
        }
    }
}

/// Runs units through the configured shell in the mode they call for.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    options: RunnerOptions,
    env: SessionEnv,
    jobs: BackgroundJobRegistry,
}

impl ProcessRunner {
    pub fn new(options: RunnerOptions, env: SessionEnv, jobs: BackgroundJobRegistry) -> Self {
        Self { options, env, jobs }
    }

    pub fn jobs(&self) -> &BackgroundJobRegistry {
        &self.jobs
    }

    pub fn env(&self) -> &SessionEnv {
        &self.env
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    pub fn mode_for(&self, unit: &str) -> ExecutionMode {
        ExecutionMode::select(unit, &self.options.classifier)
    }

    fn shell_command(&self, unit: &str) -> Command {
        let mut command = Command::new(&self.options.shell);
        command.arg("-c").arg(unit);
        self.env.apply(&mut command);
        command
    }

    async fn run_interactive(&self, unit: &str) -> ExecutionResult {
        let guard = SigintGuard::install()
            .map_err(|err| warn!(error = %err, "could not install SIGINT guard"))
            .ok();

        let mut command = self.shell_command(unit);
        command
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let mut child = match spawn_recovering(|| command.spawn()) {
            Ok(child) => child,
            Err(err) => return ExecutionResult::aborted(format!("Failed to start command: {err}")),
        };
        let status = child.wait().await;

        if guard.as_ref().is_some_and(SigintGuard::interrupted) {
            return ExecutionResult::aborted(INTERACTIVE_INTERRUPT_MESSAGE);
        }
        match status {
            Ok(status) => ExecutionResult {
                exit_code: exit_code_of(status),
                ..ExecutionResult::default()
            },
            Err(err) => ExecutionResult::aborted(format!("Failed to wait for command: {err}")),
        }
    }

    async fn run_streamed(&self, unit: &str) -> ExecutionResult {
        let mut command = self.shell_command(unit);
        command
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if self.options.force_color {
            for (key, value) in COLOR_ENV {
                if !self.env.is_defined(key) {
                    command.env(key, value);
                }
            }
        }

        match spawn_recovering(|| command.spawn()) {
            Ok(child) => stream::stream_child(child).await,
            Err(err) => ExecutionResult::aborted(format!("Failed to start command: {err}")),
        }
    }

    async fn run_background(&self, unit: &str) -> ExecutionResult {
        match background::launch(&self.options.shell, unit, &self.env, &self.jobs).await {
            Ok(_) => ExecutionResult::success(""),
            Err(err) => {
                warn!(error = %err, "background launch failed");
                ExecutionResult::aborted(format!("Error running command in background: {err}"))
            }
        }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, unit: &str) -> ExecutionResult {
        let mode = self.mode_for(unit);
        debug!(?mode, unit, "running command");
        match mode {
            ExecutionMode::Interactive => self.run_interactive(unit).await,
            ExecutionMode::Streamed => self.run_streamed(unit).await,
            ExecutionMode::Background => self.run_background(unit).await,
        }
    }
}

/// Exit code, or `128 + n` for a child killed by signal `n`.
pub(crate) fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    ABORTED_EXIT_CODE
}

/// Spawn, recovering once from a working directory that no longer exists.
///
/// A missing cwd is detected up front as well as after a failed spawn; in both
/// cases the shell moves to the home directory with a warning.
pub(crate) fn spawn_recovering<T>(mut spawn: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    if std::env::current_dir().is_err() {
        recover_working_directory()?;
    }
    match spawn() {
        Err(err) if is_stale_cwd_error(&err) => {
            recover_working_directory()?;
            spawn()
        }
        other => other,
    }
}

fn is_stale_cwd_error(err: &io::Error) -> bool {
    if std::env::current_dir().is_err() {
        return true;
    }
    #[cfg(unix)]
    if err.raw_os_error() == Some(libc::ESTALE) {
        return true;
    }
    false
}

fn recover_working_directory() -> io::Result<()> {
    let home = dirs::home_dir()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "home directory not found"))?;
    std::env::set_current_dir(&home)?;
    warn!(home = %home.display(), "working directory vanished, moved to home");
    eprintln!(
        "{}",
        warning_text(&format!(
            "Warning: current directory no longer exists, changed to {}",
            home.display()
        ))
    );
    Ok(())
}
