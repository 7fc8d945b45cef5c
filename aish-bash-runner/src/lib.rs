//! Command execution engine for the aish shell.
//!
//! A command unit (one already-split piece of a command line) runs through
//! `/bin/bash -c` in one of three modes chosen by [`ExecutionMode::select`]:
//! interactive programs inherit the terminal, background units (`cmd &`) are
//! detached and followed by the [`BackgroundJobRegistry`] monitor, and
//! everything else is streamed live while its output is captured.

pub mod background;
pub mod classify;
pub mod env;
pub mod executor;
pub mod interrupt;
pub mod jobs;
pub mod process_group;
pub mod stream;
pub mod style;

pub use background::{BackgroundLaunchError, Launched};
pub use classify::{DEFAULT_INTERACTIVE_LIST, InteractivityClassifier};
pub use env::SessionEnv;
pub use executor::{
    ABORTED_EXIT_CODE, CommandRunner, DEFAULT_SHELL, ExecutionMode, ExecutionResult,
    INTERACTIVE_INTERRUPT_MESSAGE, INTERRUPT_MARKER, INTERRUPTED_EXIT_CODE, ProcessRunner,
    RunnerOptions,
};
pub use interrupt::SigintGuard;
pub use jobs::{
    BackgroundJob, BackgroundJobRegistry, DEFAULT_MONITOR_INTERVAL, ForegroundReport, JobNotice,
    OutputStream, ProcessProbe, SystemProbe,
};
pub use process_group::{GracefulTerminationResult, ProcessState};
