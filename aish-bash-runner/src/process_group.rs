//! Process-group and liveness helpers for spawned commands.
//!
//! This module centralizes the OS-specific pieces the runner needs:
//! - `detach_from_tty` starts a new session so background jobs do not inherit
//!   the controlling TTY (and therefore never see the shell's `SIGINT`).
//! - `signal_process` targets a single PID, used for streamed children that
//!   share the shell's process group.
//! - `kill_process_group_by_pid` targets the whole group of a detached job.
//! - `process_state` reports whether a PID is running, a zombie, or gone.
//! - `terminate_process_group` sends SIGTERM, waits for a grace period, then
//!   SIGKILL if the group leader is still running.
//!
//! On non-Unix platforms these helpers are no-ops.

use std::io;
use std::time::{Duration, Instant};

/// Default grace period between SIGTERM and SIGKILL (milliseconds).
pub const DEFAULT_GRACEFUL_TIMEOUT_MS: u64 = 500;

/// Signal to send when terminating processes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KillSignal {
    /// SIGTERM - allows graceful shutdown
    #[default]
    Term,
    /// SIGKILL - immediate termination
    Kill,
}

#[cfg(unix)]
impl KillSignal {
    fn as_libc_signal(self) -> libc::c_int {
        match self {
            KillSignal::Term => libc::SIGTERM,
            KillSignal::Kill => libc::SIGKILL,
        }
    }
}

/// Observed state of a process looked up by PID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    /// Exited but not yet reaped by its parent.
    Zombie,
    /// No such process (or the lookup failed).
    Gone,
}

impl ProcessState {
    /// Zombie and vanished processes both count as finished.
    pub fn is_terminal(self) -> bool {
        !matches!(self, ProcessState::Running)
    }
}

/// Detach from the controlling TTY by starting a new session.
///
/// Intended for `pre_exec`. Falls back to `setpgid` when the caller is
/// already a session leader.
#[cfg(unix)]
pub fn detach_from_tty() -> io::Result<()> {
    let result = unsafe { libc::setsid() };
    if result == -1 {
        let err = io::Error::last_os_error();
        // EPERM means we're already a session leader, fall back to setpgid
        if err.raw_os_error() == Some(libc::EPERM) {
            return set_process_group();
        }
        return Err(err);
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn detach_from_tty() -> io::Result<()> {
    Ok(())
}

/// Put the calling process into its own process group.
#[cfg(unix)]
pub fn set_process_group() -> io::Result<()> {
    let result = unsafe { libc::setpgid(0, 0) };
    if result == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

#[cfg(not(unix))]
pub fn set_process_group() -> io::Result<()> {
    Ok(())
}

/// Send `signal` to a single PID. A missing process is not an error.
#[cfg(unix)]
pub fn signal_process(pid: u32, signal: KillSignal) -> io::Result<()> {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"));
    };
    if unsafe { libc::kill(pid, signal.as_libc_signal()) } == -1 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            return Err(err);
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn signal_process(_pid: u32, _signal: KillSignal) -> io::Result<()> {
    Ok(())
}

/// Signal the process group that `pid` belongs to (best-effort).
#[cfg(unix)]
pub fn kill_process_group_by_pid(pid: u32, signal: KillSignal) -> io::Result<()> {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"));
    };
    let pgid = unsafe { libc::getpgid(pid) };
    if pgid == -1 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            return Ok(());
        }
        return Err(err);
    }

    if unsafe { libc::killpg(pgid, signal.as_libc_signal()) } == -1 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            return Err(err);
        }
    }

    Ok(())
}

#[cfg(not(unix))]
pub fn kill_process_group_by_pid(_pid: u32, _signal: KillSignal) -> io::Result<()> {
    Ok(())
}

/// Look up the state of `pid`.
///
/// On Linux the state letter in `/proc/<pid>/stat` distinguishes zombies
/// (`Z`) and dead tasks (`X`) from live ones. Elsewhere a zero signal probe
/// is used, which cannot tell zombies apart.
#[cfg(unix)]
pub fn process_state(pid: u32) -> ProcessState {
    #[cfg(target_os = "linux")]
    {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => return parse_proc_stat_state(&stat),
            Err(err) if err.kind() == io::ErrorKind::NotFound => return ProcessState::Gone,
            Err(_) => {}
        }
    }

    let Ok(raw_pid) = libc::pid_t::try_from(pid) else {
        return ProcessState::Gone;
    };
    if unsafe { libc::kill(raw_pid, 0) } == 0 {
        return ProcessState::Running;
    }
    // EPERM = exists but owned by someone else
    if io::Error::last_os_error().raw_os_error() == Some(libc::EPERM) {
        ProcessState::Running
    } else {
        ProcessState::Gone
    }
}

#[cfg(not(unix))]
pub fn process_state(_pid: u32) -> ProcessState {
    ProcessState::Gone
}

#[cfg(target_os = "linux")]
fn parse_proc_stat_state(stat: &str) -> ProcessState {
    // Format is `pid (comm) S ...`; comm may itself contain parentheses.
    let state = stat
        .rfind(')')
        .and_then(|idx| stat.get(idx + 1..))
        .and_then(|rest| rest.trim_start().chars().next());
    match state {
        Some('Z' | 'X' | 'x') => ProcessState::Zombie,
        Some(_) => ProcessState::Running,
        None => ProcessState::Gone,
    }
}

/// True if `pid` refers to a live (non-zombie) process.
pub fn is_process_running(pid: u32) -> bool {
    process_state(pid) == ProcessState::Running
}

/// Result of a graceful termination attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GracefulTerminationResult {
    /// Process exited after the initial signal.
    GracefulExit,
    /// Process had to be forcefully killed with SIGKILL.
    ForcefulKill,
    /// Process was already not running.
    AlreadyExited,
    /// Failed to signal the process.
    Error,
}

/// Gracefully terminate the process group of a detached job.
///
/// Sends SIGTERM to the group, polls the leader for up to `grace_period`,
/// then sends SIGKILL. Blocks the calling thread while polling.
pub fn terminate_process_group(pid: u32, grace_period: Duration) -> GracefulTerminationResult {
    if !is_process_running(pid) {
        return GracefulTerminationResult::AlreadyExited;
    }

    if kill_process_group_by_pid(pid, KillSignal::Term).is_err() {
        return GracefulTerminationResult::Error;
    }

    let deadline = Instant::now() + grace_period;
    let poll_interval = Duration::from_millis(10);
    while Instant::now() < deadline {
        if !is_process_running(pid) {
            return GracefulTerminationResult::GracefulExit;
        }
        std::thread::sleep(poll_interval);
    }

    match kill_process_group_by_pid(pid, KillSignal::Kill) {
        Ok(()) => GracefulTerminationResult::ForcefulKill,
        Err(_) => GracefulTerminationResult::Error,
    }
}

/// Terminate with the default grace period.
pub fn terminate_process_group_default(pid: u32) -> GracefulTerminationResult {
    terminate_process_group(pid, Duration::from_millis(DEFAULT_GRACEFUL_TIMEOUT_MS))
}
