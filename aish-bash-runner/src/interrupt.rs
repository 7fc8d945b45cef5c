//! Scoped SIGINT handling.
//!
//! A [`SigintGuard`] replaces the process SIGINT disposition with a handler
//! that only records the interrupt, and restores the previous disposition
//! when dropped. Guards nest: an inner guard restores the outer guard's
//! handler. The recorded flag is process-wide.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
extern "C" fn record_sigint(_signal: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// True if SIGINT arrived since the last [`clear_interrupt`].
pub fn interrupt_requested() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Reset the interrupt flag, returning its previous value.
pub fn clear_interrupt() -> bool {
    INTERRUPTED.swap(false, Ordering::SeqCst)
}

/// RAII guard that catches SIGINT for its lifetime.
#[must_use = "the previous SIGINT handler is restored when the guard drops"]
pub struct SigintGuard {
    #[cfg(unix)]
    previous: Option<nix::sys::signal::SigAction>,
}

impl SigintGuard {
    /// Install the recording handler and clear any stale interrupt.
    #[cfg(unix)]
    pub fn install() -> io::Result<Self> {
        use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

        clear_interrupt();
        let action = SigAction::new(
            SigHandler::Handler(record_sigint),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );
        // SAFETY: the handler only stores to an atomic, which is async-signal-safe.
        let previous = unsafe { sigaction(Signal::SIGINT, &action) }.map_err(io::Error::from)?;
        tracing::trace!("SIGINT guard installed");
        Ok(Self {
            previous: Some(previous),
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> io::Result<Self> {
        clear_interrupt();
        Ok(Self {})
    }

    /// True if SIGINT arrived while this guard (or a nested one) was active.
    pub fn interrupted(&self) -> bool {
        interrupt_requested()
    }
}

impl Drop for SigintGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(previous) = self.previous.take() {
            use nix::sys::signal::{Signal, sigaction};
            // SAFETY: restoring a disposition previously returned by sigaction.
            if let Err(err) = unsafe { sigaction(Signal::SIGINT, &previous) } {
                tracing::warn!(error = %err, "failed to restore SIGINT handler");
            }
        }
    }
}
