//! Cooperative shutdown flag.
//!
//! A termination signal only records its number in a shared atomic. The
//! entropy pipe looks at the flag between cycles; an in-flight read, write
//! or sleep is never interrupted.

use signal_hook::consts::{SIGINT, SIGTERM};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

/// Signals that request a graceful stop.
pub const TERMINATION_SIGNALS: [i32; 2] = [SIGTERM, SIGINT];

/// Shared "shutdown requested" flag.
///
/// Holds `0` until a stop is requested, then the number of the first
/// signal received. It is never cleared.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    signal: Arc<AtomicI32>,
}

impl ShutdownFlag {
    /// Creates a flag with no shutdown requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers handlers for [`TERMINATION_SIGNALS`].
    pub fn install(&self) -> std::io::Result<()> {
        self.install_for(&TERMINATION_SIGNALS)
    }

    /// Registers handlers for `signals`.
    ///
    /// Each handler performs a single compare-and-swap and returns.
    #[allow(unsafe_code)]
    pub fn install_for(&self, signals: &[i32]) -> std::io::Result<()> {
        for &signo in signals {
            let signal = Arc::clone(&self.signal);
            // SAFETY: the action only touches an atomic that the Arc keeps
            // alive; it does not allocate, lock or perform I/O.
            unsafe {
                signal_hook::low_level::register(signo, move || {
                    let _ = signal.compare_exchange(0, signo, Ordering::SeqCst, Ordering::SeqCst);
                })?;
            }
        }
        tracing::debug!(?signals, "Installed shutdown handlers");
        Ok(())
    }

    /// Requests shutdown as if `signo` had been delivered. Only the first
    /// request is kept.
    pub fn request(&self, signo: i32) {
        let _ = self
            .signal
            .compare_exchange(0, signo, Ordering::SeqCst, Ordering::SeqCst);
    }

    /// Returns the recorded signal number once shutdown has been requested.
    pub fn requested(&self) -> Option<i32> {
        match self.signal.load(Ordering::SeqCst) {
            0 => None,
            signo => Some(signo),
        }
    }

    /// Returns true once shutdown has been requested.
    #[inline]
    pub fn is_requested(&self) -> bool {
        self.requested().is_some()
    }
}
