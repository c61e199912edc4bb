//! Top-level error type and process exit codes.

use crate::config::ConfigError;
use crate::guard::GuardError;
use crate::metrics::MetricsError;
use crate::pipe::DeviceError;
use thiserror::Error;

/// Exit codes, following BSD `sysexits.h`.
pub mod exit {
    /// Clean shutdown.
    pub const OK: u8 = 0;
    /// Malformed command line.
    pub const USAGE: u8 = 64;
    /// Internal error.
    pub const SOFTWARE: u8 = 70;
    /// Operating system error (fork, signal setup).
    pub const OSERR: u8 = 71;
    /// Another instance holds the pid file.
    pub const OSFILE: u8 = 72;
    /// Pid file could not be created, written or removed.
    pub const CANTCREAT: u8 = 73;
    /// Device open, lock, read or write failure.
    pub const IOERR: u8 = 74;
    /// Invalid configuration.
    pub const CONFIG: u8 = 78;
}

/// Any error that stops the daemon.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Guard(#[from] GuardError),
    #[error("cannot install signal handlers: {0}")]
    Signals(#[source] std::io::Error),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("metrics setup failed: {0}")]
    Metrics(#[from] MetricsError),
}

impl DaemonError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => exit::CONFIG,
            Self::Guard(GuardError::AlreadyRunning { .. }) => exit::OSFILE,
            Self::Guard(GuardError::Io { .. }) => exit::CANTCREAT,
            Self::Guard(GuardError::Detach(_)) => exit::OSERR,
            Self::Signals(_) => exit::OSERR,
            Self::Device(_) => exit::IOERR,
            Self::Metrics(_) => exit::SOFTWARE,
        }
    }
}
