//! Daemon lifecycle.
//!
//! Wires the pieces together in a fixed order: pid file, optional detach,
//! signal handlers, entropy pipe, release. The pid file guard is dropped
//! on every early return, so a failed run never leaves a record behind.
//! Before detaching, relative paths are anchored to the starting directory
//! because `daemon(3)` moves the process to `/`.

use crate::config::{Config, Overrides};
use crate::error::DaemonError;
use crate::guard::{self, GuardError, PidFile, DEFAULT_PID_FILE};
use crate::metrics::TransferMetrics;
use crate::pipe::{DeviceSink, DeviceSource, EntropyPipe, TransferSummary, DEFAULT_SINK_PATH};
use crate::shutdown::ShutdownFlag;
use std::fmt;
use std::path::{Path, PathBuf};

/// Process-level settings that are not part of the transfer configuration.
#[derive(Debug, Clone)]
pub struct DaemonOptions {
    /// Single-instance record.
    pub pid_file: PathBuf,
    /// Kernel entropy pool device.
    pub sink: PathBuf,
    /// Detach from the controlling terminal before the loop starts.
    pub daemonize: bool,
    /// Prometheus textfile rewritten after every cycle.
    pub metrics_file: Option<PathBuf>,
}

impl Default for DaemonOptions {
    fn default() -> Self {
        Self {
            pid_file: PathBuf::from(DEFAULT_PID_FILE),
            sink: PathBuf::from(DEFAULT_SINK_PATH),
            daemonize: false,
            metrics_file: None,
        }
    }
}

impl DaemonOptions {
    /// Resolves relative paths against `cwd`. Absolute paths are kept.
    pub fn anchored(&self, cwd: &Path) -> Self {
        Self {
            pid_file: cwd.join(&self.pid_file),
            sink: cwd.join(&self.sink),
            daemonize: self.daemonize,
            metrics_file: self.metrics_file.as_ref().map(|path| cwd.join(path)),
        }
    }
}

type DetachFn = fn(&mut PidFile) -> Result<(), GuardError>;

/// A configured, not yet started daemon.
pub struct Daemon {
    config: Config,
    options: DaemonOptions,
    shutdown: ShutdownFlag,
    detach: DetachFn,
}

impl fmt::Debug for Daemon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Daemon")
            .field("config", &self.config)
            .field("options", &self.options)
            .field("shutdown", &self.shutdown)
            .finish_non_exhaustive()
    }
}

impl Daemon {
    pub fn new(config: Config, options: DaemonOptions) -> Self {
        Self {
            config,
            options,
            shutdown: ShutdownFlag::new(),
            detach: guard::detach,
        }
    }

    /// Resolves the configuration first; nothing else is touched if that
    /// fails.
    pub fn from_overrides(
        overrides: &Overrides,
        options: DaemonOptions,
    ) -> Result<Self, DaemonError> {
        let config = Config::resolve(overrides)?;
        Ok(Self::new(config, options))
    }

    /// The resolved configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle that stops the loop at the next cycle boundary.
    pub fn shutdown_handle(&self) -> ShutdownFlag {
        self.shutdown.clone()
    }

    /// Runs until a termination signal or a fatal error.
    pub fn run(mut self) -> Result<TransferSummary, DaemonError> {
        if self.options.daemonize {
            let cwd = std::env::current_dir().map_err(GuardError::Detach)?;
            self.options = self.options.anchored(&cwd);
            self.config = self.config.anchored(&cwd);
        }

        let mut pid_file = PidFile::acquire(&self.options.pid_file)?;

        if self.options.daemonize {
            (self.detach)(&mut pid_file)?;
        }

        self.shutdown.install().map_err(DaemonError::Signals)?;

        tracing::info!(
            device = %self.config.device_path().display(),
            pid = pid_file.pid(),
            "trngd: entropy gathering daemon started"
        );

        let metrics = TransferMetrics::new()?;
        let mut pipe = EntropyPipe::from_config(
            &self.config,
            DeviceSource::new(self.config.device_path()),
            DeviceSink::new(&self.options.sink),
            self.shutdown.clone(),
        )
        .with_metrics(metrics, self.options.metrics_file.clone());

        let summary = pipe.run()?;
        pid_file.release()?;
        Ok(summary)
    }
}
