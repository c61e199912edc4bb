//! Process exclusivity and daemonization.
//!
//! At most one daemon runs per pid file. The guard is acquired once after
//! configuration succeeds and released on every exit path.

mod detach;
mod pidfile;

pub use detach::detach;
pub use pidfile::{PidFile, DEFAULT_PID_FILE};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Process guard errors.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("daemon already running, pid: {pid}")]
    AlreadyRunning { pid: i32 },
    #[error("pid file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot daemonize: {0}")]
    Detach(#[source] std::io::Error),
}

impl GuardError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
