//! Source and sink endpoints.
//!
//! The pipe talks to its endpoints through [`EntropySource`] and
//! [`EntropySink`] so tests can swap the character devices for mocks.
//! The device implementations open a fresh descriptor on every call and
//! hold an exclusive advisory lock only for the span of the transfer.

use nix::fcntl::{flock, FlockArg};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default kernel entropy pool device.
pub const DEFAULT_SINK_PATH: &str = "/dev/random";

/// Errors raised while moving bytes between devices.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("unable to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unable to lock {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("error reading from {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("short read from {}: got {got} of {expected} bytes", path.display())]
    ShortRead {
        path: PathBuf,
        got: usize,
        expected: usize,
    },
    #[error("unable to write to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("short write to {}: wrote {got} of {expected} bytes", path.display())]
    ShortWrite {
        path: PathBuf,
        got: usize,
        expected: usize,
    },
}

/// Something that fills a buffer with entropy.
pub trait EntropySource {
    /// Fills all of `buf`, or fails. A partial fill is an error.
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), DeviceError>;

    /// Human-readable name used in log lines.
    fn describe(&self) -> String;
}

/// Something that accepts entropy.
pub trait EntropySink {
    /// Consumes all of `buf`, or fails. A partial write is an error.
    fn feed(&mut self, buf: &[u8]) -> Result<(), DeviceError>;

    /// Human-readable name used in log lines.
    fn describe(&self) -> String;
}

/// Exclusive `flock` held until dropped.
struct ExclusiveLock<'a> {
    file: &'a File,
}

impl<'a> ExclusiveLock<'a> {
    fn acquire(file: &'a File) -> io::Result<Self> {
        flock(file.as_raw_fd(), FlockArg::LockExclusive)?;
        Ok(Self { file })
    }
}

impl Drop for ExclusiveLock<'_> {
    fn drop(&mut self) {
        if let Err(e) = flock(self.file.as_raw_fd(), FlockArg::Unlock) {
            tracing::debug!(error = %e, "Failed to release device lock");
        }
    }
}

/// Issues one syscall-level transfer, retrying only when interrupted.
fn retry_interrupted<T>(mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    loop {
        match op() {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

/// TRNG character device.
#[derive(Debug, Clone)]
pub struct DeviceSource {
    path: PathBuf,
}

impl DeviceSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EntropySource for DeviceSource {
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), DeviceError> {
        let file = File::open(&self.path).map_err(|source| DeviceError::Open {
            path: self.path.clone(),
            source,
        })?;
        let lock = ExclusiveLock::acquire(&file).map_err(|source| DeviceError::Lock {
            path: self.path.clone(),
            source,
        })?;

        let got = retry_interrupted(|| (&file).read(buf)).map_err(|source| DeviceError::Read {
            path: self.path.clone(),
            source,
        })?;
        drop(lock);

        if got != buf.len() {
            return Err(DeviceError::ShortRead {
                path: self.path.clone(),
                got,
                expected: buf.len(),
            });
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Kernel entropy pool device.
#[derive(Debug, Clone)]
pub struct DeviceSink {
    path: PathBuf,
}

impl DeviceSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for DeviceSink {
    fn default() -> Self {
        Self::new(DEFAULT_SINK_PATH)
    }
}

impl EntropySink for DeviceSink {
    fn feed(&mut self, buf: &[u8]) -> Result<(), DeviceError> {
        let file = OpenOptions::new()
            .write(true)
            .open(&self.path)
            .map_err(|source| DeviceError::Open {
                path: self.path.clone(),
                source,
            })?;
        let lock = ExclusiveLock::acquire(&file).map_err(|source| DeviceError::Lock {
            path: self.path.clone(),
            source,
        })?;

        let got = retry_interrupted(|| (&file).write(buf)).map_err(|source| DeviceError::Write {
            path: self.path.clone(),
            source,
        })?;
        drop(lock);

        if got != buf.len() {
            return Err(DeviceError::ShortWrite {
                path: self.path.clone(),
                got,
                expected: buf.len(),
            });
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
