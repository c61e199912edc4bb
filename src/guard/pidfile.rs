//! Single-instance pid file.
//!
//! The file is opened and locked with `flock(LOCK_EX | LOCK_NB)` in one
//! step, so two daemons starting together cannot both win. A lock is only
//! kept if the locked file is still the one linked at the path; a record
//! unlinked by its previous owner in between is reopened. The lock lives
//! as long as the descriptor, which means a record whose owner died is
//! simply unlocked and can be taken over.

use super::GuardError;
use nix::errno::Errno;
use nix::fcntl::{flock, FlockArg};
use nix::unistd::getpid;
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::os::unix::fs::{MetadataExt, OpenOptionsExt};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the pid file.
pub const DEFAULT_PID_FILE: &str = "/var/run/trngd.pid";

/// Attempts made to read the holder's pid before giving up.
const HOLDER_READ_ATTEMPTS: u32 = 5;
/// Pause between attempts, giving a racing starter time to write its pid.
const HOLDER_READ_DELAY: Duration = Duration::from_millis(5);

/// Exclusive ownership of the daemon identity.
///
/// Removes its record when released or dropped.
#[derive(Debug)]
pub struct PidFile {
    file: File,
    path: PathBuf,
    pid: i32,
    released: bool,
}

impl PidFile {
    /// Claims the pid file at `path` and records the current pid in it.
    ///
    /// Fails with [`GuardError::AlreadyRunning`] if another live process
    /// holds the lock. In that case the existing record is left untouched.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, GuardError> {
        let path = path.into();
        let file = loop {
            if let Some(file) = lock_record(open_record(&path)?, &path)? {
                break file;
            }
            tracing::debug!(path = %path.display(), "Pid file replaced while locking, retrying");
        };

        let mut guard = Self {
            file,
            path,
            pid: 0,
            released: false,
        };
        guard.record_current_pid()?;
        tracing::debug!(path = %guard.path.display(), pid = guard.pid, "Acquired pid file");
        Ok(guard)
    }

    /// Rewrites the record with the current pid.
    ///
    /// Needed after daemonizing: the lock survives the fork but the pid
    /// changes.
    pub fn record_current_pid(&mut self) -> Result<(), GuardError> {
        let pid = getpid().as_raw();
        self.write_pid(pid)
            .map_err(|source| GuardError::io(&self.path, source))?;
        self.pid = pid;
        Ok(())
    }

    fn write_pid(&mut self, pid: i32) -> io::Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        writeln!(self.file, "{pid}")?;
        self.file.sync_all()
    }

    /// Pid currently recorded.
    pub fn pid(&self) -> i32 {
        self.pid
    }

    /// Location of the record.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the record and gives up ownership.
    pub fn release(mut self) -> Result<(), GuardError> {
        self.released = true;
        std::fs::remove_file(&self.path).map_err(|source| GuardError::io(&self.path, source))?;
        tracing::debug!(path = %self.path.display(), "Released pid file");
        Ok(())
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::error!(path = %self.path.display(), error = %e, "Failed to remove pid file");
        }
    }
}

fn open_record(path: &Path) -> Result<File, GuardError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .mode(0o600)
        .open(path)
        .map_err(|source| GuardError::io(path, source))
}

/// Locks an opened record.
///
/// Returns `None` if the lock was won on a file that is no longer linked at
/// `path` (its owner released it after we opened it). Dropping that file
/// gives the stale lock back.
fn lock_record(file: File, path: &Path) -> Result<Option<File>, GuardError> {
    match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
        Ok(()) => {}
        Err(e) if e == Errno::EWOULDBLOCK => {
            let pid = read_holder(path)?;
            return Err(GuardError::AlreadyRunning { pid });
        }
        Err(e) => return Err(GuardError::io(path, e.into())),
    }

    let held = file.metadata().map_err(|source| GuardError::io(path, source))?;
    match std::fs::metadata(path) {
        Ok(linked) if linked.dev() == held.dev() && linked.ino() == held.ino() => Ok(Some(file)),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(GuardError::io(path, source)),
    }
}

/// Reads the pid of the process holding the lock.
fn read_holder(path: &Path) -> Result<i32, GuardError> {
    for attempt in 1..=HOLDER_READ_ATTEMPTS {
        let text = std::fs::read_to_string(path).map_err(|source| GuardError::io(path, source))?;
        match text.trim().parse::<i32>() {
            Ok(pid) if pid > 0 => return Ok(pid),
            _ if attempt < HOLDER_READ_ATTEMPTS => std::thread::sleep(HOLDER_READ_DELAY),
            _ => {}
        }
    }
    Err(GuardError::io(
        path,
        io::Error::new(io::ErrorKind::InvalidData, "locked pid file holds no valid pid"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn own_pid() -> i32 {
        std::process::id() as i32
    }

    #[test]
    fn test_acquire_records_pid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trngd.pid");

        let guard = PidFile::acquire(&path).unwrap();
        assert_eq!(guard.pid(), own_pid());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), format!("{}\n", own_pid()));
    }

    #[test]
    fn test_second_acquire_reports_holder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trngd.pid");

        let _held = PidFile::acquire(&path).unwrap();
        let result = PidFile::acquire(&path);
        assert!(matches!(
            result,
            Err(GuardError::AlreadyRunning { pid }) if pid == own_pid()
        ));

        // The losing attempt must leave the record alone.
        assert_eq!(std::fs::read_to_string(&path).unwrap(), format!("{}\n", own_pid()));
    }

    #[test]
    fn test_lock_on_unlinked_record_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trngd.pid");

        // A late starter opens the record just before the owner releases it.
        let owner = PidFile::acquire(&path).unwrap();
        let late = open_record(&path).unwrap();
        owner.release().unwrap();

        // Its lock lands on the unlinked file and must not count.
        assert!(lock_record(late, &path).unwrap().is_none());

        // The identity still has exactly one owner.
        let next = PidFile::acquire(&path).unwrap();
        assert!(matches!(
            PidFile::acquire(&path),
            Err(GuardError::AlreadyRunning { pid }) if pid == next.pid()
        ));
    }

    #[test]
    fn test_lock_on_replaced_record_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trngd.pid");

        let stale = open_record(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        std::fs::write(&path, "").unwrap();

        assert!(lock_record(stale, &path).unwrap().is_none());
        assert!(PidFile::acquire(&path).is_ok());
    }

    #[test]
    fn test_release_removes_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trngd.pid");

        PidFile::acquire(&path).unwrap().release().unwrap();
        assert!(!path.exists());

        // Identity is free again.
        let again = PidFile::acquire(&path).unwrap();
        drop(again);
        assert!(!path.exists());
    }

    #[test]
    fn test_stale_record_taken_over() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trngd.pid");
        std::fs::write(&path, "999999\n").unwrap();

        let guard = PidFile::acquire(&path).unwrap();
        assert_eq!(guard.pid(), own_pid());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), format!("{}\n", own_pid()));
    }

    #[test]
    fn test_rerecord_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trngd.pid");
        std::fs::write(&path, "1234567890123\n").unwrap();

        let mut guard = PidFile::acquire(&path).unwrap();
        guard.record_current_pid().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), format!("{}\n", own_pid()));
    }

    #[test]
    fn test_unwritable_location_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = PidFile::acquire(dir.path().join("missing").join("trngd.pid"));
        assert!(matches!(result, Err(GuardError::Io { .. })));
    }

    #[test]
    fn test_release_reports_missing_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trngd.pid");

        let guard = PidFile::acquire(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(guard.release(), Err(GuardError::Io { .. })));
    }
}
