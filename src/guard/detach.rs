//! Detaching from the controlling terminal.

use super::{GuardError, PidFile};

/// Forks into the background with `daemon(3)`.
///
/// The parent exits inside this call without running destructors, so the
/// pid file lock passes to the child. The child changes directory to `/`,
/// points stdio at `/dev/null` and rewrites the record with its own pid.
pub fn detach(pid_file: &mut PidFile) -> Result<(), GuardError> {
    nix::unistd::daemon(false, false).map_err(|e| GuardError::Detach(e.into()))?;
    pid_file.record_current_pid()?;
    tracing::debug!(pid = pid_file.pid(), "Detached from controlling terminal");
    Ok(())
}
