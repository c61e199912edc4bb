//! Log output setup.
//!
//! Events go through `tracing`. In the foreground they are formatted to
//! stderr; once detached they are sent to the local syslog socket, one
//! datagram per event, with the `daemon` facility.

use std::io::{self, Write};
use std::os::unix::net::UnixDatagram;
use std::path::Path;
use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;

/// Local syslog socket.
pub const SYSLOG_SOCKET: &str = "/dev/log";

/// Tag prefixed to every syslog line.
pub const SYSLOG_IDENT: &str = "trngd";

const FACILITY_DAEMON: u8 = 3;

/// Where log events are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    Syslog,
}

/// Installs the global subscriber.
///
/// `RUST_LOG` is honoured; the default level is `info`. If the syslog
/// socket cannot be reached the subscriber falls back to stderr.
pub fn init(target: LogTarget) {
    let filter = || {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    if target == LogTarget::Syslog {
        match Syslog::connect(SYSLOG_IDENT) {
            Ok(syslog) => {
                tracing_subscriber::fmt()
                    .with_env_filter(filter())
                    .with_writer(syslog)
                    .with_ansi(false)
                    .with_level(false)
                    .with_target(false)
                    .without_time()
                    .init();
                return;
            }
            Err(e) => {
                tracing_subscriber::fmt()
                    .with_env_filter(filter())
                    .with_writer(io::stderr)
                    .init();
                tracing::warn!(error = %e, "System log unavailable, logging to stderr");
                return;
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(io::stderr)
        .init();
}

/// Syslog severities used by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error = 3,
    Warning = 4,
    Notice = 5,
    Debug = 7,
}

impl Severity {
    /// Lifecycle events are logged at INFO and reported as notices.
    pub fn from_level(level: &Level) -> Self {
        match *level {
            Level::ERROR => Self::Error,
            Level::WARN => Self::Warning,
            Level::INFO => Self::Notice,
            _ => Self::Debug,
        }
    }

    /// `<PRI>` value for the daemon facility.
    pub fn priority(self) -> u8 {
        FACILITY_DAEMON * 8 + self as u8
    }
}

/// Connection to the local syslog daemon.
#[derive(Debug)]
pub struct Syslog {
    socket: UnixDatagram,
    ident: String,
}

impl Syslog {
    /// Connects to [`SYSLOG_SOCKET`].
    pub fn connect(ident: &str) -> io::Result<Self> {
        Self::connect_to(Path::new(SYSLOG_SOCKET), ident)
    }

    /// Connects to a syslog socket at `path`.
    pub fn connect_to(path: &Path, ident: &str) -> io::Result<Self> {
        let socket = UnixDatagram::unbound()?;
        socket.connect(path)?;
        Ok(Self {
            socket,
            ident: ident.to_owned(),
        })
    }

    /// Starts a message that is sent when the returned writer is dropped.
    pub fn event(&self, severity: Severity) -> SyslogEvent<'_> {
        SyslogEvent {
            syslog: self,
            severity,
            buf: Vec::with_capacity(256),
        }
    }

    fn send(&self, severity: Severity, msg: &[u8]) {
        let msg = msg.strip_suffix(b"\n").unwrap_or(msg);
        if msg.is_empty() {
            return;
        }
        // The pid is read per message because it changes when detaching.
        let mut line = format!(
            "<{}>{}[{}]: ",
            severity.priority(),
            self.ident,
            std::process::id()
        )
        .into_bytes();
        line.extend_from_slice(msg);
        // Nowhere left to report a failure to log.
        let _ = self.socket.send(&line);
    }
}

impl<'a> MakeWriter<'a> for Syslog {
    type Writer = SyslogEvent<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        self.event(Severity::Notice)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        self.event(Severity::from_level(meta.level()))
    }
}

/// One pending syslog message.
pub struct SyslogEvent<'a> {
    syslog: &'a Syslog,
    severity: Severity,
    buf: Vec<u8>,
}

impl Write for SyslogEvent<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for SyslogEvent<'_> {
    fn drop(&mut self) {
        self.syslog.send(self.severity, &self.buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listener() -> (tempfile::TempDir, UnixDatagram, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log");
        let server = UnixDatagram::bind(&path).unwrap();
        (dir, server, path)
    }

    fn receive(server: &UnixDatagram) -> String {
        let mut buf = [0u8; 1024];
        let n = server.recv(&mut buf).unwrap();
        String::from_utf8_lossy(&buf[..n]).into_owned()
    }

    #[test]
    fn test_severity_mapping() {
        assert_eq!(Severity::from_level(&Level::ERROR), Severity::Error);
        assert_eq!(Severity::from_level(&Level::INFO), Severity::Notice);
        assert_eq!(Severity::from_level(&Level::TRACE), Severity::Debug);
        assert_eq!(Severity::Error.priority(), 27);
        assert_eq!(Severity::Notice.priority(), 29);
    }

    #[test]
    fn test_event_sent_on_drop() {
        let (_dir, server, path) = listener();
        let syslog = Syslog::connect_to(&path, "trngd").unwrap();

        let mut event = syslog.event(Severity::Error);
        event.write_all(b"device gone\n").unwrap();
        drop(event);

        let expected = format!("<27>trngd[{}]: device gone", std::process::id());
        assert_eq!(receive(&server), expected);
    }

    #[test]
    fn test_make_writer_defaults_to_notice() {
        let (_dir, server, path) = listener();
        let syslog = Syslog::connect_to(&path, "trngd").unwrap();

        let mut writer = syslog.make_writer();
        writer.write_all(b"started").unwrap();
        drop(writer);

        assert!(receive(&server).starts_with("<29>trngd["));
    }

    #[test]
    fn test_connect_without_socket_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Syslog::connect_to(&dir.path().join("log"), "trngd").is_err());
    }
}
