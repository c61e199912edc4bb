//! End-to-end daemon runs against regular files standing in for devices.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use trngd::error::exit;
use trngd::{Config, Daemon, DaemonError, DaemonOptions, GuardError, PidFile};

struct Fixture {
    _dir: tempfile::TempDir,
    source: PathBuf,
    sink: PathBuf,
    pid_file: PathBuf,
    metrics_file: PathBuf,
}

impl Fixture {
    fn new(source_bytes: &[u8]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("trng0");
        let sink = dir.path().join("random");
        std::fs::write(&source, source_bytes).unwrap();
        std::fs::write(&sink, b"").unwrap();
        Self {
            source,
            sink,
            pid_file: dir.path().join("trngd.pid"),
            metrics_file: dir.path().join("trngd.prom"),
            _dir: dir,
        }
    }

    fn daemon(&self, bytes: u32) -> Daemon {
        let config = Config::new(&self.source, bytes, 0).unwrap();
        Daemon::new(
            config,
            DaemonOptions {
                pid_file: self.pid_file.clone(),
                sink: self.sink.clone(),
                daemonize: false,
                metrics_file: Some(self.metrics_file.clone()),
            },
        )
    }
}

fn wait_for(path: &Path, min_len: u64) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if std::fs::metadata(path).map(|m| m.len() >= min_len).unwrap_or(false) {
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
    panic!("{} never reached {} bytes", path.display(), min_len);
}

#[test]
fn test_runs_until_shutdown_and_cleans_up() {
    let source_bytes: Vec<u8> = (1u8..=64).collect();
    let fixture = Fixture::new(&source_bytes);
    let daemon = fixture.daemon(16);
    let shutdown = daemon.shutdown_handle();

    let sink = fixture.sink.clone();
    let stopper = thread::spawn(move || {
        wait_for(&sink, 16);
        shutdown.request(signal_hook::consts::SIGTERM);
    });

    let summary = daemon.run().unwrap();
    stopper.join().unwrap();

    assert!(summary.cycles >= 1);
    assert_eq!(summary.bytes, summary.cycles * 16);
    assert_eq!(summary.signal, Some(signal_hook::consts::SIGTERM));
    assert_eq!(std::fs::read(&fixture.sink).unwrap(), source_bytes[..16].to_vec());
    assert!(!fixture.pid_file.exists());

    let metrics = std::fs::read_to_string(&fixture.metrics_file).unwrap();
    assert!(metrics.contains("trngd_transfer_size_bytes 16"));
}

#[test]
fn test_second_instance_rejected() {
    let fixture = Fixture::new(&[0x5A; 64]);
    let holder = PidFile::acquire(&fixture.pid_file).unwrap();

    let err = fixture.daemon(16).run().unwrap_err();
    assert!(matches!(
        err,
        DaemonError::Guard(GuardError::AlreadyRunning { pid }) if pid == holder.pid()
    ));
    assert_eq!(err.exit_code(), exit::OSFILE);

    // The running instance's record is intact and no transfer happened.
    assert_eq!(
        std::fs::read_to_string(&fixture.pid_file).unwrap(),
        format!("{}\n", holder.pid())
    );
    assert!(std::fs::read(&fixture.sink).unwrap().is_empty());
}

#[test]
fn test_shutdown_before_start_moves_nothing() {
    let fixture = Fixture::new(&[0x11; 64]);
    let daemon = fixture.daemon(32);
    daemon.shutdown_handle().request(signal_hook::consts::SIGINT);

    let summary = daemon.run().unwrap();
    assert_eq!(summary.cycles, 0);
    assert!(std::fs::read(&fixture.sink).unwrap().is_empty());
    assert!(!fixture.pid_file.exists());
}

#[test]
fn test_short_source_is_fatal() {
    let fixture = Fixture::new(&[0x22; 4]);

    let err = fixture.daemon(16).run().unwrap_err();
    assert_eq!(err.exit_code(), exit::IOERR);
    assert!(err.to_string().contains("short read"));
    assert!(std::fs::read(&fixture.sink).unwrap().is_empty());
    assert!(!fixture.pid_file.exists());
}

#[test]
fn test_stale_pid_file_does_not_block_restart() {
    let fixture = Fixture::new(&[0x33; 64]);
    std::fs::write(&fixture.pid_file, "999999\n").unwrap();

    let daemon = fixture.daemon(8);
    daemon.shutdown_handle().request(signal_hook::consts::SIGTERM);
    daemon.run().unwrap();
    assert!(!fixture.pid_file.exists());
}
