//! In-memory endpoints for exercising the pipe without hardware.

use super::device::{DeviceError, EntropySink, EntropySource};
use crate::shutdown::ShutdownFlag;
use rand_chacha::ChaCha20Rng;
use rand_core::{RngCore, SeedableRng};
use std::io;
use std::path::PathBuf;

const MOCK_SOURCE_NAME: &str = "mock-trng";
const MOCK_SINK_NAME: &str = "mock-pool";

/// Deterministic stand-in for a TRNG.
///
/// Output is a ChaCha20 stream, which is NOT entropy; it only gives tests
/// reproducible, non-zero bytes.
#[derive(Debug)]
pub struct MockSource {
    rng: ChaCha20Rng,
    short_read: Option<usize>,
    fail_on: Option<u64>,
    stop_on: Option<(u64, ShutdownFlag)>,
    fills: u64,
    dirty_fills: u64,
}

impl MockSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            short_read: None,
            fail_on: None,
            stop_on: None,
            fills: 0,
            dirty_fills: 0,
        }
    }

    /// Delivers at most `limit` bytes per fill.
    pub fn with_short_read(mut self, limit: usize) -> Self {
        self.short_read = Some(limit);
        self
    }

    /// Fails the `n`th fill (1-based) with an I/O error.
    pub fn failing_on(mut self, n: u64) -> Self {
        self.fail_on = Some(n);
        self
    }

    /// Requests shutdown while serving the `n`th fill (1-based).
    pub fn stopping_on(mut self, n: u64, flag: ShutdownFlag) -> Self {
        self.stop_on = Some((n, flag));
        self
    }

    /// Number of fills attempted.
    pub fn fills(&self) -> u64 {
        self.fills
    }

    /// Number of fills that were handed a buffer that was not all-zero.
    pub fn dirty_fills(&self) -> u64 {
        self.dirty_fills
    }
}

impl EntropySource for MockSource {
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), DeviceError> {
        self.fills += 1;
        if buf.iter().any(|&b| b != 0) {
            self.dirty_fills += 1;
        }
        if let Some((n, flag)) = &self.stop_on {
            if *n == self.fills {
                flag.request(signal_hook::consts::SIGTERM);
            }
        }
        if self.fail_on == Some(self.fills) {
            return Err(DeviceError::Read {
                path: PathBuf::from(MOCK_SOURCE_NAME),
                source: io::Error::new(io::ErrorKind::Other, "simulated device failure"),
            });
        }

        let got = self.short_read.map_or(buf.len(), |limit| limit.min(buf.len()));
        self.rng.fill_bytes(&mut buf[..got]);
        if got != buf.len() {
            return Err(DeviceError::ShortRead {
                path: PathBuf::from(MOCK_SOURCE_NAME),
                got,
                expected: buf.len(),
            });
        }
        Ok(())
    }

    fn describe(&self) -> String {
        MOCK_SOURCE_NAME.to_string()
    }
}

/// Sink that keeps every write for later inspection.
#[derive(Debug, Default)]
pub struct MockSink {
    writes: Vec<Vec<u8>>,
    fail: bool,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every write fail.
    pub fn failing() -> Self {
        Self {
            writes: Vec::new(),
            fail: true,
        }
    }

    /// Writes received so far, in order.
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    /// Total bytes received.
    pub fn total_bytes(&self) -> usize {
        self.writes.iter().map(Vec::len).sum()
    }
}

impl EntropySink for MockSink {
    fn feed(&mut self, buf: &[u8]) -> Result<(), DeviceError> {
        if self.fail {
            return Err(DeviceError::Write {
                path: PathBuf::from(MOCK_SINK_NAME),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "simulated write failure"),
            });
        }
        self.writes.push(buf.to_vec());
        Ok(())
    }

    fn describe(&self) -> String {
        MOCK_SINK_NAME.to_string()
    }
}
