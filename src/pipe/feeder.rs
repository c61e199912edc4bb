//! The read/write/wipe/sleep loop.

use super::buffer::TransferBuffer;
use super::device::{DeviceError, DeviceSink, DeviceSource, EntropySink, EntropySource};
use crate::config::Config;
use crate::metrics::TransferMetrics;
use crate::shutdown::ShutdownFlag;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Totals reported when the loop stops on request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferSummary {
    /// Completed cycles.
    pub cycles: u64,
    /// Bytes written to the sink.
    pub bytes: u64,
    /// Signal that ended the loop.
    pub signal: Option<i32>,
}

/// Moves fixed-size chunks from a source to a sink until told to stop.
///
/// Each cycle checks the shutdown flag, fills the buffer from the source,
/// writes it to the sink, wipes it and sleeps. Any device error ends the
/// loop; there are no retries.
pub struct EntropyPipe<S, K> {
    source: S,
    sink: K,
    buffer: TransferBuffer,
    interval: Duration,
    shutdown: ShutdownFlag,
    metrics: Option<TransferMetrics>,
    metrics_file: Option<PathBuf>,
}

impl<S: EntropySource, K: EntropySink> EntropyPipe<S, K> {
    /// Creates a pipe moving `transfer_bytes` per cycle.
    ///
    /// The size is expected to have been bounded by [`Config`] validation;
    /// the buffer is allocated here and reused for the life of the pipe.
    pub fn new(
        source: S,
        sink: K,
        transfer_bytes: usize,
        interval: Duration,
        shutdown: ShutdownFlag,
    ) -> Self {
        Self {
            source,
            sink,
            buffer: TransferBuffer::new(transfer_bytes),
            interval,
            shutdown,
            metrics: None,
            metrics_file: None,
        }
    }

    /// Creates a pipe shaped by a resolved configuration.
    pub fn from_config(config: &Config, source: S, sink: K, shutdown: ShutdownFlag) -> Self {
        Self::new(
            source,
            sink,
            config.transfer_bytes(),
            config.interval(),
            shutdown,
        )
    }

    /// Records each cycle in `metrics`, and rewrites `textfile` after each
    /// cycle when given.
    pub fn with_metrics(mut self, metrics: TransferMetrics, textfile: Option<PathBuf>) -> Self {
        metrics.set_schedule(self.buffer.len(), self.interval.as_secs());
        self.metrics = Some(metrics);
        self.metrics_file = textfile;
        self
    }

    /// Performs one read and one write, then wipes the buffer.
    ///
    /// The buffer is wiped whether or not the transfer succeeded, so a
    /// failed read never leaves partial entropy behind.
    pub fn run_cycle(&mut self) -> Result<(), DeviceError> {
        debug_assert!(self.buffer.is_wiped());

        let result = self
            .source
            .fill(self.buffer.as_mut_slice())
            .and_then(|()| self.sink.feed(self.buffer.as_slice()));
        self.buffer.wipe();
        result?;

        let bytes = self.buffer.len();
        if let Some(metrics) = &self.metrics {
            metrics.record_cycle(bytes);
        }
        tracing::trace!(bytes, "Transferred entropy");
        Ok(())
    }

    /// Runs cycles until shutdown is requested or a device fails.
    ///
    /// The flag is only checked before a cycle starts, so a request that
    /// arrives mid-cycle lets that cycle (and its sleep) finish first.
    pub fn run(&mut self) -> Result<TransferSummary, DeviceError> {
        let mut summary = TransferSummary::default();

        tracing::info!(
            source = %self.source.describe(),
            sink = %self.sink.describe(),
            bytes = self.buffer.len(),
            interval_secs = self.interval.as_secs(),
            "Entropy gathering started"
        );

        loop {
            if let Some(signal) = self.shutdown.requested() {
                summary.signal = Some(signal);
                tracing::info!(
                    signal,
                    cycles = summary.cycles,
                    bytes = summary.bytes,
                    "Entropy gathering stopped"
                );
                return Ok(summary);
            }

            self.run_cycle()?;
            summary.cycles += 1;
            summary.bytes += self.buffer.len() as u64;
            self.export_metrics();

            if !self.interval.is_zero() {
                std::thread::sleep(self.interval);
            }
        }
    }

    fn export_metrics(&self) {
        let (Some(metrics), Some(path)) = (&self.metrics, &self.metrics_file) else {
            return;
        };
        if let Err(e) = metrics.write_textfile(path) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to export metrics");
        }
    }

    /// The transfer buffer.
    pub fn buffer(&self) -> &TransferBuffer {
        &self.buffer
    }

    /// The source endpoint.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// The sink endpoint.
    pub fn sink(&self) -> &K {
        &self.sink
    }
}

/// Runs the loop between two device paths.
pub fn feed(
    source_path: &Path,
    sink_path: &Path,
    n_bytes: usize,
    interval: Duration,
    shutdown: &ShutdownFlag,
) -> Result<TransferSummary, DeviceError> {
    EntropyPipe::new(
        DeviceSource::new(source_path),
        DeviceSink::new(sink_path),
        n_bytes,
        interval,
        shutdown.clone(),
    )
    .run()
}
