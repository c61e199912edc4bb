//! Transfer metrics registry.

use chrono::Utc;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
    #[error("failed to write metrics file: {0}")]
    Io(#[from] std::io::Error),
}

/// Prometheus metrics registry for the entropy pipe.
#[derive(Clone)]
pub struct TransferMetrics {
    registry: Registry,

    cycles_total: IntCounter,
    bytes_transferred_total: IntCounter,
    transfer_size_bytes: IntGauge,
    interval_seconds: IntGauge,
    last_transfer_timestamp: IntGauge,
}

impl TransferMetrics {
    /// Creates a registry with all transfer metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let cycles_total = IntCounter::new(
            "trngd_cycles_total",
            "Completed read/write cycles",
        )?;
        let bytes_transferred_total = IntCounter::new(
            "trngd_bytes_transferred_total",
            "Bytes moved from the TRNG into the kernel pool",
        )?;
        let transfer_size_bytes = IntGauge::new(
            "trngd_transfer_size_bytes",
            "Configured bytes per cycle",
        )?;
        let interval_seconds = IntGauge::new(
            "trngd_interval_seconds",
            "Configured pause between cycles",
        )?;
        let last_transfer_timestamp = IntGauge::new(
            "trngd_last_transfer_timestamp_seconds",
            "Unix time of the last completed cycle",
        )?;

        registry.register(Box::new(cycles_total.clone()))?;
        registry.register(Box::new(bytes_transferred_total.clone()))?;
        registry.register(Box::new(transfer_size_bytes.clone()))?;
        registry.register(Box::new(interval_seconds.clone()))?;
        registry.register(Box::new(last_transfer_timestamp.clone()))?;

        Ok(Self {
            registry,
            cycles_total,
            bytes_transferred_total,
            transfer_size_bytes,
            interval_seconds,
            last_transfer_timestamp,
        })
    }

    /// Records the configured transfer shape.
    pub fn set_schedule(&self, transfer_bytes: usize, interval_seconds: u64) {
        self.transfer_size_bytes.set(transfer_bytes as i64);
        self.interval_seconds
            .set(i64::try_from(interval_seconds).unwrap_or(i64::MAX));
    }

    /// Records one completed cycle.
    pub fn record_cycle(&self, bytes: usize) {
        self.cycles_total.inc();
        self.bytes_transferred_total.inc_by(bytes as u64);
        self.last_transfer_timestamp.set(Utc::now().timestamp());
    }

    /// Completed cycles so far.
    pub fn cycles(&self) -> u64 {
        self.cycles_total.get()
    }

    /// Bytes transferred so far.
    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred_total.get()
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Writes the metrics for a node-exporter textfile collector.
    ///
    /// The file is written next to `path` and renamed into place so a
    /// scraper never sees a partial file.
    pub fn write_textfile(&self, path: &Path) -> Result<(), MetricsError> {
        let text = self.encode()?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = std::path::PathBuf::from(tmp);

        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(text.as_bytes())?;
        file.sync_all()?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl std::fmt::Debug for TransferMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferMetrics")
            .field("cycles", &self.cycles())
            .field("bytes_transferred", &self.bytes_transferred())
            .finish_non_exhaustive()
    }
}
