//! Prometheus metrics for the entropy pipe.
//!
//! The daemon has no network interface, so metrics are exported by writing
//! a node-exporter textfile after each cycle.
//!
//! # Metrics Exposed
//!
//! - `trngd_cycles_total` - Completed read/write cycles
//! - `trngd_bytes_transferred_total` - Bytes moved into the kernel pool
//! - `trngd_transfer_size_bytes` - Configured bytes per cycle
//! - `trngd_interval_seconds` - Configured pause between cycles
//! - `trngd_last_transfer_timestamp_seconds` - Unix time of the last cycle

mod collector;

pub use collector::{MetricsError, TransferMetrics};
