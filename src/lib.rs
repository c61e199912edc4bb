//! trngd: hardware TRNG to kernel entropy pool feeder
//!
//! Reads fixed-size chunks from a true random number generator character
//! device and writes them to the kernel entropy pool device on a schedule,
//! for systems where the kernel cannot read the TRNG itself.
//!
//! # Architecture
//!
//! The daemon runs strictly in sequence on one thread:
//!
//! ```text
//! config → guard (pid file, detach) → shutdown (signals) → pipe (loop) → guard release
//! ```
//!
//! # Design Principles
//!
//! - **Fail-fast**: any configuration, pid file or device error stops the
//!   daemon; nothing is retried and no defaults are substituted
//! - **Minimal lock spans**: each device is opened and locked only for the
//!   single read or write it serves
//! - **Buffer hygiene**: the transfer buffer is zero except between a read
//!   and the write that follows it
//! - **Cooperative shutdown**: signals only set a flag, checked between
//!   cycles
//! - **No post-processing**: bytes are passed through untouched
//!
//! # Example
//!
//! ```no_run
//! use trngd::{Config, Daemon, DaemonOptions};
//!
//! let config = Config::new("/dev/trng0", 16, 2).unwrap();
//! let daemon = Daemon::new(config, DaemonOptions::default());
//! let summary = daemon.run().unwrap();
//! println!("moved {} bytes", summary.bytes);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod config;
pub mod daemon;
pub mod error;
pub mod guard;
pub mod logging;
pub mod metrics;
pub mod pipe;
pub mod shutdown;

// Re-export commonly used types at crate root
pub use config::{Config, ConfigError, Overrides};
pub use daemon::{Daemon, DaemonOptions};
pub use error::DaemonError;
pub use guard::{GuardError, PidFile};
pub use pipe::{
    DeviceError, EntropyPipe, EntropySink, EntropySource, TransferBuffer, TransferSummary,
};
pub use shutdown::ShutdownFlag;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
