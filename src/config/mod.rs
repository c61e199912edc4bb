//! Daemon configuration.
//!
//! Settings come from a line-oriented `KEY=VALUE` file, from command-line
//! overrides, or from both. Nothing reaches the entropy pipe until every
//! field has been resolved and validated.

mod file;
mod settings;

pub use file::{tokenize, Entry, FileSettings};
pub use settings::{
    Config, ConfigError, Overrides, DEFAULT_CONFIG_PATH, DEFAULT_INTERVAL_SECS,
    DEFAULT_TRANSFER_BYTES, MAX_DEVICE_PATH_LEN, MAX_TRANSFER_BYTES,
};
