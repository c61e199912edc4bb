//! Resolved daemon settings and their validation.

use super::file::{FileSettings, KEY_BYTES, KEY_DEVICE, KEY_INTERVAL};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Config file read when none is named with `-c`.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/trngd.conf";

/// Transfer size used when the device comes from the command line and the
/// default config file does not exist.
pub const DEFAULT_TRANSFER_BYTES: u32 = 16;

/// Pause used when the device comes from the command line and the default
/// config file does not exist.
pub const DEFAULT_INTERVAL_SECS: u64 = 2;

/// Upper bound on a single transfer. The buffer is allocated once from
/// this value, so it must stay small.
pub const MAX_TRANSFER_BYTES: u32 = 4096;

/// Longest accepted source device path, in bytes.
pub const MAX_DEVICE_PATH_LEN: usize = 255;

/// Configuration resolution errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("{key} must be a non-negative integer, got {value:?}")]
    NotANumber { key: &'static str, value: String },
    #[error("BYTES must be at least 1")]
    ZeroBytes,
    #[error("BYTES must not exceed {max}, got {value}")]
    TooManyBytes { value: u32, max: u32 },
    #[error("DEVICE must not be empty")]
    EmptyDevice,
    #[error("DEVICE path is {len} bytes long, limit is {max}")]
    DeviceTooLong { len: usize, max: usize },
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Explicit config file (`-c`).
    pub config_file: Option<PathBuf>,
    /// Source device (positional argument).
    pub device: Option<PathBuf>,
    /// Transfer size (`-b`).
    pub bytes: Option<u32>,
    /// Pause between cycles (`-i`).
    pub interval: Option<u64>,
}

/// Validated daemon configuration.
///
/// Every constructor runs validation, so an instance always holds a
/// usable device path and a bounded transfer size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    device_path: PathBuf,
    transfer_bytes: u32,
    interval_seconds: u64,
}

impl Config {
    /// Builds a configuration from typed values.
    pub fn new(
        device_path: impl Into<PathBuf>,
        transfer_bytes: u32,
        interval_seconds: u64,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            device_path: device_path.into(),
            transfer_bytes,
            interval_seconds,
        };
        config.validate()?;
        Ok(config)
    }

    /// Resolves the configuration from command-line overrides and a config
    /// file, reading [`DEFAULT_CONFIG_PATH`] when `-c` is absent.
    pub fn resolve(overrides: &Overrides) -> Result<Self, ConfigError> {
        Self::resolve_with_default(overrides, Path::new(DEFAULT_CONFIG_PATH))
    }

    /// Like [`Config::resolve`], with `default_path` standing in for
    /// [`DEFAULT_CONFIG_PATH`].
    ///
    /// A file named with `-c` must be readable. The default file is read if
    /// it exists, and the command line wins over its values. Only when it
    /// does not exist and the device is on the command line do the
    /// historical defaults fill in bytes and interval.
    pub fn resolve_with_default(
        overrides: &Overrides,
        default_path: &Path,
    ) -> Result<Self, ConfigError> {
        if let Some(path) = &overrides.config_file {
            tracing::debug!(path = %path.display(), "Loading config file");
            let file = FileSettings::from_file(path)?;
            return Self::from_settings(&file, overrides);
        }

        tracing::debug!(path = %default_path.display(), "Loading default config file");
        match FileSettings::from_file(default_path) {
            Ok(file) => Self::from_settings(&file, overrides),
            Err(ConfigError::Read { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound && overrides.device.is_some() =>
            {
                tracing::debug!(
                    path = %default_path.display(),
                    "No default config file, using built-in defaults"
                );
                let device = overrides
                    .device
                    .clone()
                    .ok_or(ConfigError::Missing(KEY_DEVICE))?;
                Self::new(
                    device,
                    overrides.bytes.unwrap_or(DEFAULT_TRANSFER_BYTES),
                    overrides.interval.unwrap_or(DEFAULT_INTERVAL_SECS),
                )
            }
            Err(e) => Err(e),
        }
    }

    /// Combines file settings with overrides. Overrides win.
    pub fn from_settings(file: &FileSettings, overrides: &Overrides) -> Result<Self, ConfigError> {
        let device_path = match &overrides.device {
            Some(device) => device.clone(),
            None => PathBuf::from(file.device.as_deref().ok_or(ConfigError::Missing(KEY_DEVICE))?),
        };
        let transfer_bytes = match overrides.bytes {
            Some(bytes) => bytes,
            None => parse_number(KEY_BYTES, file.bytes.as_deref())?,
        };
        let interval_seconds = match overrides.interval {
            Some(interval) => interval,
            None => parse_number(KEY_INTERVAL, file.interval.as_deref())?,
        };
        Self::new(device_path, transfer_bytes, interval_seconds)
    }

    /// Resolves a relative device path against `cwd`.
    ///
    /// Validation applies to the configured value, so the anchored path may
    /// be longer than [`MAX_DEVICE_PATH_LEN`].
    pub fn anchored(&self, cwd: &Path) -> Self {
        Self {
            device_path: cwd.join(&self.device_path),
            ..self.clone()
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let len = self.device_path.as_os_str().len();
        if len == 0 {
            return Err(ConfigError::EmptyDevice);
        }
        if len > MAX_DEVICE_PATH_LEN {
            return Err(ConfigError::DeviceTooLong {
                len,
                max: MAX_DEVICE_PATH_LEN,
            });
        }
        if self.transfer_bytes == 0 {
            return Err(ConfigError::ZeroBytes);
        }
        if self.transfer_bytes > MAX_TRANSFER_BYTES {
            return Err(ConfigError::TooManyBytes {
                value: self.transfer_bytes,
                max: MAX_TRANSFER_BYTES,
            });
        }
        Ok(())
    }

    /// Path of the TRNG character device.
    pub fn device_path(&self) -> &Path {
        &self.device_path
    }

    /// Bytes moved per cycle.
    pub fn transfer_bytes(&self) -> usize {
        self.transfer_bytes as usize
    }

    /// Seconds slept between cycles.
    pub fn interval_seconds(&self) -> u64 {
        self.interval_seconds
    }

    /// Pause between cycles.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

fn parse_number<T: std::str::FromStr>(
    key: &'static str,
    value: Option<&str>,
) -> Result<T, ConfigError> {
    let value = value.ok_or(ConfigError::Missing(key))?;
    value.parse().map_err(|_| ConfigError::NotANumber {
        key,
        value: value.to_owned(),
    })
}
