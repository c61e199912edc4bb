//! `KEY=VALUE` config file tokenizer.
//!
//! The format has no sections, comments or escaping. Each line holds at
//! most one assignment; anything without a `=` is skipped. Only the line
//! terminator is removed, so whitespace around keys and values is kept.

use super::ConfigError;
use std::path::Path;

/// Key naming the source device.
pub const KEY_DEVICE: &str = "DEVICE";
/// Key naming the transfer size in bytes.
pub const KEY_BYTES: &str = "BYTES";
/// Key naming the pause between cycles in seconds.
pub const KEY_INTERVAL: &str = "INTERVAL";

/// A single `KEY=VALUE` assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<'a> {
    /// Text before the first `=`.
    pub key: &'a str,
    /// Text after the first `=`.
    pub value: &'a str,
}

/// Splits config text into assignments.
///
/// Lines without a delimiter yield nothing. The key and value are split on
/// the first `=`, so `PATH=/a=b` yields the value `/a=b`. `\n` and `\r\n`
/// terminators are stripped; nothing else is.
pub fn tokenize(text: &str) -> impl Iterator<Item = Entry<'_>> {
    text.lines().filter_map(|line| {
        let (key, value) = line.split_once('=')?;
        Some(Entry { key, value })
    })
}

/// Raw values recognized in a config file.
///
/// Values are kept as text here; typing and range checks happen when the
/// final [`Config`](super::Config) is built so that CLI overrides can be
/// applied first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSettings {
    pub device: Option<String>,
    pub bytes: Option<String>,
    pub interval: Option<String>,
}

impl FileSettings {
    /// Collects the recognized keys from config text. The last assignment
    /// of a key wins; unknown keys are ignored.
    pub fn parse(text: &str) -> Self {
        let mut settings = Self::default();
        for entry in tokenize(text) {
            let slot = match entry.key {
                KEY_DEVICE => &mut settings.device,
                KEY_BYTES => &mut settings.bytes,
                KEY_INTERVAL => &mut settings.interval,
                other => {
                    tracing::debug!(key = other, "Ignoring unknown config key");
                    continue;
                }
            };
            *slot = Some(entry.value.to_owned());
        }
        settings
    }

    /// Reads and tokenizes a config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&text))
    }
}
