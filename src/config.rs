//! Connection configuration.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::DEFAULT_TIMEOUT_MS;
use crate::error::{DriverError, Result};

/// Parameters a link is opened with, kept around read-only after `connect`
/// for diagnostics and reconnect-style callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DriverConfig {
    /// OS path to the serial device, e.g. `/dev/ttyUSB0`.
    pub port: String,
    /// Baud rate, 8N1.
    pub baud_rate: u32,
    /// Default timeout for command/response exchanges.
    pub default_timeout_ms: u64,
    /// Whether per-sample quality bytes are present on the wire.
    pub intensity_mode: bool,
}

impl DriverConfig {
    /// Build a config with the operational envelope defaults filled in.
    #[must_use]
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            intensity_mode: false,
        }
    }

    #[must_use]
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.default_timeout_ms = ms;
        self
    }

    #[must_use]
    pub fn with_intensity_mode(mut self, on: bool) -> Self {
        self.intensity_mode = on;
        self
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Load a config from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| DriverError::Protocol(format!("invalid config json: {e}")))
    }

    /// Save this config as JSON, for round-tripping a hand-tuned connection.
    pub fn save_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| DriverError::Protocol(format!("failed to serialize config: {e}")))?;
        fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_envelope() {
        let cfg = DriverConfig::new("/dev/ttyUSB0", 128_000);
        assert_eq!(cfg.default_timeout_ms, DEFAULT_TIMEOUT_MS);
        assert!(!cfg.intensity_mode);
    }

    #[test]
    fn json_round_trip() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("spinscan-config-test-{}.json", std::process::id()));
        let cfg = DriverConfig::new("/dev/ttyUSB0", 230_400).with_intensity_mode(true).with_timeout_ms(500);
        cfg.save_json_file(&path).unwrap();
        let loaded = DriverConfig::from_json_file(&path).unwrap();
        assert_eq!(cfg, loaded);
        let _ = fs::remove_file(&path);
    }
}
