//! TOML configuration for the `esr31` binary.
//!
//! Every section falls back to its defaults, so a file only needs the keys
//! that differ. Command-line flags are applied on top by the caller.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use esr31_core::{
    AcquisitionOptions, DEFAULT_MAX_ATTEMPTS, DEFAULT_MEASUREMENT_PREFIX, SerialSettings,
    StopCondition,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Serial link to the controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub device: String,
    pub baud_rate: u32,
    /// Per-read timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: "/dev/ttyUSB0".into(),
            baud_rate: 115_200,
            timeout_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Read attempts per run (0 = unbounded)
    pub max_attempts: u64,
    pub stop: StopCondition,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            stop: StopCondition::FirstFrame,
        }
    }
}

/// InfluxDB 1.x HTTP endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InfluxConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub timeout_secs: u64,
    pub measurement_prefix: String,
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 8086,
            database: "hotwater".into(),
            timeout_secs: 3,
            measurement_prefix: DEFAULT_MEASUREMENT_PREFIX.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub serial: SerialConfig,
    pub acquisition: AcquisitionConfig,
    pub influx: InfluxConfig,
}

impl AppConfig {
    /// Load from `path`, or use defaults when no path is given.
    ///
    /// An explicit path must exist and parse.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            debug!("no config file given, using defaults");
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Returns every problem found; empty means the config is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.serial.device.trim().is_empty() {
            errors.push("serial.device must not be empty".into());
        }
        if self.serial.baud_rate == 0 {
            errors.push("serial.baud_rate must be greater than 0".into());
        }
        if self.serial.timeout_ms == 0 {
            errors.push("serial.timeout_ms must be greater than 0".into());
        }
        if self.influx.host.trim().is_empty() {
            errors.push("influx.host must not be empty".into());
        }
        if self.influx.port == 0 {
            errors.push("influx.port must not be 0".into());
        }
        if self.influx.database.trim().is_empty() {
            errors.push("influx.database must not be empty".into());
        }
        if self.influx.timeout_secs == 0 {
            errors.push("influx.timeout_secs must be greater than 0".into());
        }

        errors
    }

    pub fn serial_settings(&self) -> SerialSettings {
        SerialSettings {
            device: self.serial.device.clone(),
            baud_rate: self.serial.baud_rate,
            timeout: Duration::from_millis(self.serial.timeout_ms),
        }
    }

    pub fn acquisition_options(&self) -> AcquisitionOptions {
        let max_attempts = self.acquisition.max_attempts;
        AcquisitionOptions {
            max_attempts: (max_attempts > 0).then_some(max_attempts),
            stop: self.acquisition.stop,
        }
    }
}
