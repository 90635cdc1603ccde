//! Flow control configuration.
//!
//! Initial windows and window-update tuning for the receive path. Values can
//! be built in code or loaded from a TOML document:
//!
//! ```toml
//! [flow_control]
//! initial_max_data = 15728640
//! initial_max_stream_data = 524288
//! window_update_threshold = 0.25
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Flow Control Configuration
///
/// Initial flow control limits and window-update tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlowControlConfig {
    /// Initial connection-level receive window (bytes)
    #[serde(default = "default_initial_max_data")]
    pub initial_max_data: u64,

    /// Initial stream-level receive window (bytes)
    #[serde(default = "default_initial_max_stream_data")]
    pub initial_max_stream_data: u64,

    /// Upper bound for stream window growth (bytes)
    #[serde(default = "default_max_stream_window")]
    pub max_stream_window: u64,

    /// Fraction of the window that has to be consumed before a window update
    /// is queued
    #[serde(default = "default_window_update_threshold")]
    pub window_update_threshold: f64,

    /// Window updates requested closer together than this double the window
    /// (milliseconds, 0 disables auto-tuning)
    #[serde(default = "default_auto_tune_interval_ms")]
    pub auto_tune_interval_ms: u64,
}

impl Default for FlowControlConfig {
    fn default() -> Self {
        Self {
            initial_max_data: default_initial_max_data(),
            initial_max_stream_data: default_initial_max_stream_data(),
            max_stream_window: default_max_stream_window(),
            window_update_threshold: default_window_update_threshold(),
            auto_tune_interval_ms: default_auto_tune_interval_ms(),
        }
    }
}

/// Document layout accepted by [`FlowControlConfig::from_toml_str`]
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    flow_control: Option<FlowControlConfig>,
}

impl FlowControlConfig {
    /// Validate the configuration.
    ///
    /// Returns every problem found, not just the first one.
    pub fn validate(&self) -> core::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.initial_max_stream_data == 0 {
            errors.push("initial_max_stream_data must be greater than 0".to_string());
        }

        if self.initial_max_data < self.initial_max_stream_data {
            errors.push(format!(
                "initial_max_data ({}) is smaller than initial_max_stream_data ({})",
                self.initial_max_data, self.initial_max_stream_data
            ));
        }

        if self.max_stream_window < self.initial_max_stream_data {
            errors.push(format!(
                "max_stream_window ({}) is smaller than initial_max_stream_data ({})",
                self.max_stream_window, self.initial_max_stream_data
            ));
        }

        if !(self.window_update_threshold > 0.0 && self.window_update_threshold <= 1.0) {
            errors.push(format!(
                "window_update_threshold ({}) must be in (0, 1]",
                self.window_update_threshold
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Parse and validate a TOML document.
    ///
    /// The settings may sit under a `[flow_control]` table or at the top
    /// level. Missing fields take their defaults, unknown keys are rejected.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(s).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        let config = match file.flow_control {
            Some(config) => config,
            None => toml::from_str(s).map_err(|e| Error::InvalidConfig(e.to_string()))?,
        };

        config
            .validate()
            .map_err(|errors| Error::InvalidConfig(errors.join("; ")))?;
        Ok(config)
    }

    /// Auto-tuning interval, `None` when disabled
    pub fn auto_tune_interval(&self) -> Option<Duration> {
        (self.auto_tune_interval_ms > 0).then(|| Duration::from_millis(self.auto_tune_interval_ms))
    }
}

fn default_initial_max_data() -> u64 {
    15 * 1024 * 1024 // 15 MB
}

fn default_initial_max_stream_data() -> u64 {
    512 * 1024 // 512 KB
}

fn default_max_stream_window() -> u64 {
    6 * 1024 * 1024 // 6 MB
}

fn default_window_update_threshold() -> f64 {
    0.25
}

fn default_auto_tune_interval_ms() -> u64 {
    100
}
