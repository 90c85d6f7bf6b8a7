//! Player options (flare.toml)
//!
//! Every field has a default, so an empty document is a valid configuration:
//!
//! ```toml
//! worker_threads = 4
//!
//! [timer]
//! min_delay_ms = 1
//!
//! [video]
//! fallback_frame_rate = 24.0
//! ```

use crate::error::RuntimeError;
use crate::media::DEFAULT_FRAME_RATE;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Options for creating a [`Player`](crate::Player)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlayerOptions {
    /// Worker threads in the shared pool (0 = one per CPU)
    pub worker_threads: usize,

    /// Timer settings
    pub timer: TimerOptions,

    /// Video settings
    pub video: VideoOptions,
}

/// Timer settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimerOptions {
    /// Shorter timer delays are raised to this
    pub min_delay_ms: u64,
}

/// Video settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VideoOptions {
    /// Frame rate assumed when a stream reports none
    pub fallback_frame_rate: f64,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            timer: TimerOptions::default(),
            video: VideoOptions::default(),
        }
    }
}

impl Default for TimerOptions {
    fn default() -> Self {
        Self { min_delay_ms: 1 }
    }
}

impl Default for VideoOptions {
    fn default() -> Self {
        Self {
            fallback_frame_rate: DEFAULT_FRAME_RATE,
        }
    }
}

impl PlayerOptions {
    /// Parse options from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, RuntimeError> {
        let options: PlayerOptions = toml::from_str(content)?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, RuntimeError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Serialize to TOML text
    pub fn to_toml_string(&self) -> Result<String, RuntimeError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), RuntimeError> {
        let rate = self.video.fallback_frame_rate;
        if !(rate.is_finite() && rate > 0.0) {
            return Err(RuntimeError::InvalidOptions(format!(
                "video.fallback_frame_rate must be positive, got {}",
                rate
            )));
        }
        Ok(())
    }

    /// Worker count with 0 resolved to the number of CPUs
    pub fn effective_worker_threads(&self) -> usize {
        if self.worker_threads == 0 {
            num_cpus::get().max(1)
        } else {
            self.worker_threads
        }
    }

    /// Minimum timer period
    pub fn min_timer_delay(&self) -> Duration {
        Duration::from_millis(self.timer.min_delay_ms)
    }
}
