//! Player configuration
//!
//! Small, TOML-loadable configuration. All values have built-in defaults;
//! a missing file or missing keys fall back to those defaults.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Player configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerConfig {
    /// Silence between consecutive segment clips, in milliseconds
    #[serde(default = "default_inter_segment_silence_ms")]
    pub inter_segment_silence_ms: u64,

    /// Playback rate applied until the host changes it
    #[serde(default = "default_rate")]
    pub default_rate: f64,
}

fn default_inter_segment_silence_ms() -> u64 {
    500
}

fn default_rate() -> f64 {
    1.0
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            inter_segment_silence_ms: default_inter_segment_silence_ms(),
            default_rate: default_rate(),
        }
    }
}

impl PlayerConfig {
    /// Load configuration from a TOML file
    ///
    /// Rejects a non-positive or non-finite `default_rate`; timer math
    /// divides by the rate, so a zero rate from a config file must never
    /// reach the engine.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: PlayerConfig = toml::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        if !(config.default_rate.is_finite() && config.default_rate > 0.0) {
            return Err(Error::InvalidRate(config.default_rate));
        }
        Ok(config)
    }

    /// Inter-segment silence as a [`Duration`]
    pub fn inter_segment_silence(&self) -> Duration {
        Duration::from_millis(self.inter_segment_silence_ms)
    }
}
