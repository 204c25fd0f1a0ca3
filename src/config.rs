// Engine configuration - JSON file in the user's config directory

use crate::player::channels::ChannelPolicy;
use crate::player::scheduler::PlayerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub timer_period_ms: u64,
    pub default_bpm: f64,
    /// Resolution recordings are saved at
    pub export_ticks_per_quarter: u16,
    /// Offset of the volume/program events before the first note
    pub lead_in_ms: u64,
    pub first_melodic_channel: u8,
    pub percussion_channel: u8,
    pub notification_capacity: usize,
    pub event_queue_capacity: usize,
    pub output_port: Option<String>,
    /// Catalog shown by `keystyle catalog` without an argument
    pub catalog_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timer_period_ms: 10,
            default_bpm: 120.0,
            export_ticks_per_quarter: 960,
            lead_in_ms: 5,
            first_melodic_channel: 2,
            percussion_channel: 10,
            notification_capacity: 256,
            event_queue_capacity: 1024,
            output_port: None,
            catalog_path: None,
        }
    }
}

impl EngineConfig {
    /// `<config_dir>/keystyle/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("keystyle").join("config.json"))
    }

    /// Defaults when the file does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: EngineConfig = serde_json::from_str(&json)?;
        config.validate()?;
        tracing::info!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.timer_period_ms) {
            return Err(ConfigError::Invalid(format!(
                "timer period {} ms outside 1..=100",
                self.timer_period_ms
            )));
        }
        if !(20.0..=999.0).contains(&self.default_bpm) {
            return Err(ConfigError::Invalid(format!(
                "default bpm {} outside 20..=999",
                self.default_bpm
            )));
        }
        if !(1..=0x7FFF).contains(&self.export_ticks_per_quarter) {
            return Err(ConfigError::Invalid(format!(
                "export ticks per quarter {} outside 1..=32767",
                self.export_ticks_per_quarter
            )));
        }
        for channel in [self.first_melodic_channel, self.percussion_channel] {
            if !(1..=16).contains(&channel) {
                return Err(ConfigError::Invalid(format!("channel {channel} outside 1..=16")));
            }
        }
        if self.first_melodic_channel == self.percussion_channel {
            return Err(ConfigError::Invalid(
                "first melodic channel equals the percussion channel".into(),
            ));
        }
        if self.notification_capacity == 0 || self.event_queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue capacities must be positive".into()));
        }
        Ok(())
    }

    pub fn timer_period(&self) -> Duration {
        Duration::from_millis(self.timer_period_ms)
    }

    pub fn player_config(&self) -> PlayerConfig {
        PlayerConfig {
            timer_period: self.timer_period(),
            lead_in: Duration::from_millis(self.lead_in_ms),
            channels: ChannelPolicy::new(self.first_melodic_channel, self.percussion_channel),
            event_queue_capacity: self.event_queue_capacity,
        }
    }
}
