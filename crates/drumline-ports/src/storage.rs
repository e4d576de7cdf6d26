use serde::{Deserialize, Serialize};

fn default_reduce_articulations() -> bool {
    true
}

fn default_speed() -> f64 {
    1.0
}

fn default_tick_interval_us() -> u64 {
    1_000
}

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serde(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsDto {
    #[serde(default = "default_reduce_articulations")]
    pub reduce_articulations: bool,
    pub visual_latency_ms: f64,
    pub input_offset_ms: f64,
    #[serde(default = "default_speed")]
    pub speed: f64,
    pub loop_enabled: bool,
    #[serde(default = "default_tick_interval_us")]
    pub tick_interval_us: u64,
    pub muted_channels: Vec<u8>,
}

impl Default for SettingsDto {
    fn default() -> Self {
        Self {
            reduce_articulations: true,
            visual_latency_ms: 0.0,
            input_offset_ms: 0.0,
            speed: 1.0,
            loop_enabled: false,
            tick_interval_us: 1_000,
            muted_channels: Vec::new(),
        }
    }
}

pub trait StoragePort: Send + Sync {
    fn load_settings(&self) -> Result<SettingsDto, StorageError>;
    fn save_settings(&self, s: &SettingsDto) -> Result<(), StorageError>;
}
