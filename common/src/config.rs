use serde::Deserialize;
use std::path::Path;

use crate::frame::{AeState, AfState, AwbState, MetadataKey, MetadataValue};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub wait: WaitConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The desired 3A state and the limits on how long to wait for it.
#[derive(Debug, Clone, Deserialize)]
pub struct WaitConfig {
    /// Acceptable AE states; omit to not care about AE.
    pub ae_state: Option<Vec<AeState>>,
    pub af_state: Option<Vec<AfState>>,
    pub awb_state: Option<Vec<AwbState>>,
    /// Give up after this many frames past the first observed one.
    pub frame_limit: Option<u64>,
    /// Give up once sensor time has advanced this far past the first observed frame.
    pub time_limit_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_first_request")]
    pub first_request: u64,
    #[serde(default = "default_first_frame")]
    pub first_frame: u64,
    #[serde(default = "default_frames")]
    pub frames: u64,
    /// Frames still in flight from the request before `first_request`.
    #[serde(default = "default_stale_frames")]
    pub stale_frames: u64,
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    /// Number of concurrent result callback tasks.
    #[serde(default = "default_callback_tasks")]
    pub callback_tasks: usize,
    /// Frame offset (from `first_frame`) at which each routine converges.
    #[serde(default = "default_ae_converges_after")]
    pub ae_converges_after: u64,
    #[serde(default = "default_af_converges_after")]
    pub af_converges_after: u64,
    #[serde(default = "default_awb_converges_after")]
    pub awb_converges_after: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            first_request: default_first_request(),
            first_frame: default_first_frame(),
            frames: default_frames(),
            stale_frames: default_stale_frames(),
            frame_interval_ms: default_frame_interval_ms(),
            callback_tasks: default_callback_tasks(),
            ae_converges_after: default_ae_converges_after(),
            af_converges_after: default_af_converges_after(),
            awb_converges_after: default_awb_converges_after(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

impl WaitConfig {
    /// Flatten the per-routine lists into exit condition entries, in AE, AF, AWB order.
    pub fn exit_condition_entries(&self) -> Vec<(MetadataKey, Vec<MetadataValue>)> {
        let mut entries = Vec::new();
        if let Some(states) = &self.ae_state {
            entries.push((MetadataKey::AeState, to_values(states)));
        }
        if let Some(states) = &self.af_state {
            entries.push((MetadataKey::AfState, to_values(states)));
        }
        if let Some(states) = &self.awb_state {
            entries.push((MetadataKey::AwbState, to_values(states)));
        }
        entries
    }
}

fn to_values<S: Copy + Into<MetadataValue>>(states: &[S]) -> Vec<MetadataValue> {
    states.iter().map(|s| (*s).into()).collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
}

// Default value functions
fn default_first_request() -> u64 {
    1
}
fn default_first_frame() -> u64 {
    100
}
fn default_frames() -> u64 {
    120
}
fn default_stale_frames() -> u64 {
    3
}
fn default_frame_interval_ms() -> u64 {
    33
}
fn default_callback_tasks() -> usize {
    2
}
fn default_ae_converges_after() -> u64 {
    12
}
fn default_af_converges_after() -> u64 {
    20
}
fn default_awb_converges_after() -> u64 {
    8
}
fn default_log_level() -> String {
    "info".into()
}
