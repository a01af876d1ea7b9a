//! Controller configuration using Figment
//!
//! Values are layered, lowest precedence first:
//! 1. built-in defaults ([`CameraConfig::default`])
//! 2. a TOML file
//! 3. environment variables prefixed with `CAMDAQ_`
//!
//! ```text
//! CAMDAQ_BINNING=2
//! CAMDAQ_FRAME_RATE_HEADROOM=0.02
//! CAMDAQ_LOG_FILTER=cam_daq=debug
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const ENV_PREFIX: &str = "CAMDAQ_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration load error: {0}")]
    LoadError(#[from] figment::Error),
    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}

/// Tunables of one [`crate::CameraController`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Controller name used in logs and `describe()`.
    pub name: String,
    /// Binning applied when the controller is constructed.
    pub binning: u32,
    /// Fraction of the device maximum frame rate kept in reserve.
    pub frame_rate_headroom: f64,
    /// GigE link throughput cap in bytes per second; `None` leaves the
    /// device setting alone.
    pub stream_bytes_per_second: Option<u64>,
    /// Run at the capped maximum frame rate each time acquisition starts.
    pub start_at_max_frame_rate: bool,
    pub collect_timeout_ms: u64,
    /// Default `tracing` filter for [`crate::logging::init`].
    pub log_filter: String,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            name: "camera".to_string(),
            binning: 1,
            frame_rate_headroom: 0.01,
            stream_bytes_per_second: Some(10_000_000),
            start_at_max_frame_rate: true,
            collect_timeout_ms: 2000,
            log_filter: "info".to_string(),
        }
    }
}

impl CameraConfig {
    fn figment() -> Figment {
        Figment::from(Serialized::defaults(CameraConfig::default()))
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .map_err(ConfigError::LoadError)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file, then apply environment overrides.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::extract(Self::figment().merge(Toml::file(path.as_ref())))
    }

    /// Defaults plus environment overrides only.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::extract(Self::figment())
    }

    /// Parse TOML text, then apply environment overrides.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Self::extract(Self::figment().merge(Toml::string(toml)))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.binning == 0 {
            return Err(ConfigError::ValidationError(
                "binning must be at least 1".into(),
            ));
        }
        if !(0.0..0.5).contains(&self.frame_rate_headroom) {
            return Err(ConfigError::ValidationError(format!(
                "frame_rate_headroom {} must be in [0, 0.5)",
                self.frame_rate_headroom
            )));
        }
        if self.collect_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "collect_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn collect_timeout(&self) -> Duration {
        Duration::from_millis(self.collect_timeout_ms)
    }
}
