//! # Storefront Configuration
//!
//! Loaded from TOML. Every field is optional; missing ones take the defaults
//! below. Unknown fields are rejected so typos surface instead of silently
//! falling back.
//!
//! ```toml
//! [cart]
//! debounce_ms = 250
//! max_quantity = 99
//! error_flash_ms = 1500
//! request_timeout_ms = 10000
//! channel_capacity = 32
//!
//! [overlays]
//! desktop_breakpoint = 1024
//!
//! [remote]
//! base_url = "https://shop.example"
//! ```

use crate::model::DEFAULT_MAX_QUANTITY;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct StorefrontConfig {
    pub cart: CartConfig,
    pub overlays: OverlayConfig,
    pub remote: RemoteConfig,
}

impl StorefrontConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cart.validate()
    }
}

/// Cart engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct CartConfig {
    /// Quiet period after the last edit to a line before it is sent.
    pub debounce_ms: u64,
    /// Ceiling for lines without a remote-specified limit.
    pub max_quantity: u32,
    /// How long a failed line shows its error.
    pub error_flash_ms: u64,
    /// A change with no response after this long is treated as failed.
    pub request_timeout_ms: u64,
    pub channel_capacity: usize,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 250,
            max_quantity: DEFAULT_MAX_QUANTITY,
            error_flash_ms: 1500,
            request_timeout_ms: 10_000,
            channel_capacity: 32,
        }
    }
}

impl CartConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn error_flash(&self) -> Duration {
        Duration::from_millis(self.error_flash_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_quantity == 0 {
            return Err(ConfigError::InvalidValue(
                "cart.max_quantity must be greater than 0".into(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "cart.request_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "cart.channel_capacity must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct OverlayConfig {
    /// Viewport width at which the mobile navigation menu closes itself.
    pub desktop_breakpoint: u32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            desktop_breakpoint: 1024,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteConfig {
    /// Storefront origin for the HTTP cart service.
    pub base_url: Option<String>,
}
