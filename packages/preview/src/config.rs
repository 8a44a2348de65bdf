//! Timing and threshold knobs for preview synchronization.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Configuration for the sync broker and its surfaces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Window in which successive notifications coalesce into one pass
    pub debounce_ms: u64,
    /// Delay before the blind reconstruction after a dimension patch
    pub fallback_ms: u64,
    /// Size changes smaller than this (in both axes) are noise
    pub dimension_threshold_px: f64,
    /// Observer-level debounce for size reports
    pub size_debounce_ms: u64,
    /// Repeated clicks on the same item inside this window count once
    pub click_window_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 50,
            fallback_ms: 500,
            dimension_threshold_px: 2.0,
            size_debounce_ms: 100,
            click_window_ms: 1000,
        }
    }
}

impl SyncConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_json_str(&source)
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn fallback_delay(&self) -> Duration {
        Duration::from_millis(self.fallback_ms)
    }

    pub fn size_debounce(&self) -> Duration {
        Duration::from_millis(self.size_debounce_ms)
    }

    pub fn click_window(&self) -> Duration {
        Duration::from_millis(self.click_window_ms)
    }
}
