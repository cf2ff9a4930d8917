//! Configuration
//!
//! Process-wide settings owned by the [`Host`](crate::host::Host). Every
//! field has a default, so partial JSON documents are accepted.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables of the interactive canvas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Pointer travel (absolute pixels) before a press turns into a drag
    pub drag_threshold: f32,
    /// Slider increments are divided by this while shift is held
    pub fine_slider_divisor: f32,
    /// Fade-out duration of a freshly created wire, in seconds
    pub fade_new_secs: f32,
    /// Fade-out duration of a removed wire, in seconds
    pub fade_removed_secs: f32,
    /// Label of the button dismissing error alerts
    pub dismiss_label: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            drag_threshold: 5.0,
            fine_slider_divisor: 10.0,
            fade_new_secs: 0.4,
            fade_removed_secs: 1.0,
            dismiss_label: "Dismiss".to_string(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Verbose diagnostics for the embedding shell
    pub debug: bool,
    pub editor: EditorConfig,
}

impl Config {
    /// Parse a JSON document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Default `tracing` filter directive for shells installing a subscriber
    pub fn log_directive(&self) -> &'static str {
        if self.debug {
            "patchcanvas=debug"
        } else {
            "patchcanvas=info"
        }
    }

    /// Read a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_json(&text)?;
        tracing::debug!("config loaded from {}", path.display());
        Ok(config)
    }
}
