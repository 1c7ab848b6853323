//! Configuration module for scriptnode-rs
//!
//! This module handles node configuration:
//! - Script engine safety limits
//! - Buffer pipe sizing (reserved buffers, per-buffer event capacity)
//! - Render defaults used by the driver binary
//!
//! # Config Location
//!
//! The default config file lives in the platform-appropriate config directory:
//! - **Linux**: `~/.config/dev.scriptnode-rs/config.toml`
//! - **macOS**: `~/Library/Application Support/dev.scriptnode-rs/config.toml`
//! - **Windows**: `%APPDATA%\dev.scriptnode-rs\config.toml`
//!
//! # Example
//!
//! ```ignore
//! use scriptnode_rs::config::NodeConfig;
//!
//! let config = NodeConfig::load_or_default();
//! let loader = RhaiLoader::new(&config);
//! ```

use crate::error::{Result, ScriptError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for config directories
pub const APP_ID: &str = "dev.scriptnode-rs";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Default sample rate in Hz
pub const DEFAULT_SAMPLE_RATE: f64 = 44_100.0;

/// Default render block size in samples
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// Default number of events preallocated per MIDI buffer
pub const DEFAULT_MIDI_EVENT_CAPACITY: usize = 1024;

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

/// Get the path to the default config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join(CONFIG_FILE))
}

/// Safety limits applied to the script engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineLimits {
    /// Maximum expression nesting depth at global level
    pub max_expr_depth: usize,
    /// Maximum expression nesting depth inside functions
    pub max_function_expr_depth: usize,
    /// Maximum function call nesting
    pub max_call_levels: usize,
    /// Maximum operations per call (0 = unlimited)
    pub max_operations: u64,
    /// Maximum string length
    pub max_string_size: usize,
    /// Maximum array length
    pub max_array_size: usize,
    /// Maximum object map size
    pub max_map_size: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_expr_depth: 64,
            max_function_expr_depth: 64,
            max_call_levels: 32,
            max_operations: 0,
            max_string_size: 10_000,
            max_array_size: 65_536,
            max_map_size: 1_000,
        }
    }
}

/// Buffer pipe sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipeSettings {
    /// MIDI buffers reserved up front by each script instance's pipe
    pub initial_midi_buffers: usize,
    /// Events preallocated per MIDI buffer
    pub midi_event_capacity: usize,
}

impl Default for PipeSettings {
    fn default() -> Self {
        Self {
            initial_midi_buffers: 4,
            midi_event_capacity: DEFAULT_MIDI_EVENT_CAPACITY,
        }
    }
}

/// Render defaults used when no host supplies them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDefaults {
    pub sample_rate: f64,
    pub block_size: usize,
    pub audio_channels: usize,
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            block_size: DEFAULT_BLOCK_SIZE,
            audio_channels: 2,
        }
    }
}

/// Complete node configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub engine: EngineLimits,
    pub pipe: PipeSettings,
    pub render: RenderDefaults,
}

impl NodeConfig {
    /// Load a config from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ScriptError::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| ScriptError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load the config from the default location, returning defaults on any error
    pub fn load_or_default() -> Self {
        let Some(path) = config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save the config as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ScriptError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ScriptError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ScriptError::Config(format!("Failed to write config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert_eq!(config.render.sample_rate, DEFAULT_SAMPLE_RATE);
        assert_eq!(config.render.block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(config.engine.max_operations, 0);
        assert_eq!(config.pipe.midi_event_capacity, DEFAULT_MIDI_EVENT_CAPACITY);
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let mut config = NodeConfig::default();
        config.engine.max_operations = 250_000;
        config.pipe.initial_midi_buffers = 8;
        config.render.block_size = 128;

        config.save(&path).unwrap();
        let loaded = NodeConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[render]\nblock_size = 64\n").unwrap();

        let loaded = NodeConfig::load(&path).unwrap();
        assert_eq!(loaded.render.block_size, 64);
        assert_eq!(loaded.render.sample_rate, DEFAULT_SAMPLE_RATE);
        assert_eq!(loaded.engine, EngineLimits::default());
    }

    #[test]
    fn test_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "render = 12").unwrap();

        let err = NodeConfig::load(&path).unwrap_err();
        assert!(matches!(err, ScriptError::Config(_)));
    }
}
