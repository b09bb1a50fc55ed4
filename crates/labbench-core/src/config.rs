//! Session configuration
//!
//! Loaded from TOML:
//!
//! ```toml
//! [robot]
//! slot_size = { x = 100.0, y = 100.0, z = 0.0 }
//! calibration_path = "calibrations.json"
//! max_commands = 100000
//!
//! [scripting]
//! memory_limit_bytes = 67108864
//! ```

use crate::error::{CoreError, Result};
use labbench_hardware::{RobotConfig, Vector};
use labbench_protocol::ScriptConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// labbench configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LabConfig {
    /// Deck geometry and calibration persistence
    pub robot: RobotConfig,
    /// Interpreter limits for scripted protocols
    pub scripting: ScriptConfig,
}

impl LabConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a TOML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| CoreError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| CoreError::ConfigFormat {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse TOML text
    pub fn from_toml(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// With calibration persisted to a JSON file
    #[inline]
    #[must_use]
    pub fn with_calibration_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.robot.calibration_path = Some(path.into());
        self
    }

    /// With deck slot footprint
    #[inline]
    #[must_use]
    pub fn with_slot_size(mut self, slot_size: Vector) -> Self {
        self.robot.slot_size = slot_size;
        self
    }

    /// With ceiling on commands a single protocol may queue
    #[inline]
    #[must_use]
    pub fn with_max_commands(mut self, max_commands: usize) -> Self {
        self.robot.max_commands = max_commands;
        self
    }

    /// With interpreter heap ceiling (0 for unlimited)
    #[inline]
    #[must_use]
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.scripting.memory_limit_bytes = bytes;
        self
    }
}
