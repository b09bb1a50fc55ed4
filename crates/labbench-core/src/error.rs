//! Error types for labbench core
//!
//! Provides error handling for:
//! - Calibration requests naming unknown containers, axes or positions
//! - Robot construction and calibration storage failures
//! - Configuration loading
//!
//! Protocol loads never fail with these: their problems are reported as
//! data in a [`LoadResponse`](crate::LoadResponse).

use labbench_hardware::HardwareError;
use std::path::PathBuf;

/// Calibration request errors
#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    /// No container with this label on the deck
    #[error("Container {0} is not defined")]
    ContainerNotDefined(String),

    /// Nothing mounted on the axis (name uppercased)
    #[error("Axis {0} is not initialized")]
    AxisNotInitialized(String),

    /// Position is not one of the pipette's named plunger positions
    #[error("Position {0} is not on the plunger")]
    PositionNotOnPlunger(String),

    /// Robot failed to record or persist the calibration
    #[error("calibration failed: {0}")]
    Hardware(#[from] HardwareError),
}

impl CalibrationError {
    /// Check if the caller can fix the request
    #[inline]
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        match self {
            Self::Hardware(e) => e.is_user_error(),
            _ => true,
        }
    }
}

/// Main core error type
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Calibration request failed
    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    /// Robot model error
    #[error("hardware error: {0}")]
    Hardware(#[from] HardwareError),

    /// Configuration file could not be read
    #[error("cannot read configuration {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for [`LabConfig`](crate::LabConfig)
    #[error("invalid configuration {path}: {source}")]
    ConfigFormat {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Result alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
