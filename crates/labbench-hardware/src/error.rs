//! Error types for the hardware model
//!
//! Covers:
//! - Deck layout violations (unknown slots, occupied slots, duplicate labels)
//! - Instrument lookups and plunger positions
//! - Virtual driver state (connection)
//! - Calibration storage I/O

use crate::deck::PlaceableId;
use crate::instrument::Axis;
use std::path::PathBuf;

/// Deck layout errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeckError {
    /// Slot name not on this deck
    #[error("unknown slot: '{0}'")]
    UnknownSlot(String),

    /// Slot already holds a container
    #[error("slot {slot} is already occupied by '{occupant}'")]
    SlotOccupied { slot: String, occupant: String },

    /// Container label already used elsewhere on the deck
    #[error("container label '{0}' is already in use")]
    DuplicateLabel(String),

    /// Stale or foreign placeable id
    #[error("unknown placeable: {0}")]
    UnknownPlaceable(PlaceableId),

    /// No container with this label on the deck
    #[error("container '{0}' is not on the deck")]
    UnknownContainer(String),

    /// Placeable is not a container
    #[error("placeable {0} is not a container")]
    NotAContainer(PlaceableId),

    /// Well not found in container
    #[error("container '{container}' has no well '{well}'")]
    UnknownWell { container: String, well: String },
}

/// Main hardware model error type
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Deck layout error
    #[error("deck error: {0}")]
    Deck(#[from] DeckError),

    /// Labware type missing from the catalog
    #[error("unknown labware type: '{0}'")]
    UnknownLabware(String),

    /// Axis name is not a single letter
    #[error("invalid axis name: '{0}'")]
    InvalidAxis(String),

    /// No instrument mounted on the axis
    #[error("no instrument on axis {0}")]
    NoInstrument(Axis),

    /// Named plunger position does not exist
    #[error("unknown plunger position: '{0}'")]
    UnknownPosition(String),

    /// Volume outside the physically meaningful range
    #[error("invalid volume: {0}")]
    InvalidVolume(f64),

    /// Command queue ceiling reached
    #[error("protocol exceeds the limit of {0} queued commands")]
    QueueFull(usize),

    /// Motion requested without a driver connection
    #[error("robot is not connected")]
    NotConnected,

    /// Calibration file could not be read or written
    #[error("calibration storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Calibration file is not valid JSON
    #[error("calibration storage format error: {0}")]
    StorageFormat(#[from] serde_json::Error),
}

impl HardwareError {
    /// Create storage error for path
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Check if the error comes from protocol input rather than the model itself
    #[inline]
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        !matches!(self, Self::Storage { .. } | Self::StorageFormat(_))
    }
}
