//! Instruments mounted on the robot head
//!
//! An instrument is addressed by its [`Axis`]. Pipettes carry named plunger
//! positions and per-container calibration data; other instrument kinds have
//! neither concept.

use crate::deck::{Deck, PlaceableId};
use crate::error::{DeckError, HardwareError};
use crate::geometry::Vector;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Named plunger positions every pipette exposes, in display order
pub const PLUNGER_POSITIONS: [&str; 4] = ["top", "bottom", "blow_out", "drop_tip"];

/// Logical mount id (single letter, stored uppercase)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Axis(char);

impl Axis {
    /// Parse case-insensitively
    pub fn parse(name: &str) -> Result<Self, HardwareError> {
        let mut chars = name.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphabetic() => Ok(Self(c.to_ascii_uppercase())),
            _ => Err(HardwareError::InvalidAxis(name.to_string())),
        }
    }

    /// Uppercase letter
    #[inline]
    #[must_use]
    pub fn letter(self) -> char {
        self.0
    }
}

impl FromStr for Axis {
    type Err = HardwareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for Axis {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Instrument capability class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    /// Liquid-handling pipette with a plunger
    Pipette,
    /// Anything else mounted on an axis (magbead module, gripper...)
    Other,
}

impl InstrumentKind {
    /// Whether plunger positions and container calibration apply
    #[inline]
    #[must_use]
    pub fn is_calibratable(self) -> bool {
        matches!(self, Self::Pipette)
    }
}

/// Evidence that a container position has been captured
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    /// Head position minus expected container position
    pub delta: Vector,
}

/// Calibration records for the containers in one slot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotCalibration {
    /// Container label -> record
    pub children: BTreeMap<String, CalibrationRecord>,
}

/// slot name -> calibrated containers
pub type CalibrationData = BTreeMap<String, SlotCalibration>;

/// Persistable calibration state of one instrument
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstrumentCalibration {
    pub positions: IndexMap<String, Option<f64>>,
    pub calibration_data: CalibrationData,
}

/// Instrument on an axis
#[derive(Debug, Clone)]
pub struct Instrument {
    axis: Axis,
    name: String,
    kind: InstrumentKind,
    channels: u32,
    max_volume: f64,
    positions: IndexMap<String, Option<f64>>,
    calibration_data: CalibrationData,
    placeables: Vec<PlaceableId>,
}

impl Instrument {
    /// Create instrument of any kind
    #[must_use]
    pub fn new(axis: Axis, name: impl Into<String>, kind: InstrumentKind) -> Self {
        let positions = if kind.is_calibratable() {
            PLUNGER_POSITIONS.iter().map(|p| ((*p).to_string(), None)).collect()
        } else {
            IndexMap::new()
        };
        Self {
            axis,
            name: name.into(),
            kind,
            channels: 1,
            max_volume: 0.0,
            positions,
            calibration_data: CalibrationData::new(),
            placeables: Vec::new(),
        }
    }

    /// Create single-channel pipette
    #[inline]
    #[must_use]
    pub fn pipette(axis: Axis, name: impl Into<String>) -> Self {
        Self::new(axis, name, InstrumentKind::Pipette)
    }

    /// With channel count
    #[inline]
    #[must_use]
    pub fn with_channels(mut self, channels: u32) -> Self {
        self.channels = channels.max(1);
        self
    }

    /// With maximum volume in uL
    #[inline]
    #[must_use]
    pub fn with_max_volume(mut self, max_volume: f64) -> Self {
        self.max_volume = max_volume;
        self
    }

    #[inline]
    #[must_use]
    pub fn axis(&self) -> Axis {
        self.axis
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> InstrumentKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn channels(&self) -> u32 {
        self.channels
    }

    #[inline]
    #[must_use]
    pub fn max_volume(&self) -> f64 {
        self.max_volume
    }

    /// Named plunger positions, `None` while uncalibrated
    #[inline]
    #[must_use]
    pub fn positions(&self) -> &IndexMap<String, Option<f64>> {
        &self.positions
    }

    /// Value of one named position
    #[must_use]
    pub fn position(&self, name: &str) -> Option<f64> {
        self.positions.get(name).copied().flatten()
    }

    #[inline]
    #[must_use]
    pub fn calibration_data(&self) -> &CalibrationData {
        &self.calibration_data
    }

    /// Locations this instrument was asked to visit, in command order
    #[inline]
    #[must_use]
    pub fn placeables(&self) -> &[PlaceableId] {
        &self.placeables
    }

    pub(crate) fn record_placeable(&mut self, location: PlaceableId) {
        self.placeables.push(location);
    }

    /// Record a plunger position
    pub fn calibrate(&mut self, position: &str, value: f64) -> Result<(), HardwareError> {
        let slot = self
            .positions
            .get_mut(position)
            .ok_or_else(|| HardwareError::UnknownPosition(position.to_string()))?;
        *slot = Some(value);
        Ok(())
    }

    /// Record the offset between the head and `point` inside `container`
    ///
    /// `point` is relative to the container origin.
    pub fn calibrate_position(
        &mut self,
        deck: &Deck,
        container: PlaceableId,
        point: Vector,
        head: Vector,
    ) -> Result<&CalibrationData, HardwareError> {
        let node = deck.get(container)?;
        if !node.is_container() {
            return Err(DeckError::NotAContainer(container).into());
        }
        let slot = deck
            .slot_of(container)
            .ok_or(DeckError::UnknownPlaceable(container))?
            .to_string();

        let expected = deck.absolute_position(container) + point;
        self.calibration_data
            .entry(slot)
            .or_default()
            .children
            .insert(node.name().to_string(), CalibrationRecord { delta: head - expected });

        Ok(&self.calibration_data)
    }

    /// Copy of the persistable calibration state
    #[must_use]
    pub fn calibration_snapshot(&self) -> InstrumentCalibration {
        InstrumentCalibration {
            positions: self.positions.clone(),
            calibration_data: self.calibration_data.clone(),
        }
    }

    /// Re-hydrate from stored calibration, ignoring unknown position names
    pub fn restore_calibration(&mut self, stored: &InstrumentCalibration) {
        for (name, value) in &stored.positions {
            if let Some(slot) = self.positions.get_mut(name) {
                *slot = *value;
            }
        }
        self.calibration_data = stored.calibration_data.clone();
    }
}
