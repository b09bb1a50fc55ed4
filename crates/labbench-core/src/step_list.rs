//! Calibration step list
//!
//! One entry per pipette (by case-insensitive name) listing the containers
//! it touches and how much of it is calibrated. The list is cached between
//! calls; loads must [`invalidate`](StepListCache::invalidate) it since the
//! container set of an entry is never patched incrementally.

use crate::calibration::{is_container_calibrated, is_instrument_calibrated};
use crate::topology::{all_containers, unique_containers, ContainerInfo};
use labbench_hardware::{Deck, Instrument, Robot};
use serde::{Deserialize, Serialize};

/// A container an instrument touches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceableStep {
    #[serde(rename = "type")]
    pub container_type: String,
    pub label: String,
    pub slot: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibrated: Option<bool>,
}

impl PlaceableStep {
    fn matches(&self, container: &ContainerInfo) -> bool {
        self.label == container.label
            && self.slot == container.slot
            && self.container_type == container.container_type
    }
}

impl From<ContainerInfo> for PlaceableStep {
    fn from(container: ContainerInfo) -> Self {
        Self {
            container_type: container.container_type,
            label: container.label,
            slot: container.slot,
            calibrated: None,
        }
    }
}

/// One pipette in the step list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepListEntry {
    pub axis: String,
    /// Instrument name
    pub label: String,
    pub channels: u32,
    pub placeables: Vec<PlaceableStep>,
    pub top: Option<f64>,
    pub bottom: Option<f64>,
    pub blow_out: Option<f64>,
    pub drop_tip: Option<f64>,
    pub max_volume: f64,
    pub calibrated: bool,
}

impl StepListEntry {
    fn new(deck: &Deck, instrument: &Instrument) -> Self {
        Self {
            axis: instrument.axis().to_string(),
            label: instrument.name().to_string(),
            channels: instrument.channels(),
            placeables: unique_containers(deck, instrument)
                .into_iter()
                .map(PlaceableStep::from)
                .collect(),
            top: None,
            bottom: None,
            blow_out: None,
            drop_tip: None,
            max_volume: instrument.max_volume(),
            calibrated: false,
        }
    }

    fn update(&mut self, deck: &Deck, instrument: &Instrument, containers: &[ContainerInfo]) {
        self.top = instrument.position("top");
        self.bottom = instrument.position("bottom");
        self.blow_out = instrument.position("blow_out");
        self.drop_tip = instrument.position("drop_tip");
        self.max_volume = instrument.max_volume();
        self.calibrated = is_instrument_calibrated(instrument);

        for placeable in &mut self.placeables {
            if let Some(container) = containers.iter().find(|c| placeable.matches(c)) {
                placeable.calibrated = Some(is_container_calibrated(deck, instrument, container.id));
            }
        }
    }
}

/// Pipettes in step-list order
fn pipettes(robot: &Robot) -> Vec<&Instrument> {
    let mut pipettes: Vec<_> = robot
        .instruments()
        .filter(|instrument| instrument.kind().is_calibratable())
        .collect();
    pipettes.sort_by_key(|instrument| instrument.name().to_lowercase());
    pipettes
}

/// The current step list, if one was built
#[derive(Debug, Clone, Default)]
pub struct StepListCache {
    entries: Option<Vec<StepListEntry>>,
}

impl StepListCache {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached entries without recomputing
    #[inline]
    #[must_use]
    pub fn entries(&self) -> Option<&[StepListEntry]> {
        self.entries.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn is_built(&self) -> bool {
        self.entries.is_some()
    }

    /// Drop the cached list; the next refresh rebuilds it
    pub fn invalidate(&mut self) {
        if self.entries.take().is_some() {
            tracing::debug!("step list invalidated");
        }
    }

    /// Rebuild from the robot's current topology
    pub fn build(&mut self, robot: &Robot) -> &[StepListEntry] {
        let deck = robot.deck();
        let entries: Vec<_> = pipettes(robot)
            .into_iter()
            .map(|instrument| StepListEntry::new(deck, instrument))
            .collect();
        tracing::debug!(pipettes = entries.len(), "step list built");
        self.entries = Some(entries);
        self.refresh(robot)
    }

    /// Update calibration fields in place, building first if needed
    pub fn refresh(&mut self, robot: &Robot) -> &[StepListEntry] {
        if self.entries.is_none() {
            return self.build(robot);
        }
        let Some(entries) = self.entries.as_mut() else {
            return &[];
        };

        let deck = robot.deck();
        let containers = all_containers(deck);
        for entry in entries.iter_mut() {
            match robot.instrument_by_name(&entry.label) {
                Some(instrument) => entry.update(deck, instrument, &containers),
                None => tracing::warn!(instrument = %entry.label, "step list instrument no longer mounted"),
            }
        }
        entries
    }
}
