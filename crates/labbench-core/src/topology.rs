//! Which containers each instrument touches
//!
//! Containers are listed in canonical order: tip racks first, then
//! everything else, each group by case-insensitive label.

use labbench_hardware::{Deck, Instrument, PlaceableId};
use std::collections::BTreeSet;

/// Anything that sorts like a container
pub trait ContainerLike {
    fn label(&self) -> &str;
    fn container_type(&self) -> &str;
}

/// Check if a labware type is a tip rack
#[inline]
#[must_use]
pub fn is_tiprack(container_type: &str) -> bool {
    container_type.to_lowercase().contains("tip")
}

/// Sort into canonical order (stable)
pub fn sort_containers<C: ContainerLike>(containers: &mut [C]) {
    containers.sort_by_key(|c| (!is_tiprack(c.container_type()), c.label().to_lowercase()));
}

/// A container on the deck, resolved for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: PlaceableId,
    pub label: String,
    pub container_type: String,
    pub slot: String,
}

impl ContainerInfo {
    /// Resolve an attached container; `None` for wells and stale ids
    #[must_use]
    pub fn resolve(deck: &Deck, id: PlaceableId) -> Option<Self> {
        if !deck.is_attached(id) {
            return None;
        }
        let placeable = deck.get(id).ok()?;
        Some(Self {
            id,
            label: placeable.name().to_string(),
            container_type: placeable.container_type()?.to_string(),
            slot: deck.slot_of(id)?.to_string(),
        })
    }
}

impl ContainerLike for ContainerInfo {
    fn label(&self) -> &str {
        &self.label
    }

    fn container_type(&self) -> &str {
        &self.container_type
    }
}

/// Containers enclosing every location the instrument visited
pub fn unique_containers(deck: &Deck, instrument: &Instrument) -> Vec<ContainerInfo> {
    let ids: BTreeSet<PlaceableId> = instrument
        .placeables()
        .iter()
        .filter_map(|location| deck.enclosing_container(*location))
        .collect();
    let mut containers: Vec<_> = ids
        .into_iter()
        .filter_map(|id| ContainerInfo::resolve(deck, id))
        .collect();
    sort_containers(&mut containers);
    containers
}

/// Every container on the deck
pub fn all_containers(deck: &Deck) -> Vec<ContainerInfo> {
    let mut containers: Vec<_> = deck
        .containers()
        .into_values()
        .filter_map(|id| ContainerInfo::resolve(deck, id))
        .collect();
    sort_containers(&mut containers);
    containers
}

#[cfg(test)]
mod tests {
    use super::*;
    use labbench_hardware::{Action, Axis, Command, Robot};
    use pretty_assertions::assert_eq;

    fn labels(containers: &[ContainerInfo]) -> Vec<&str> {
        containers.iter().map(|c| c.label.as_str()).collect()
    }

    #[test]
    fn tipracks_sort_first() {
        let mut robot = Robot::new();
        robot.add_container("96-flat", "A1", "B").unwrap();
        robot.add_container("tiprack-200ul", "A2", "A").unwrap();
        robot.add_container("tiprack-10ul", "A3", "C").unwrap();

        assert_eq!(labels(&all_containers(robot.deck())), vec!["A", "C", "B"]);
    }

    #[test]
    fn unique_containers_deduplicates_wells() {
        let mut robot = Robot::new();
        let plate = robot.add_container("96-flat", "B1", "plate").unwrap();
        robot.add_container("96-flat", "B2", "unused").unwrap();
        let tips = robot.add_container("tiprack-200ul", "A1", "tips").unwrap();
        let axis = Axis::parse("b").unwrap();
        robot.add_instrument(labbench_hardware::Instrument::pipette(axis, "p200"));

        for location in [
            robot.deck().well(plate, "A1").unwrap(),
            robot.deck().well(plate, "H12").unwrap(),
            robot.deck().well_at(tips, 0).unwrap(),
            plate,
        ] {
            robot
                .enqueue(Command::instrument(axis, Action::MoveTo, Some(location)))
                .unwrap();
        }

        let instrument = robot.instrument(axis).unwrap();
        let containers = unique_containers(robot.deck(), instrument);
        assert_eq!(labels(&containers), vec!["tips", "plate"]);
        assert_eq!(containers[1].slot, "B1");
        assert_eq!(containers[1].container_type, "96-flat");
    }

    #[test]
    fn idle_instrument_has_no_containers() {
        let mut robot = Robot::new();
        robot.add_container("96-flat", "B1", "plate").unwrap();
        let axis = robot.add_instrument(labbench_hardware::Instrument::pipette(
            Axis::parse("a").unwrap(),
            "p10",
        ));
        let instrument = robot.instrument(axis).unwrap();
        assert!(unique_containers(robot.deck(), instrument).is_empty());
    }
}
