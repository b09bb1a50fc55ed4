//! Pipetting operations shared by both protocol front-ends
//!
//! Everything here only enqueues commands; nothing moves until the robot
//! simulates or runs its queue.

use labbench_hardware::{Action, Axis, Command, Deck, HardwareError, PlaceableId, Robot};

/// Hands out tips from a pipette's tip racks in column-major order
#[derive(Debug, Clone, Default)]
pub struct TipTracker {
    racks: Vec<PlaceableId>,
    used: usize,
}

impl TipTracker {
    #[inline]
    #[must_use]
    pub fn new(racks: Vec<PlaceableId>) -> Self {
        Self { racks, used: 0 }
    }

    /// Next unused tip, or `None` when the racks are exhausted
    pub fn next_tip(&mut self, deck: &Deck) -> Option<PlaceableId> {
        let mut remaining = self.used;
        for rack in &self.racks {
            let Ok(wells) = deck.wells(*rack) else {
                continue;
            };
            if remaining < wells.len() {
                self.used += 1;
                return Some(wells[remaining]);
            }
            remaining -= wells.len();
        }
        None
    }
}

/// Pipetting front-end for one mounted pipette
#[derive(Debug)]
pub struct Pipetting<'r> {
    robot: &'r mut Robot,
    axis: Axis,
}

impl<'r> Pipetting<'r> {
    /// Bind to the pipette on `axis`
    pub fn new(robot: &'r mut Robot, axis: Axis) -> Result<Self, HardwareError> {
        if robot.instrument(axis).is_none() {
            return Err(HardwareError::NoInstrument(axis));
        }
        Ok(Self { robot, axis })
    }

    fn enqueue(&mut self, action: Action, location: Option<PlaceableId>) -> Result<(), HardwareError> {
        self.robot
            .enqueue(Command::instrument(self.axis, action, location))
    }

    pub fn aspirate(&mut self, volume: f64, location: Option<PlaceableId>) -> Result<(), HardwareError> {
        self.enqueue(Action::Aspirate { volume }, location)
    }

    pub fn dispense(&mut self, volume: f64, location: Option<PlaceableId>) -> Result<(), HardwareError> {
        self.enqueue(Action::Dispense { volume }, location)
    }

    pub fn blow_out(&mut self, location: Option<PlaceableId>) -> Result<(), HardwareError> {
        self.enqueue(Action::BlowOut, location)
    }

    pub fn touch_tip(&mut self, location: Option<PlaceableId>) -> Result<(), HardwareError> {
        self.enqueue(Action::TouchTip, location)
    }

    pub fn move_to(&mut self, location: PlaceableId) -> Result<(), HardwareError> {
        self.enqueue(Action::MoveTo, Some(location))
    }

    pub fn delay(&mut self, seconds: f64) -> Result<(), HardwareError> {
        self.enqueue(Action::Delay { seconds }, None)
    }

    /// Pick up a tip, from the tip racks when no location is given
    pub fn pick_up_tip(
        &mut self,
        location: Option<PlaceableId>,
        tips: &mut TipTracker,
    ) -> Result<(), HardwareError> {
        let location = location.or_else(|| tips.next_tip(self.robot.deck()));
        self.enqueue(Action::PickUpTip, location)
    }

    pub fn drop_tip(&mut self, location: Option<PlaceableId>) -> Result<(), HardwareError> {
        self.enqueue(Action::DropTip, location)
    }

    /// Aspirate and dispense `volume` at one location, `repetitions` times
    ///
    /// Fails before queueing anything when the cycles would not fit.
    pub fn mix(
        &mut self,
        repetitions: u32,
        volume: f64,
        location: Option<PlaceableId>,
    ) -> Result<(), HardwareError> {
        let cycles = usize::try_from(repetitions).unwrap_or(usize::MAX);
        self.robot.reserve(cycles.saturating_mul(2))?;
        for _ in 0..repetitions {
            self.aspirate(volume, location)?;
            self.dispense(volume, None)?;
        }
        Ok(())
    }

    /// Move `volume` from `source` to `dest` with a single tip
    ///
    /// Volumes above the pipette's max volume are split into equal chunks.
    /// Fails before queueing anything when the trips would not fit.
    pub fn transfer(
        &mut self,
        volume: f64,
        source: PlaceableId,
        dest: PlaceableId,
        tips: &mut TipTracker,
        trash: Option<PlaceableId>,
    ) -> Result<(), HardwareError> {
        if !volume.is_finite() || volume <= 0.0 {
            return Err(HardwareError::InvalidVolume(volume));
        }
        let max_volume = self
            .robot
            .instrument(self.axis)
            .map_or(0.0, |p| p.max_volume());
        let chunks = if max_volume > 0.0 {
            (volume / max_volume).ceil().max(1.0)
        } else {
            1.0
        };
        let chunk = volume / chunks;
        // float to int casts saturate
        let trips = chunks as usize;
        self.robot.reserve(trips.saturating_mul(2).saturating_add(3))?;

        self.pick_up_tip(None, tips)?;
        for _ in 0..trips {
            self.aspirate(chunk, Some(source))?;
            self.dispense(chunk, Some(dest))?;
        }
        self.blow_out(None)?;
        self.drop_tip(trash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labbench_hardware::{HardwareControl, Instrument, RobotConfig};

    fn setup() -> (Robot, Axis, PlaceableId, PlaceableId) {
        let mut robot = Robot::new();
        let tips = robot.add_container("tiprack-200ul", "A1", "tiprack").unwrap();
        let plate = robot.add_container("96-flat", "B1", "plate").unwrap();
        let axis = Axis::parse("b").unwrap();
        robot.add_instrument(Instrument::pipette(axis, "p200").with_max_volume(200.0));
        (robot, axis, tips, plate)
    }

    #[test]
    fn tips_are_taken_in_order() {
        let (robot, _, tips, _) = setup();
        let mut tracker = TipTracker::new(vec![tips]);
        let deck = robot.deck();
        assert_eq!(tracker.next_tip(deck), Some(deck.well(tips, "A1").unwrap()));
        assert_eq!(tracker.next_tip(deck), Some(deck.well(tips, "B1").unwrap()));
    }

    #[test]
    fn empty_tracker_yields_nothing() {
        let (robot, _, _, _) = setup();
        let mut tracker = TipTracker::default();
        assert_eq!(tracker.next_tip(robot.deck()), None);
    }

    #[test]
    fn transfer_splits_large_volumes() {
        let (mut robot, axis, tips, plate) = setup();
        let src = robot.deck().well(plate, "A1").unwrap();
        let dst = robot.deck().well(plate, "A2").unwrap();
        let mut tracker = TipTracker::new(vec![tips]);

        Pipetting::new(&mut robot, axis)
            .unwrap()
            .transfer(300.0, src, dst, &mut tracker, None)
            .unwrap();

        let aspirates: Vec<f64> = robot
            .commands()
            .iter()
            .filter_map(|c| match c.action {
                Action::Aspirate { volume } => Some(volume),
                _ => None,
            })
            .collect();
        assert_eq!(aspirates, vec![150.0, 150.0]);
        assert!(robot.simulate().is_empty());
    }

    #[test]
    fn mix_alternates_aspirate_and_dispense() {
        let (mut robot, axis, _, plate) = setup();
        let well = robot.deck().well(plate, "C3").unwrap();
        Pipetting::new(&mut robot, axis)
            .unwrap()
            .mix(3, 50.0, Some(well))
            .unwrap();
        assert_eq!(robot.commands().len(), 6);
    }

    #[test]
    fn unknown_axis_is_rejected() {
        let (mut robot, _, _, _) = setup();
        let err = Pipetting::new(&mut robot, Axis::parse("a").unwrap()).unwrap_err();
        assert!(matches!(err, HardwareError::NoInstrument(_)));
    }

    fn capped(max_commands: usize) -> (Robot, Axis, PlaceableId, PlaceableId) {
        let mut robot = Robot::with_config(RobotConfig {
            max_commands,
            ..RobotConfig::default()
        })
        .unwrap();
        let tips = robot.add_container("tiprack-200ul", "A1", "tiprack").unwrap();
        let plate = robot.add_container("96-flat", "B1", "plate").unwrap();
        let axis = Axis::parse("a").unwrap();
        robot.add_instrument(Instrument::pipette(axis, "p1").with_max_volume(1.0));
        (robot, axis, tips, plate)
    }

    #[test]
    fn oversized_transfer_is_rejected_up_front() {
        let (mut robot, axis, tips, plate) = capped(1_000);
        let src = robot.deck().well(plate, "A1").unwrap();
        let dst = robot.deck().well(plate, "A2").unwrap();
        let mut tracker = TipTracker::new(vec![tips]);
        let mut pipette = Pipetting::new(&mut robot, axis).unwrap();

        let err = pipette.transfer(2_000_000.0, src, dst, &mut tracker, None).unwrap_err();
        assert!(matches!(err, HardwareError::QueueFull(1_000)));
        let err = pipette.transfer(1e300, src, dst, &mut tracker, None).unwrap_err();
        assert!(matches!(err, HardwareError::QueueFull(_)));
        for volume in [f64::INFINITY, f64::NAN] {
            let err = pipette.transfer(volume, src, dst, &mut tracker, None).unwrap_err();
            assert!(matches!(err, HardwareError::InvalidVolume(_)));
        }
        assert!(robot.commands().is_empty());
    }

    #[test]
    fn oversized_mix_is_rejected_up_front() {
        let (mut robot, axis, _, plate) = capped(1_000);
        let well = robot.deck().well(plate, "A1").unwrap();
        let mut pipette = Pipetting::new(&mut robot, axis).unwrap();

        let err = pipette.mix(1_000_000, 1.0, Some(well)).unwrap_err();
        assert!(matches!(err, HardwareError::QueueFull(1_000)));
        pipette.mix(500, 1.0, Some(well)).unwrap();
        assert!(matches!(pipette.delay(1.0), Err(HardwareError::QueueFull(_))));
        assert_eq!(robot.commands().len(), 1_000);
    }
}
