//! Calibration requests and calibration state queries
//!
//! Container calibration lives in the instrument's calibration data under
//! `slot -> children -> label`; plunger calibration is a non-empty named
//! position. Both are persisted by the robot's calibration store.

use crate::error::CalibrationError;
use labbench_hardware::{Axis, CalibrationData, Deck, HardwareError, Instrument, PlaceableId, Robot};

/// Mounted axis by case-insensitive name
fn mounted_axis(robot: &Robot, axis_name: &str) -> Result<Axis, CalibrationError> {
    let not_initialized = || CalibrationError::AxisNotInitialized(axis_name.trim().to_uppercase());
    let axis = Axis::parse(axis_name).map_err(|_| not_initialized())?;
    robot
        .instrument(axis)
        .map(|_| axis)
        .ok_or_else(not_initialized)
}

/// Record the head position as the bottom of the container's first well
///
/// Returns the instrument's complete calibration data.
pub fn calibrate_placeable(
    robot: &mut Robot,
    container_name: &str,
    axis_name: &str,
) -> Result<CalibrationData, CalibrationError> {
    let container = robot
        .deck()
        .container(container_name)
        .ok_or_else(|| CalibrationError::ContainerNotDefined(container_name.to_string()))?;
    let axis = mounted_axis(robot, axis_name)?;

    let deck = robot.deck();
    let point = deck
        .well_at(container, 0)
        .and_then(|well| deck.from_center(well, 0.0, 0.0, -1.0, container))
        .map_err(HardwareError::from)?;
    Ok(robot.calibrate_container(axis, container, point)?)
}

/// Record the current plunger position under `position`
pub fn calibrate_plunger(robot: &mut Robot, position: &str, axis_name: &str) -> Result<f64, CalibrationError> {
    let axis = mounted_axis(robot, axis_name)?;
    let known = robot
        .instrument(axis)
        .is_some_and(|instrument| instrument.positions().contains_key(position));
    if !known {
        return Err(CalibrationError::PositionNotOnPlunger(position.to_string()));
    }
    Ok(robot.calibrate_plunger(axis, position)?)
}

/// Check if the instrument holds calibration for the container
#[must_use]
pub fn is_container_calibrated(deck: &Deck, instrument: &Instrument, container: PlaceableId) -> bool {
    let (Some(slot), Ok(placeable)) = (deck.slot_of(container), deck.get(container)) else {
        return false;
    };
    instrument
        .calibration_data()
        .get(slot)
        .is_some_and(|calibration| calibration.children.contains_key(placeable.name()))
}

/// Check if every plunger position is set; always true for non-pipettes
#[must_use]
pub fn is_instrument_calibrated(instrument: &Instrument) -> bool {
    if !instrument.kind().is_calibratable() {
        return true;
    }
    instrument.positions().values().all(Option::is_some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use labbench_hardware::{HardwareControl, InstrumentKind, PLUNGER_POSITIONS};

    fn robot() -> Robot {
        let mut robot = Robot::new();
        robot.add_container("96-flat", "B1", "plate1").unwrap();
        robot.add_container("96-flat", "B2", "plate2").unwrap();
        robot.add_instrument(Instrument::pipette(Axis::parse("a").unwrap(), "p10"));
        robot
    }

    #[test]
    fn placeable_round_trip() {
        let mut robot = robot();
        let data = calibrate_placeable(&mut robot, "plate1", "a").unwrap();
        assert!(data["B1"].children.contains_key("plate1"));

        let deck = robot.deck();
        let instrument = robot.instrument(Axis::parse("A").unwrap()).unwrap();
        assert!(is_container_calibrated(deck, instrument, deck.container("plate1").unwrap()));
        assert!(!is_container_calibrated(deck, instrument, deck.container("plate2").unwrap()));
    }

    #[test]
    fn unknown_container_is_checked_before_axis() {
        let mut robot = robot();
        let err = calibrate_placeable(&mut robot, "missing", "z").unwrap_err();
        assert_eq!(err.to_string(), "Container missing is not defined");
    }

    #[test]
    fn unknown_axis_is_uppercased() {
        let mut robot = robot();
        let err = calibrate_placeable(&mut robot, "plate1", "b").unwrap_err();
        assert_eq!(err.to_string(), "Axis B is not initialized");

        let err = calibrate_plunger(&mut robot, "top", "Z").unwrap_err();
        assert!(err.to_string().contains("Axis Z is not initialized"));
    }

    #[test]
    fn plunger_positions_are_validated() {
        let mut robot = robot();
        let err = calibrate_plunger(&mut robot, "middle", "a").unwrap_err();
        assert_eq!(err.to_string(), "Position middle is not on the plunger");
    }

    #[test]
    fn instrument_calibrated_after_every_position() {
        let mut robot = robot();
        let axis = Axis::parse("a").unwrap();
        for (index, position) in PLUNGER_POSITIONS.iter().enumerate() {
            assert!(!is_instrument_calibrated(robot.instrument(axis).unwrap()));
            robot.move_plunger(axis, index as f64 + 1.0);
            assert_eq!(calibrate_plunger(&mut robot, position, "A").unwrap(), index as f64 + 1.0);
        }
        assert!(is_instrument_calibrated(robot.instrument(axis).unwrap()));
    }

    #[test]
    fn non_pipettes_are_always_calibrated() {
        let gripper = Instrument::new(Axis::parse("c").unwrap(), "gripper", InstrumentKind::Other);
        assert!(is_instrument_calibrated(&gripper));
    }
}
