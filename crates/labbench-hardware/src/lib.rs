//! labbench Hardware Model
//!
//! A simulated liquid-handling robot that protocols are resolved against.
//!
//! # Core Concepts
//!
//! - [`Robot`]: owns the deck, instruments, command queue and calibration store
//! - [`Deck`]: arena of placeables (`Deck -> Slot -> Container -> Well`)
//! - [`Instrument`]: pipette (or other tool) mounted on an [`Axis`]
//! - [`HardwareControl`]: the destructive operations, suppressed in
//!   [`ExecutionMode::Sandboxed`]
//!
//! # Example
//!
//! ```rust,ignore
//! use labbench_hardware::{Axis, Instrument, Robot, HardwareControl};
//!
//! let mut robot = Robot::new();
//! let plate = robot.add_container("96-flat", "B1", "plate")?;
//! robot.add_instrument(Instrument::pipette(Axis::parse("b")?, "p200").with_max_volume(200.0));
//! let warnings = robot.simulate();
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
mod calibration_store;
mod command;
mod deck;
mod driver;
mod error;
mod geometry;
mod instrument;
pub mod labware;
mod robot;

// Re-exports
pub use calibration_store::CalibrationStore;
pub use command::{Action, Command};
pub use deck::{Deck, Placeable, PlaceableId, PlaceableKind, DEFAULT_SLOT_SIZE};
pub use driver::{Motion, VirtualDriver, VIRTUAL_PORT};
pub use error::{DeckError, HardwareError};
pub use geometry::Vector;
pub use instrument::{
    Axis, CalibrationData, CalibrationRecord, Instrument, InstrumentCalibration, InstrumentKind,
    SlotCalibration, PLUNGER_POSITIONS,
};
pub use labware::LabwareDefinition;
pub use robot::{DestructiveOp, ExecutionMode, HardwareControl, Robot, RobotConfig, DEFAULT_MAX_COMMANDS};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
