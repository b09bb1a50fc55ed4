//! Testing utilities for the labbench workspace
//!
//! Shared protocol fixtures and session helpers.

#![allow(missing_docs)]

use labbench_core::{LabConfig, LabSession};
use labbench_hardware::{Axis, Instrument, Robot};
use std::path::Path;

/// Declarative protocol: one pipette on axis B transferring between plate wells
pub const DECLARATIVE_TRANSFER: &str = r#"{
    "deck": {
        "tiprack": {"labware": "tiprack-200ul", "slot": "A1"},
        "plate1": {"labware": "96-flat", "slot": "B1"},
        "plate2": {"labware": "96-flat", "slot": "B2"},
        "trash": {"labware": "point", "slot": "C1"}
    },
    "head": {
        "p200": {
            "tool": "pipette",
            "axis": "b",
            "volume": 200,
            "tip-racks": [{"container": "tiprack"}],
            "trash-container": {"container": "trash"}
        }
    },
    "instructions": [
        {
            "tool": "p200",
            "groups": [
                {"transfer": [
                    {"from": {"container": "plate1", "location": "A1"},
                     "to": {"container": "plate2", "location": "A1"},
                     "volume": 100}
                ]},
                {"mix": [{"container": "plate2", "location": "A1", "volume": 50}]}
            ]
        }
    ]
}"#;

/// Scripted protocol: pipettes on axes A and B across two plates
pub const SCRIPTED_TRANSFER: &str = r#"
local tiprack = containers.load('tiprack-200ul', 'A1', 'tiprack')
local plate1 = containers.load('96-flat', 'B1', 'plate1')
local plate2 = containers.load('96-flat', 'B2', 'plate2')
local trash = containers.load('point', 'C1', 'trash')

local p200 = instruments.Pipette{axis = 'b', name = 'p200', max_volume = 200,
                                 tip_racks = {tiprack}, trash = trash}
local p10 = instruments.Pipette{axis = 'a', name = 'p10', max_volume = 10, channels = 8}

p200:transfer(100, plate1:well('A1'), plate2:well('A1'))
p10:move_to(plate1:well('H12'))
"#;

/// Scripted protocol that calls every destructive robot method
pub const SCRIPTED_DESTRUCTIVE: &str = r#"
robot:connect()
robot:move_head(50, 50, 50)
robot:move_plunger('a', 3)
robot:disconnect()
robot:reset()
robot:run()
robot:simulate()
"#;

/// Scripted protocol raising on its second line
pub const SCRIPTED_ERROR_LINE_2: &str = "local plate = containers.load('96-flat', 'B1', 'plate1')\nerror('protocol aborted')\n";

pub fn setup_session() -> LabSession {
    LabSession::new()
}

/// Session persisting calibration to `path`
pub fn setup_session_with_store(path: &Path) -> LabSession {
    let config = LabConfig::new().with_calibration_path(path);
    LabSession::from_config(&config).unwrap()
}

/// Session with [`SCRIPTED_TRANSFER`] loaded
pub fn setup_loaded_session() -> LabSession {
    let session = setup_session();
    let response = session.load_scripted(SCRIPTED_TRANSFER.as_bytes(), "transfer.lua");
    assert!(response.is_ok(), "fixture protocol failed: {:?}", response.errors);
    session
}

pub fn axis(name: &str) -> Axis {
    Axis::parse(name).unwrap()
}

/// Robot with a tip rack, a plate and a p200 on axis B
pub fn create_test_robot() -> Robot {
    let mut robot = Robot::new();
    robot.add_container("tiprack-200ul", "A1", "tiprack").unwrap();
    robot.add_container("96-flat", "B1", "plate1").unwrap();
    robot.add_instrument(Instrument::pipette(axis("b"), "p200").with_max_volume(200.0));
    robot
}
