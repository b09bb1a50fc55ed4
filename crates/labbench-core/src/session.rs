//! Lab session
//!
//! Owns the robot every operation runs against. A session gate serializes
//! loads, calibration and step-list access, so one operation completes
//! before the next observes the robot.

use crate::calibration;
use crate::config::LabConfig;
use crate::error::{CalibrationError, Result};
use crate::sandbox::{LoadResponse, ProtocolSandbox};
use crate::step_list::{StepListCache, StepListEntry};
use crate::topology::{self, ContainerInfo};
use labbench_hardware::{CalibrationData, Robot};
use labbench_protocol::SharedRobot;
use parking_lot::Mutex;
use std::sync::Arc;

/// Robot, sandbox and step-list cache behind one gate
pub struct LabSession {
    robot: SharedRobot,
    sandbox: ProtocolSandbox,
    steps: Mutex<StepListCache>,
    gate: Mutex<()>,
}

impl Default for LabSession {
    fn default() -> Self {
        Self::assemble(Robot::new(), ProtocolSandbox::default())
    }
}

impl LabSession {
    /// Session with default robot and interpreter limits
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Session from configuration, opening the calibration store if set
    pub fn from_config(config: &LabConfig) -> Result<Self> {
        let robot = Robot::with_config(config.robot.clone())?;
        Ok(Self::assemble(robot, ProtocolSandbox::new(config.scripting.clone())))
    }

    fn assemble(robot: Robot, sandbox: ProtocolSandbox) -> Self {
        Self {
            robot: Arc::new(Mutex::new(robot)),
            sandbox,
            steps: Mutex::new(StepListCache::new()),
            gate: Mutex::new(()),
        }
    }

    /// Load a JSON protocol, replacing whatever was loaded before
    pub fn load_declarative(&self, payload: &[u8]) -> LoadResponse {
        let _gate = self.gate.lock();
        self.steps.lock().invalidate();
        self.sandbox.load_declarative(&self.robot, payload)
    }

    /// Load a Lua protocol, replacing whatever was loaded before
    pub fn load_scripted(&self, payload: &[u8], name: &str) -> LoadResponse {
        let _gate = self.gate.lock();
        self.steps.lock().invalidate();
        self.sandbox.load_scripted(&self.robot, payload, name)
    }

    /// Rebuild the step list from the loaded protocol
    pub fn build_step_list(&self) -> Vec<StepListEntry> {
        let _gate = self.gate.lock();
        let robot = self.robot.lock();
        self.steps.lock().build(&robot).to_vec()
    }

    /// Refresh calibration state in the step list, building it if absent
    pub fn refresh_step_list(&self) -> Vec<StepListEntry> {
        let _gate = self.gate.lock();
        let robot = self.robot.lock();
        self.steps.lock().refresh(&robot).to_vec()
    }

    /// Calibrate a container for the pipette on `axis_name`
    pub fn calibrate_placeable(
        &self,
        container_name: &str,
        axis_name: &str,
    ) -> std::result::Result<CalibrationData, CalibrationError> {
        let _gate = self.gate.lock();
        calibration::calibrate_placeable(&mut self.robot.lock(), container_name, axis_name)
    }

    /// Calibrate a named plunger position for the pipette on `axis_name`
    pub fn calibrate_plunger(&self, position: &str, axis_name: &str) -> std::result::Result<(), CalibrationError> {
        let _gate = self.gate.lock();
        calibration::calibrate_plunger(&mut self.robot.lock(), position, axis_name).map(|_| ())
    }

    /// Every container on the deck in canonical order
    pub fn all_containers(&self) -> Vec<ContainerInfo> {
        let _gate = self.gate.lock();
        topology::all_containers(self.robot.lock().deck())
    }

    /// Run `f` with exclusive access to the robot
    pub fn with_robot<R>(&self, f: impl FnOnce(&mut Robot) -> R) -> R {
        let _gate = self.gate.lock();
        f(&mut self.robot.lock())
    }
}
