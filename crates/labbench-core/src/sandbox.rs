//! Protocol loading under sandbox
//!
//! Both loads reset the robot first and report every problem as data in a
//! [`LoadResponse`]; nothing a protocol does escapes as an `Err` or panic
//! from the interpreter.
//!
//! Scripted protocols run with the robot switched to
//! [`ExecutionMode::Sandboxed`], so `connect`, `disconnect`, `move_head`,
//! `move_plunger`, `reset`, `run` and `simulate` called from protocol code
//! are no-ops. A [`SandboxGuard`] switches the mode back exactly once before
//! the real simulation runs.

use labbench_hardware::{ExecutionMode, HardwareControl};
use labbench_protocol::{DeclarativeProcessor, ScriptConfig, ScriptRunner, SharedRobot};
use serde::{Deserialize, Serialize};

/// Sole error reported for declarative payloads that are not JSON
pub const INVALID_JSON: &str = "Cannot parse invalid JSON";

/// Outcome of a protocol load
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadResponse {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl LoadResponse {
    /// Check if the protocol loaded without errors
    #[inline]
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Keeps the robot sandboxed until restored or dropped
///
/// The previous mode is put back once: an explicit [`restore`](Self::restore)
/// disarms the restore in `Drop`.
#[must_use = "the robot leaves sandbox mode as soon as the guard is dropped"]
pub struct SandboxGuard<'a> {
    robot: &'a SharedRobot,
    previous: Option<ExecutionMode>,
}

impl<'a> SandboxGuard<'a> {
    /// Switch the robot to [`ExecutionMode::Sandboxed`]
    pub fn enter(robot: &'a SharedRobot) -> Self {
        let previous = robot.lock().set_mode(ExecutionMode::Sandboxed);
        tracing::debug!(?previous, "entered sandbox");
        Self {
            robot,
            previous: Some(previous),
        }
    }

    /// Put the previous mode back; returns false if already restored
    pub fn restore(&mut self) -> bool {
        match self.previous.take() {
            Some(previous) => {
                self.robot.lock().set_mode(previous);
                tracing::debug!(mode = ?previous, "left sandbox");
                true
            }
            None => false,
        }
    }

    /// Check if the guard still has a mode to restore
    #[inline]
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.previous.is_some()
    }
}

impl Drop for SandboxGuard<'_> {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Loads protocols into a shared robot
#[derive(Debug, Clone, Default)]
pub struct ProtocolSandbox {
    runner: ScriptRunner,
}

impl ProtocolSandbox {
    #[must_use]
    pub fn new(config: ScriptConfig) -> Self {
        Self {
            runner: ScriptRunner::new(config),
        }
    }

    /// Load a JSON protocol and simulate it
    ///
    /// Simulation is skipped when processing fails; the processor's
    /// errors and warnings are still returned.
    pub fn load_declarative(&self, robot: &SharedRobot, payload: &[u8]) -> LoadResponse {
        let text = String::from_utf8_lossy(payload);
        let mut robot = robot.lock();
        robot.reset();

        let mut response = LoadResponse::default();
        let mut processor = DeclarativeProcessor::new(text);
        match processor.process(&mut robot) {
            Ok(()) => {
                response.warnings.extend_from_slice(processor.warnings());
                response.warnings.extend(robot.simulate());
            }
            Err(e) if e.is_syntax() => {
                tracing::warn!(error = %e, "declarative protocol is not valid JSON");
                response.errors.push(INVALID_JSON.to_string());
            }
            Err(e) => {
                response.errors.push(e.to_string());
                response.errors.extend_from_slice(processor.errors());
                response.warnings.extend_from_slice(processor.warnings());
            }
        }

        tracing::info!(
            errors = response.errors.len(),
            warnings = response.warnings.len(),
            "declarative protocol loaded"
        );
        response
    }

    /// Run a Lua protocol sandboxed, then simulate it for real
    ///
    /// A protocol fault is the sole error; warnings only come from the
    /// final simulation.
    pub fn load_scripted(&self, robot: &SharedRobot, payload: &[u8], name: &str) -> LoadResponse {
        let source = String::from_utf8_lossy(payload);
        robot.lock().reset();

        let outcome = {
            let mut guard = SandboxGuard::enter(robot);
            let outcome = self.runner.run(&source, robot);
            guard.restore();
            outcome
        };

        let mut response = LoadResponse::default();
        match outcome {
            Ok(()) => response.warnings = robot.lock().simulate(),
            Err(fault) => {
                tracing::warn!(protocol = name, line = fault.line, message = %fault.message, "scripted protocol failed");
                response.errors.push(fault.to_string());
            }
        }

        tracing::info!(
            protocol = name,
            errors = response.errors.len(),
            warnings = response.warnings.len(),
            "scripted protocol loaded"
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labbench_hardware::{DestructiveOp, Robot};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn shared() -> SharedRobot {
        Arc::new(Mutex::new(Robot::new()))
    }

    #[test]
    fn guard_restores_exactly_once() {
        let robot = shared();
        let mut guard = SandboxGuard::enter(&robot);
        assert_eq!(robot.lock().mode(), ExecutionMode::Sandboxed);

        assert!(guard.restore());
        assert!(!guard.is_armed());
        assert_eq!(robot.lock().mode(), ExecutionMode::Live);

        // a later switch must survive the guard's drop
        robot.lock().set_mode(ExecutionMode::Sandboxed);
        assert!(!guard.restore());
        drop(guard);
        assert_eq!(robot.lock().mode(), ExecutionMode::Sandboxed);
    }

    #[test]
    fn guard_restores_on_drop() {
        let robot = shared();
        {
            let _guard = SandboxGuard::enter(&robot);
            assert_eq!(robot.lock().mode(), ExecutionMode::Sandboxed);
        }
        assert_eq!(robot.lock().mode(), ExecutionMode::Live);
    }

    #[test]
    fn invalid_json_is_a_single_error() {
        let response = ProtocolSandbox::default().load_declarative(&shared(), b"{not json");
        assert_eq!(response.errors, vec![INVALID_JSON.to_string()]);
        assert!(response.warnings.is_empty());
    }

    #[test]
    fn failed_script_still_restores_mode() {
        let robot = shared();
        let response = ProtocolSandbox::default().load_scripted(
            &robot,
            b"robot:reset()\nerror('stop')",
            "fail.lua",
        );
        assert_eq!(response.errors.len(), 1);
        assert!(response.errors[0].contains("line 2"));

        let robot = robot.lock();
        assert_eq!(robot.mode(), ExecutionMode::Live);
        assert_eq!(robot.suppressed_calls(DestructiveOp::Reset), 1);
    }
}
