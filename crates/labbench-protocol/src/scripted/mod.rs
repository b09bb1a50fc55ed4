//! Scripted (Lua) protocols
//!
//! Protocols run in a fresh interpreter per load with only the `table`,
//! `string`, `math` and `utf8` libraries. The robot is reached through the
//! `robot`, `containers` and `instruments` globals.
//!
//! ```lua
//! local tiprack = containers.load('tiprack-200ul', 'A1', 'tiprack')
//! local plate = containers.load('96-flat', 'B1', 'plate')
//! local p200 = instruments.Pipette{axis = 'b', name = 'p200', max_volume = 200,
//!                                  tip_racks = {tiprack}}
//! p200:transfer(100, plate:well('A1'), plate:well('B1'))
//! ```

mod bindings;
mod fault;

use crate::error::ScriptFault;
use labbench_hardware::Robot;
use mlua::prelude::*;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Robot shared between the session and interpreter callbacks
pub type SharedRobot = Arc<Mutex<Robot>>;

/// Chunk name protocol errors are reported under
pub(crate) const CHUNK_NAME: &str = "=protocol";

/// Interpreter limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Heap ceiling for one protocol run, 0 for unlimited
    pub memory_limit_bytes: usize,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            memory_limit_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Runs protocol source against a shared robot
#[derive(Debug, Clone, Default)]
pub struct ScriptRunner {
    config: ScriptConfig,
}

impl ScriptRunner {
    #[inline]
    #[must_use]
    pub fn new(config: ScriptConfig) -> Self {
        Self { config }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &ScriptConfig {
        &self.config
    }

    /// Execute `source` to completion
    ///
    /// The robot must not be locked by the caller; callbacks take the lock
    /// per call.
    ///
    /// # Errors
    ///
    /// A [`ScriptFault`] located in `source` when the protocol raises, or a
    /// harness fault (line 0) when the interpreter itself fails.
    pub fn run(&self, source: &str, robot: &SharedRobot) -> Result<(), ScriptFault> {
        let lua = self
            .interpreter()
            .map_err(|e| ScriptFault::harness(e.to_string()))?;
        bindings::install(&lua, robot).map_err(|e| ScriptFault::harness(e.to_string()))?;

        lua.load(source)
            .set_name(CHUNK_NAME)
            .exec()
            .map_err(|e| fault::classify(&e, source))
    }

    fn interpreter(&self) -> LuaResult<Lua> {
        let lua = Lua::new_with(
            LuaStdLib::TABLE | LuaStdLib::STRING | LuaStdLib::MATH | LuaStdLib::UTF8,
            LuaOptions::new(),
        )?;
        if self.config.memory_limit_bytes > 0 {
            lua.set_memory_limit(self.config.memory_limit_bytes)?;
        }
        Ok(lua)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared() -> SharedRobot {
        Arc::new(Mutex::new(Robot::new()))
    }

    #[test]
    fn runs_protocol_against_robot() {
        let robot = shared();
        ScriptRunner::default()
            .run(
                "local plate = containers.load('96-flat', 'B1', 'plate')\nrobot:comment(plate:name())",
                &robot,
            )
            .unwrap();
        let robot = robot.lock();
        assert!(robot.deck().container("plate").is_some());
        assert_eq!(robot.commands().len(), 1);
    }

    #[test]
    fn filesystem_libraries_are_absent() {
        let fault = ScriptRunner::default()
            .run("local f = io.open('/etc/passwd')", &shared())
            .unwrap_err();
        assert_eq!(fault.line, 1);

        for snippet in ["os.exit(1)", "dofile('x.lua')", "require('socket')"] {
            assert!(ScriptRunner::default().run(snippet, &shared()).is_err(), "{snippet}");
        }
    }

    #[test]
    fn syntax_errors_are_located() {
        let fault = ScriptRunner::default()
            .run("robot:comment('ok')\n\nlocal = 3", &shared())
            .unwrap_err();
        assert_eq!(fault.line, 3);
        assert_eq!(fault.snippet.as_deref(), Some("local = 3"));
    }

    #[test]
    fn memory_limit_is_enforced() {
        let runner = ScriptRunner::new(ScriptConfig {
            memory_limit_bytes: 256 * 1024,
        });
        let fault = runner
            .run("local t = {}\nfor i = 1, 1e7 do t[i] = string.rep('x', 64) .. i end", &shared())
            .unwrap_err();
        assert!(!fault.message.is_empty());
    }
}
