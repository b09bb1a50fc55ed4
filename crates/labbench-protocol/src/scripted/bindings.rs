//! Lua globals exposed to scripted protocols
//!
//! Callbacks lock the shared robot only for the duration of a single call,
//! never across protocol statements.

use super::SharedRobot;
use crate::liquid::{Pipetting, TipTracker};
use labbench_hardware::{
    Action, Axis, Command, HardwareControl, HardwareError, Instrument, PlaceableId, Vector,
};
use mlua::prelude::*;

/// Base-library functions that reach the filesystem or load bytecode
const REMOVED_GLOBALS: [&str; 4] = ["dofile", "loadfile", "load", "require"];

fn lua_error(error: impl std::fmt::Display) -> LuaError {
    LuaError::RuntimeError(error.to_string())
}

/// Seed the interpreter with `robot`, `containers` and `instruments`
pub(crate) fn install(lua: &Lua, robot: &SharedRobot) -> LuaResult<()> {
    let globals = lua.globals();
    for name in REMOVED_GLOBALS {
        globals.set(name, LuaValue::Nil)?;
    }
    globals.set(
        "print",
        lua.create_function(|_, parts: LuaVariadic<String>| {
            tracing::info!(target: "labbench::protocol", "{}", parts.join("\t"));
            Ok(())
        })?,
    )?;

    globals.set(
        "robot",
        RobotHandle {
            robot: robot.clone(),
        },
    )?;

    let containers = lua.create_table()?;
    let shared = robot.clone();
    containers.set(
        "load",
        lua.create_function(
            move |_, (container_type, slot, label): (String, String, Option<String>)| {
                let label = label.unwrap_or_else(|| container_type.clone());
                let id = shared
                    .lock()
                    .add_container(&container_type, &slot, &label)
                    .map_err(lua_error)?;
                Ok(PlaceableHandle {
                    id,
                    robot: shared.clone(),
                })
            },
        )?,
    )?;
    globals.set("containers", containers)?;

    let instruments = lua.create_table()?;
    let shared = robot.clone();
    instruments.set(
        "Pipette",
        lua.create_function(move |_, spec: LuaTable| PipetteHandle::mount(&shared, &spec))?,
    )?;
    globals.set("instruments", instruments)?;
    Ok(())
}

fn location(handle: Option<LuaAnyUserData>) -> LuaResult<Option<PlaceableId>> {
    handle
        .map(|ud| ud.borrow::<PlaceableHandle>().map(|placeable| placeable.id))
        .transpose()
}

/// `robot` global
#[derive(Clone)]
struct RobotHandle {
    robot: SharedRobot,
}

impl LuaUserData for RobotHandle {
    fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("connect", |_, this, port: Option<String>| {
            this.robot.lock().connect(port.as_deref());
            Ok(())
        });
        methods.add_method("disconnect", |_, this, ()| {
            this.robot.lock().disconnect();
            Ok(())
        });
        methods.add_method("move_head", |_, this, (x, y, z): (f64, f64, f64)| {
            this.robot.lock().move_head(Vector::new(x, y, z));
            Ok(())
        });
        methods.add_method("move_plunger", |_, this, (axis, position): (String, f64)| {
            let axis = Axis::parse(&axis).map_err(lua_error)?;
            this.robot.lock().move_plunger(axis, position);
            Ok(())
        });
        methods.add_method("reset", |_, this, ()| {
            this.robot.lock().reset();
            Ok(())
        });
        methods.add_method("run", |_, this, ()| this.robot.lock().run().map_err(lua_error));
        methods.add_method("simulate", |_, this, ()| Ok(this.robot.lock().simulate()));
        methods.add_method("home", |_, this, ()| {
            this.robot
                .lock()
                .enqueue(Command::robot(Action::Home))
                .map_err(lua_error)
        });
        methods.add_method("comment", |_, this, text: String| {
            this.robot
                .lock()
                .enqueue(Command::robot(Action::Comment(text)))
                .map_err(lua_error)
        });
    }
}

/// A container or well on the deck
#[derive(Clone)]
struct PlaceableHandle {
    id: PlaceableId,
    robot: SharedRobot,
}

impl PlaceableHandle {
    fn child(&self, id: PlaceableId) -> Self {
        Self {
            id,
            robot: self.robot.clone(),
        }
    }
}

impl LuaUserData for PlaceableHandle {
    fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
        // wells by name ("A1") or 1-based column-major index
        methods.add_method("well", |_, this, key: LuaValue| {
            let robot = this.robot.lock();
            let deck = robot.deck();
            let well = match key {
                LuaValue::Integer(index) if index >= 1 => deck.well_at(this.id, (index - 1) as usize),
                LuaValue::Number(index) if index >= 1.0 && index.fract() == 0.0 => {
                    deck.well_at(this.id, index as usize - 1)
                }
                LuaValue::String(name) => deck.well(this.id, &name.to_string_lossy()),
                other => {
                    return Err(lua_error(format!(
                        "well reference must be a name or positive index, got {}",
                        other.type_name()
                    )))
                }
            }
            .map_err(lua_error)?;
            Ok(this.child(well))
        });
        methods.add_method("name", |_, this, ()| {
            let robot = this.robot.lock();
            let placeable = robot.deck().get(this.id).map_err(lua_error)?;
            Ok(placeable.name().to_string())
        });
        methods.add_method("slot", |_, this, ()| {
            let robot = this.robot.lock();
            let deck = robot.deck();
            Ok(deck
                .enclosing_container(this.id)
                .and_then(|container| deck.slot_of(container))
                .map(str::to_string))
        });
        methods.add_method("type", |_, this, ()| {
            let robot = this.robot.lock();
            let deck = robot.deck();
            Ok(deck
                .enclosing_container(this.id)
                .and_then(|container| deck.get(container).ok())
                .and_then(|container| container.container_type())
                .map(str::to_string))
        });
        methods.add_meta_method(LuaMetaMethod::ToString, |_, this, ()| {
            Ok(this.robot.lock().deck().describe(this.id))
        });
    }
}

/// A pipette mounted by `instruments.Pipette{...}`
struct PipetteHandle {
    axis: Axis,
    robot: SharedRobot,
    tips: TipTracker,
    trash: Option<PlaceableId>,
}

impl PipetteHandle {
    fn mount(robot: &SharedRobot, spec: &LuaTable) -> LuaResult<Self> {
        let axis: Option<String> = spec.get("axis")?;
        let axis = axis.ok_or_else(|| lua_error("Pipette requires an axis"))?;
        let axis = Axis::parse(&axis).map_err(lua_error)?;
        let name: Option<String> = spec.get("name")?;
        let max_volume: Option<f64> = spec.get("max_volume")?;
        let channels: Option<u32> = spec.get("channels")?;
        let racks: Option<Vec<LuaAnyUserData>> = spec.get("tip_racks")?;
        let trash: Option<LuaAnyUserData> = spec.get("trash")?;

        let racks = racks
            .unwrap_or_default()
            .into_iter()
            .map(|rack| rack.borrow::<PlaceableHandle>().map(|placeable| placeable.id))
            .collect::<LuaResult<Vec<_>>>()?;
        let trash = location(trash)?;

        let name = name.unwrap_or_else(|| format!("pipette_{}", axis.letter().to_ascii_lowercase()));
        let mut instrument = Instrument::pipette(axis, name).with_channels(channels.unwrap_or(1));
        if let Some(max_volume) = max_volume {
            instrument = instrument.with_max_volume(max_volume);
        }
        robot.lock().add_instrument(instrument);

        Ok(Self {
            axis,
            robot: robot.clone(),
            tips: TipTracker::new(racks),
            trash,
        })
    }

    fn with<R>(
        &mut self,
        operation: impl FnOnce(&mut Pipetting<'_>, &mut TipTracker, Option<PlaceableId>) -> Result<R, HardwareError>,
    ) -> LuaResult<R> {
        let mut robot = self.robot.lock();
        let mut pipette = Pipetting::new(&mut robot, self.axis).map_err(lua_error)?;
        operation(&mut pipette, &mut self.tips, self.trash).map_err(lua_error)
    }
}

impl LuaUserData for PipetteHandle {
    fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
        methods.add_method_mut(
            "aspirate",
            |_, this, (volume, at): (f64, Option<LuaAnyUserData>)| {
                let at = location(at)?;
                this.with(|pipette, _, _| pipette.aspirate(volume, at))
            },
        );
        methods.add_method_mut(
            "dispense",
            |_, this, (volume, at): (f64, Option<LuaAnyUserData>)| {
                let at = location(at)?;
                this.with(|pipette, _, _| pipette.dispense(volume, at))
            },
        );
        methods.add_method_mut(
            "mix",
            |_, this, (repetitions, volume, at): (u32, f64, Option<LuaAnyUserData>)| {
                let at = location(at)?;
                this.with(|pipette, _, _| pipette.mix(repetitions, volume, at))
            },
        );
        methods.add_method_mut("pick_up_tip", |_, this, at: Option<LuaAnyUserData>| {
            let at = location(at)?;
            this.with(|pipette, tips, _| pipette.pick_up_tip(at, tips))
        });
        methods.add_method_mut("drop_tip", |_, this, at: Option<LuaAnyUserData>| {
            let at = location(at)?;
            this.with(|pipette, _, trash| pipette.drop_tip(at.or(trash)))
        });
        methods.add_method_mut("blow_out", |_, this, at: Option<LuaAnyUserData>| {
            let at = location(at)?;
            this.with(|pipette, _, _| pipette.blow_out(at))
        });
        methods.add_method_mut("touch_tip", |_, this, at: Option<LuaAnyUserData>| {
            let at = location(at)?;
            this.with(|pipette, _, _| pipette.touch_tip(at))
        });
        methods.add_method_mut("move_to", |_, this, at: LuaAnyUserData| {
            let at = at.borrow::<PlaceableHandle>()?.id;
            this.with(|pipette, _, _| pipette.move_to(at))
        });
        methods.add_method_mut("delay", |_, this, seconds: f64| {
            this.with(|pipette, _, _| pipette.delay(seconds))
        });
        methods.add_method_mut(
            "transfer",
            |_, this, (volume, source, dest): (f64, LuaAnyUserData, LuaAnyUserData)| {
                let source = source.borrow::<PlaceableHandle>()?.id;
                let dest = dest.borrow::<PlaceableHandle>()?.id;
                this.with(|pipette, tips, trash| pipette.transfer(volume, source, dest, tips, trash))
            },
        );
        methods.add_meta_method(LuaMetaMethod::ToString, |_, this, ()| {
            let robot = this.robot.lock();
            let name = robot
                .instrument(this.axis)
                .map_or("unmounted", |instrument| instrument.name());
            Ok(format!("{name} on axis {}", this.axis))
        });
    }
}
