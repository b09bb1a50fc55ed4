//! Declarative protocol processor
//!
//! Validation problems are collected rather than returned one at a time so
//! a client sees every broken reference in a single load.

use super::{ConsolidateGroup, DeckEntry, DistributeGroup, Group, HeadEntry, Instruction, MixStep, TransferStep, WellRef};
use crate::error::DeclarativeError;
use crate::liquid::{Pipetting, TipTracker};
use labbench_hardware::{Axis, DeckError, HardwareError, Instrument, PlaceableId, Robot};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const SECTIONS: [&str; 3] = ["deck", "head", "instructions"];

/// A pipette declared in the `head` section
#[derive(Debug)]
struct Tool {
    axis: Axis,
    max_volume: f64,
    tips: TipTracker,
    trash: Option<PlaceableId>,
    used: bool,
}

impl Tool {
    /// Destinations (or sources) one tip load can serve at `volume` each
    fn trip_size(&self, volume: f64) -> usize {
        if volume <= 0.0 || self.max_volume <= 0.0 {
            return 1;
        }
        ((self.max_volume / volume).floor() as usize).max(1)
    }
}

/// Loads a JSON protocol into a [`Robot`]
#[derive(Debug, Clone)]
pub struct DeclarativeProcessor {
    text: String,
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl DeclarativeProcessor {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Validation errors from the last [`process`](Self::process)
    #[inline]
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Non-fatal findings from the last [`process`](Self::process)
    #[inline]
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Declare containers and pipettes, then enqueue every instruction
    ///
    /// # Errors
    ///
    /// [`DeclarativeError::InvalidJson`] when the text does not parse,
    /// [`DeclarativeError::Validation`] when any error was collected.
    pub fn process(&mut self, robot: &mut Robot) -> Result<(), DeclarativeError> {
        self.errors.clear();
        self.warnings.clear();

        let document: Value =
            serde_json::from_str(&self.text).map_err(DeclarativeError::InvalidJson)?;
        let Some(root) = document.as_object() else {
            self.errors.push("protocol must be a JSON object".to_string());
            return self.finish();
        };
        for section in SECTIONS {
            if !root.contains_key(section) {
                self.errors.push(format!("missing '{section}' section"));
            }
        }
        if !self.errors.is_empty() {
            return self.finish();
        }

        self.load_deck(robot, &root["deck"]);
        let mut tools = self.load_head(robot, &root["head"]);
        if self.errors.is_empty() {
            self.run_instructions(robot, &root["instructions"], &mut tools);
        }
        for (name, tool) in &tools {
            if !tool.used {
                self.warnings.push(format!("tool '{name}' is never used"));
            }
        }

        tracing::debug!(
            commands = robot.commands().len(),
            errors = self.errors.len(),
            warnings = self.warnings.len(),
            "declarative protocol processed"
        );
        self.finish()
    }

    fn finish(&self) -> Result<(), DeclarativeError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(DeclarativeError::Validation(self.errors.len()))
        }
    }

    fn section<'v>(&mut self, value: &'v Value, name: &str) -> Option<&'v Map<String, Value>> {
        let map = value.as_object();
        if map.is_none() {
            self.errors.push(format!("'{name}' section must be an object"));
        }
        map
    }

    fn load_deck(&mut self, robot: &mut Robot, deck: &Value) {
        let Some(entries) = self.section(deck, "deck") else {
            return;
        };
        for (label, value) in entries {
            let entry = match serde_json::from_value::<DeckEntry>(value.clone()) {
                Ok(entry) => entry,
                Err(e) => {
                    self.errors.push(format!("invalid deck entry '{label}': {e}"));
                    continue;
                }
            };
            if let Err(e) = robot.add_container(&entry.labware, &entry.slot, label) {
                self.errors.push(format!("deck entry '{label}': {e}"));
            }
        }
    }

    fn load_head(&mut self, robot: &mut Robot, head: &Value) -> BTreeMap<String, Tool> {
        let mut tools = BTreeMap::new();
        let Some(entries) = self.section(head, "head") else {
            return tools;
        };
        for (name, value) in entries {
            match serde_json::from_value::<HeadEntry>(value.clone()) {
                Ok(entry) => {
                    if let Some(tool) = self.mount(robot, name, &entry) {
                        tools.insert(name.clone(), tool);
                    }
                }
                Err(e) => self.errors.push(format!("invalid head entry '{name}': {e}")),
            }
        }
        tools
    }

    fn mount(&mut self, robot: &mut Robot, name: &str, entry: &HeadEntry) -> Option<Tool> {
        let before = self.errors.len();
        if entry.tool != "pipette" {
            self.errors
                .push(format!("head entry '{name}': unsupported tool '{}'", entry.tool));
        }
        if entry.volume <= 0.0 {
            self.errors
                .push(format!("head entry '{name}': volume must be positive"));
        }
        let axis = match Axis::parse(&entry.axis) {
            Ok(axis) if robot.instrument(axis).is_some() => {
                self.errors
                    .push(format!("head entry '{name}': axis {axis} is already in use"));
                None
            }
            Ok(axis) => Some(axis),
            Err(e) => {
                self.errors.push(format!("head entry '{name}': {e}"));
                None
            }
        };

        let mut racks = Vec::with_capacity(entry.tip_racks.len());
        for rack in &entry.tip_racks {
            match robot.deck().container(&rack.container) {
                Some(id) => racks.push(id),
                None => self.errors.push(format!(
                    "head entry '{name}': unknown tip rack '{}'",
                    rack.container
                )),
            }
        }
        let trash = entry.trash_container.as_ref().and_then(|trash| {
            let id = robot.deck().container(&trash.container);
            if id.is_none() {
                self.errors.push(format!(
                    "head entry '{name}': unknown trash container '{}'",
                    trash.container
                ));
            }
            id
        });

        let axis = axis.filter(|_| self.errors.len() == before)?;
        robot.add_instrument(
            Instrument::pipette(axis, name)
                .with_channels(entry.channel_count())
                .with_max_volume(entry.volume),
        );
        Some(Tool {
            axis,
            max_volume: entry.volume,
            tips: TipTracker::new(racks),
            trash,
            used: false,
        })
    }

    fn run_instructions(
        &mut self,
        robot: &mut Robot,
        instructions: &Value,
        tools: &mut BTreeMap<String, Tool>,
    ) {
        let instructions: Vec<Instruction> = match serde_json::from_value(instructions.clone()) {
            Ok(instructions) => instructions,
            Err(e) => {
                self.errors
                    .push(format!("invalid 'instructions' section: {e}"));
                return;
            }
        };

        for (index, instruction) in instructions.iter().enumerate() {
            let step = index + 1;
            let Some(tool) = tools.get_mut(&instruction.tool) else {
                self.errors.push(format!(
                    "instruction {step}: unknown tool '{}'",
                    instruction.tool
                ));
                continue;
            };
            tool.used = true;

            for value in &instruction.groups {
                match Group::decode(value) {
                    Ok(Some((kind, group))) => {
                        if let Err(e) = run_group(robot, tool, &group) {
                            self.errors.push(format!("instruction {step} ({kind}): {e}"));
                        }
                    }
                    Ok(None) => self.warnings.push(format!(
                        "instruction {step}: unsupported group '{}' ignored",
                        group_kind(value)
                    )),
                    Err(e) => self.errors.push(format!("instruction {step}: {e}")),
                }
            }
        }
    }
}

fn group_kind(value: &Value) -> &str {
    value
        .as_object()
        .and_then(|object| object.keys().next())
        .map_or("?", String::as_str)
}

fn resolve(robot: &Robot, well: &WellRef) -> Result<PlaceableId, HardwareError> {
    let deck = robot.deck();
    let container = deck
        .container(&well.container)
        .ok_or_else(|| DeckError::UnknownContainer(well.container.clone()))?;
    Ok(deck.well(container, &well.location)?)
}

fn run_group(robot: &mut Robot, tool: &mut Tool, group: &Group) -> Result<(), HardwareError> {
    match group {
        Group::Transfer(steps) => transfer(robot, tool, steps),
        Group::Distribute(group) => distribute(robot, tool, group),
        Group::Consolidate(group) => consolidate(robot, tool, group),
        Group::Mix(steps) => mix(robot, tool, steps),
    }
}

fn transfer(robot: &mut Robot, tool: &mut Tool, steps: &[TransferStep]) -> Result<(), HardwareError> {
    for step in steps {
        let source = resolve(robot, &step.from)?;
        let dest = resolve(robot, &step.to)?;
        Pipetting::new(robot, tool.axis)?.transfer(
            step.volume,
            source,
            dest,
            &mut tool.tips,
            tool.trash,
        )?;
    }
    Ok(())
}

fn distribute(robot: &mut Robot, tool: &mut Tool, group: &DistributeGroup) -> Result<(), HardwareError> {
    let source = resolve(robot, &group.from)?;
    let dests = group
        .to
        .iter()
        .map(|well| resolve(robot, well))
        .collect::<Result<Vec<_>, _>>()?;
    let trip = tool.trip_size(group.volume);

    let mut pipette = Pipetting::new(robot, tool.axis)?;
    pipette.pick_up_tip(None, &mut tool.tips)?;
    for chunk in dests.chunks(trip) {
        pipette.aspirate(group.volume * chunk.len() as f64, Some(source))?;
        for dest in chunk {
            pipette.dispense(group.volume, Some(*dest))?;
        }
    }
    pipette.blow_out(None)?;
    pipette.drop_tip(tool.trash)
}

fn consolidate(robot: &mut Robot, tool: &mut Tool, group: &ConsolidateGroup) -> Result<(), HardwareError> {
    let sources = group
        .from
        .iter()
        .map(|well| resolve(robot, well))
        .collect::<Result<Vec<_>, _>>()?;
    let dest = resolve(robot, &group.to)?;
    let trip = tool.trip_size(group.volume);

    let mut pipette = Pipetting::new(robot, tool.axis)?;
    pipette.pick_up_tip(None, &mut tool.tips)?;
    for chunk in sources.chunks(trip) {
        for source in chunk {
            pipette.aspirate(group.volume, Some(*source))?;
        }
        pipette.dispense(group.volume * chunk.len() as f64, Some(dest))?;
    }
    pipette.blow_out(None)?;
    pipette.drop_tip(tool.trash)
}

fn mix(robot: &mut Robot, tool: &mut Tool, steps: &[MixStep]) -> Result<(), HardwareError> {
    for step in steps {
        let well = resolve(
            robot,
            &WellRef {
                container: step.container.clone(),
                location: step.location.clone(),
            },
        )?;
        let mut pipette = Pipetting::new(robot, tool.axis)?;
        pipette.pick_up_tip(None, &mut tool.tips)?;
        pipette.mix(step.repetitions, step.volume, Some(well))?;
        pipette.blow_out(None)?;
        pipette.drop_tip(tool.trash)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use labbench_hardware::{Action, HardwareControl};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn protocol(instructions: Value) -> String {
        json!({
            "deck": {
                "tiprack": {"labware": "tiprack-200ul", "slot": "A1"},
                "plate": {"labware": "96-flat", "slot": "B1"},
                "trash": {"labware": "point", "slot": "C1"}
            },
            "head": {
                "p200": {
                    "tool": "pipette", "axis": "b", "volume": 200,
                    "tip-racks": [{"container": "tiprack"}],
                    "trash-container": {"container": "trash"}
                }
            },
            "instructions": instructions
        })
        .to_string()
    }

    fn well(container: &str, location: &str) -> Value {
        json!({"container": container, "location": location})
    }

    #[test]
    fn transfer_enqueues_tip_cycle() {
        let text = protocol(json!([{"tool": "p200", "groups": [
            {"transfer": [{"from": well("plate", "A1"), "to": well("plate", "B1"), "volume": 100}]}
        ]}]));
        let mut robot = Robot::new();
        let mut processor = DeclarativeProcessor::new(text);
        processor.process(&mut robot).unwrap();

        let verbs: Vec<&str> = robot.commands().iter().map(|c| c.action.verb()).collect();
        assert_eq!(
            verbs,
            vec!["pick up tip", "aspirate", "dispense", "blow out", "drop tip"]
        );
        assert!(processor.errors().is_empty());
        assert!(robot.simulate().is_empty());
    }

    #[test]
    fn distribute_splits_into_trips() {
        let text = protocol(json!([{"tool": "p200", "groups": [
            {"distribute": {
                "from": well("plate", "A1"),
                "to": [well("plate", "A2"), well("plate", "A3"), well("plate", "A4")],
                "volume": 80
            }}
        ]}]));
        let mut robot = Robot::new();
        DeclarativeProcessor::new(text).process(&mut robot).unwrap();

        let aspirated: Vec<f64> = robot
            .commands()
            .iter()
            .filter_map(|c| match c.action {
                Action::Aspirate { volume } => Some(volume),
                _ => None,
            })
            .collect();
        assert_eq!(aspirated, vec![160.0, 80.0]);
        assert!(robot.simulate().is_empty());
    }

    #[test]
    fn missing_sections_are_reported() {
        let mut robot = Robot::new();
        let mut processor = DeclarativeProcessor::new(r#"{"deck": {}}"#);
        let err = processor.process(&mut robot).unwrap_err();
        assert!(matches!(err, DeclarativeError::Validation(2)));
        assert_eq!(
            processor.errors(),
            &[
                "missing 'head' section".to_string(),
                "missing 'instructions' section".to_string()
            ]
        );
    }

    #[test]
    fn unknown_references_accumulate() {
        let text = protocol(json!([
            {"tool": "p1000", "groups": []},
            {"tool": "p200", "groups": [
                {"transfer": [{"from": well("reservoir", "A1"), "to": well("plate", "Z99"), "volume": 10}]}
            ]}
        ]));
        let mut robot = Robot::new();
        let mut processor = DeclarativeProcessor::new(text);
        assert!(processor.process(&mut robot).is_err());

        let errors = processor.errors();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("unknown tool 'p1000'"));
        assert!(errors[1].contains("'reservoir'"));
    }

    #[test]
    fn unknown_groups_and_idle_tools_warn() {
        let mut document: Value = serde_json::from_str(&protocol(json!([
            {"tool": "p200", "groups": [{"shake": {"seconds": 10}}]}
        ])))
        .unwrap();
        document["head"]["p10"] = json!({"tool": "pipette", "axis": "a", "volume": 10});

        let mut robot = Robot::new();
        let mut processor = DeclarativeProcessor::new(document.to_string());
        processor.process(&mut robot).unwrap();
        assert_eq!(
            processor.warnings(),
            &[
                "instruction 1: unsupported group 'shake' ignored".to_string(),
                "tool 'p10' is never used".to_string()
            ]
        );
    }

    #[test]
    fn invalid_json_is_a_syntax_error() {
        let mut robot = Robot::new();
        let err = DeclarativeProcessor::new("{not json")
            .process(&mut robot)
            .unwrap_err();
        assert!(err.is_syntax());
    }

    #[test]
    fn unknown_labware_is_reported() {
        let text = json!({
            "deck": {"plate": {"labware": "384-deep", "slot": "A1"}},
            "head": {},
            "instructions": []
        })
        .to_string();
        let mut robot = Robot::new();
        let mut processor = DeclarativeProcessor::new(text);
        assert!(processor.process(&mut robot).is_err());
        assert!(processor.errors()[0].contains("384-deep"));
    }
}
