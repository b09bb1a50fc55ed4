//! The simulated robot
//!
//! Owns the deck, the mounted instruments, the command queue and the
//! calibration store. The seven operations that would move real hardware or
//! advance its state ([`DestructiveOp`]) go through [`HardwareControl`] and
//! become no-ops while the robot is in [`ExecutionMode::Sandboxed`].

use crate::calibration_store::CalibrationStore;
use crate::command::{Action, Command};
use crate::deck::{Deck, PlaceableId, DEFAULT_SLOT_SIZE};
use crate::driver::{Motion, VirtualDriver};
use crate::error::{DeckError, HardwareError};
use crate::geometry::Vector;
use crate::instrument::{Axis, CalibrationData, Instrument};
use crate::labware;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

const VOLUME_EPSILON: f64 = 1e-6;

/// Whether destructive operations take effect
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Every operation takes effect
    #[default]
    Live,
    /// Destructive operations are suppressed
    Sandboxed,
}

/// Operations that protocol code must not be able to perform for real
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DestructiveOp {
    Connect,
    Disconnect,
    MoveHead,
    MovePlunger,
    Reset,
    Run,
    Simulate,
}

impl DestructiveOp {
    /// Every destructive operation
    pub const ALL: [Self; 7] = [
        Self::Connect,
        Self::Disconnect,
        Self::MoveHead,
        Self::MovePlunger,
        Self::Reset,
        Self::Run,
        Self::Simulate,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::MoveHead => "move_head",
            Self::MovePlunger => "move_plunger",
            Self::Reset => "reset",
            Self::Run => "run",
            Self::Simulate => "simulate",
        }
    }
}

/// Hardware-affecting operations
///
/// Implementations must honour the current [`ExecutionMode`].
pub trait HardwareControl {
    /// Open the driver connection (virtual port when `None`)
    fn connect(&mut self, port: Option<&str>);
    /// Close the driver connection
    fn disconnect(&mut self);
    /// Move the head to an absolute deck position
    fn move_head(&mut self, target: Vector);
    /// Move one plunger to an absolute position in mm
    fn move_plunger(&mut self, axis: Axis, position: f64);
    /// Clear instruments, containers, commands and warnings
    fn reset(&mut self);
    /// Execute the queued commands through the driver
    fn run(&mut self) -> Result<Vec<String>, HardwareError>;
    /// Replay the queued commands against virtual state, returning warnings
    fn simulate(&mut self) -> Vec<String>;
}

/// Default ceiling on queued commands
pub const DEFAULT_MAX_COMMANDS: usize = 100_000;

/// Robot construction options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    /// Footprint of each deck slot in mm
    pub slot_size: Vector,
    /// JSON file backing the calibration store
    pub calibration_path: Option<PathBuf>,
    /// Ceiling on queued commands per protocol
    pub max_commands: usize,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            slot_size: DEFAULT_SLOT_SIZE,
            calibration_path: None,
            max_commands: DEFAULT_MAX_COMMANDS,
        }
    }
}

/// Liquid/tip state of one pipette during a replay
#[derive(Debug, Clone, Copy, Default)]
struct TipState {
    has_tip: bool,
    volume: f64,
}

/// Simulated liquid-handling robot
#[derive(Debug)]
pub struct Robot {
    config: RobotConfig,
    deck: Deck,
    instruments: BTreeMap<Axis, Instrument>,
    commands: Vec<Command>,
    warnings: Vec<String>,
    mode: ExecutionMode,
    suppressed: BTreeMap<DestructiveOp, usize>,
    driver: VirtualDriver,
    store: CalibrationStore,
}

impl Default for Robot {
    fn default() -> Self {
        Self::new()
    }
}

impl Robot {
    /// Robot with default deck and in-memory calibration
    #[must_use]
    pub fn new() -> Self {
        let config = RobotConfig::default();
        Self {
            deck: Deck::new(config.slot_size),
            config,
            instruments: BTreeMap::new(),
            commands: Vec::new(),
            warnings: Vec::new(),
            mode: ExecutionMode::Live,
            suppressed: BTreeMap::new(),
            driver: VirtualDriver::default(),
            store: CalibrationStore::in_memory(),
        }
    }

    /// Robot from configuration, opening the calibration file if configured
    pub fn with_config(config: RobotConfig) -> Result<Self, HardwareError> {
        let store = match &config.calibration_path {
            Some(path) => CalibrationStore::open(path)?,
            None => CalibrationStore::in_memory(),
        };
        Ok(Self {
            deck: Deck::new(config.slot_size),
            store,
            config,
            ..Self::new()
        })
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &RobotConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    // ---- execution mode ----

    #[inline]
    #[must_use]
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Switch execution mode, returning the previous one
    pub fn set_mode(&mut self, mode: ExecutionMode) -> ExecutionMode {
        std::mem::replace(&mut self.mode, mode)
    }

    /// How many times an operation was suppressed since construction
    #[must_use]
    pub fn suppressed_calls(&self, op: DestructiveOp) -> usize {
        self.suppressed.get(&op).copied().unwrap_or(0)
    }

    /// Returns true when the call must be skipped
    fn intercept(&mut self, op: DestructiveOp) -> bool {
        if self.mode == ExecutionMode::Live {
            return false;
        }
        *self.suppressed.entry(op).or_default() += 1;
        tracing::debug!(operation = op.name(), "suppressed destructive call in sandbox");
        true
    }

    // ---- containers ----

    /// Load labware into a slot
    pub fn add_container(
        &mut self,
        container_type: &str,
        slot: &str,
        label: &str,
    ) -> Result<PlaceableId, HardwareError> {
        let definition = labware::lookup(container_type)
            .ok_or_else(|| HardwareError::UnknownLabware(container_type.to_string()))?;
        let id = self.deck.add_container(slot, label, definition)?;
        tracing::debug!(container = label, container_type, slot, "container placed");
        Ok(id)
    }

    // ---- instruments ----

    /// Mount an instrument, replacing whatever was on its axis
    ///
    /// Stored calibration for an instrument of the same name is restored.
    pub fn add_instrument(&mut self, mut instrument: Instrument) -> Axis {
        if let Some(stored) = self.store.get(instrument.name()) {
            instrument.restore_calibration(stored);
        }
        let axis = instrument.axis();
        if let Some(previous) = self.instruments.insert(axis, instrument) {
            tracing::debug!(axis = %axis, replaced = previous.name(), "instrument replaced");
        }
        axis
    }

    /// Mounted instruments in axis order
    pub fn instruments(&self) -> impl Iterator<Item = &Instrument> {
        self.instruments.values()
    }

    #[must_use]
    pub fn instrument(&self, axis: Axis) -> Option<&Instrument> {
        self.instruments.get(&axis)
    }

    /// First instrument, in axis order, whose name matches exactly
    #[must_use]
    pub fn instrument_by_name(&self, name: &str) -> Option<&Instrument> {
        self.instruments.values().find(|i| i.name() == name)
    }

    fn instrument_mut(&mut self, axis: Axis) -> Result<&mut Instrument, HardwareError> {
        self.instruments
            .get_mut(&axis)
            .ok_or(HardwareError::NoInstrument(axis))
    }

    // ---- calibration ----

    /// Record the current plunger position as the named position
    pub fn calibrate_plunger(&mut self, axis: Axis, position: &str) -> Result<f64, HardwareError> {
        let value = self.driver.plunger(axis);
        let instrument = self.instrument_mut(axis)?;
        instrument.calibrate(position, value)?;
        let (name, snapshot) = (instrument.name().to_string(), instrument.calibration_snapshot());
        self.store.put(&name, snapshot)?;
        tracing::info!(axis = %axis, position, value, "plunger position calibrated");
        Ok(value)
    }

    /// Record the current head position as `point` inside `container`
    pub fn calibrate_container(
        &mut self,
        axis: Axis,
        container: PlaceableId,
        point: Vector,
    ) -> Result<CalibrationData, HardwareError> {
        let head = self.driver.head();
        let instrument = self
            .instruments
            .get_mut(&axis)
            .ok_or(HardwareError::NoInstrument(axis))?;
        let data = instrument
            .calibrate_position(&self.deck, container, point, head)?
            .clone();
        let (name, snapshot) = (instrument.name().to_string(), instrument.calibration_snapshot());
        self.store.put(&name, snapshot)?;
        tracing::info!(axis = %axis, container = %self.deck.describe(container), "container position calibrated");
        Ok(data)
    }

    // ---- command queue ----

    /// Commands that can still be queued before the ceiling is reached
    #[inline]
    #[must_use]
    pub fn queue_capacity(&self) -> usize {
        self.config.max_commands.saturating_sub(self.commands.len())
    }

    /// Fail unless `count` more commands fit in the queue
    pub fn reserve(&self, count: usize) -> Result<(), HardwareError> {
        if count > self.queue_capacity() {
            return Err(HardwareError::QueueFull(self.config.max_commands));
        }
        Ok(())
    }

    /// Queue a command; instrument locations are recorded for topology
    pub fn enqueue(&mut self, command: Command) -> Result<(), HardwareError> {
        self.reserve(1)?;
        if let Some(location) = command.location {
            if !self.deck.is_attached(location) {
                return Err(DeckError::UnknownPlaceable(location).into());
            }
        }
        match &command.action {
            Action::Aspirate { volume } | Action::Dispense { volume } if !volume.is_finite() || *volume < 0.0 => {
                return Err(HardwareError::InvalidVolume(*volume));
            }
            _ => {}
        }
        if let Some(axis) = command.axis {
            let instrument = self.instrument_mut(axis)?;
            if let Some(location) = command.location {
                instrument.record_placeable(location);
            }
        }
        self.commands.push(command);
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Warnings from the last simulate/run
    #[inline]
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    // ---- driver state ----

    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.driver.port().is_some()
    }

    #[inline]
    #[must_use]
    pub fn head_position(&self) -> Vector {
        self.driver.head()
    }

    #[inline]
    #[must_use]
    pub fn plunger_position(&self, axis: Axis) -> f64 {
        self.driver.plunger(axis)
    }

    #[inline]
    #[must_use]
    pub fn motions(&self) -> &[Motion] {
        self.driver.motions()
    }

    /// Replay the queue against tip/volume state and collect warnings
    fn replay(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.commands.is_empty() {
            warnings.push("Protocol contains no commands".to_string());
            return warnings;
        }

        let mut state: BTreeMap<Axis, TipState> = BTreeMap::new();
        for (index, command) in self.commands.iter().enumerate() {
            let Some(axis) = command.axis else { continue };
            let Some(instrument) = self.instruments.get(&axis) else {
                continue;
            };
            let tip = state.entry(axis).or_default();
            let mut warn = |message: String| {
                warnings.push(format!(
                    "Step {} ({}): {}",
                    index + 1,
                    command.describe(&self.deck),
                    message
                ));
            };

            match command.action {
                Action::Aspirate { volume } => {
                    if !tip.has_tip {
                        warn(format!("{} has no tip attached", instrument.name()));
                    }
                    if tip.volume + volume > instrument.max_volume() + VOLUME_EPSILON {
                        warn(format!(
                            "{} would hold {}uL, exceeding its max volume of {}uL",
                            instrument.name(),
                            tip.volume + volume,
                            instrument.max_volume()
                        ));
                    }
                    tip.volume += volume;
                }
                Action::Dispense { volume } => {
                    if volume > tip.volume + VOLUME_EPSILON {
                        warn(format!(
                            "{} dispenses {}uL but only holds {}uL",
                            instrument.name(),
                            volume,
                            tip.volume
                        ));
                    }
                    tip.volume = (tip.volume - volume).max(0.0);
                }
                Action::PickUpTip => {
                    if tip.has_tip {
                        warn(format!("{} already has a tip attached", instrument.name()));
                    }
                    tip.has_tip = true;
                }
                Action::DropTip => {
                    if !tip.has_tip {
                        warn(format!("{} has no tip to drop", instrument.name()));
                    }
                    *tip = TipState::default();
                }
                Action::BlowOut => tip.volume = 0.0,
                _ => {}
            }
        }
        warnings
    }

    fn plunger_target(instrument: &Instrument, action: &Action) -> Option<f64> {
        let (name, fallback) = match action {
            Action::Aspirate { .. } | Action::PickUpTip => ("bottom", 10.0),
            Action::Dispense { .. } => ("top", 0.0),
            Action::BlowOut => ("blow_out", 12.0),
            Action::DropTip => ("drop_tip", 14.0),
            _ => return None,
        };
        Some(instrument.position(name).unwrap_or(fallback))
    }
}

impl HardwareControl for Robot {
    fn connect(&mut self, port: Option<&str>) {
        if self.intercept(DestructiveOp::Connect) {
            return;
        }
        self.driver.connect(port);
        tracing::info!(port = self.driver.port(), "driver connected");
    }

    fn disconnect(&mut self) {
        if self.intercept(DestructiveOp::Disconnect) {
            return;
        }
        self.driver.disconnect();
    }

    fn move_head(&mut self, target: Vector) {
        if self.intercept(DestructiveOp::MoveHead) {
            return;
        }
        self.driver.move_head(target);
    }

    fn move_plunger(&mut self, axis: Axis, position: f64) {
        if self.intercept(DestructiveOp::MovePlunger) {
            return;
        }
        self.driver.move_plunger(axis, position);
    }

    fn reset(&mut self) {
        if self.intercept(DestructiveOp::Reset) {
            return;
        }
        self.instruments.clear();
        self.deck.clear_containers();
        self.commands.clear();
        self.warnings.clear();
        tracing::debug!("robot reset");
    }

    fn run(&mut self) -> Result<Vec<String>, HardwareError> {
        if self.intercept(DestructiveOp::Run) {
            return Ok(Vec::new());
        }
        if !self.is_connected() {
            return Err(HardwareError::NotConnected);
        }

        self.warnings = self.replay();
        for command in &self.commands {
            if let Some(location) = command.location {
                let top = self
                    .deck
                    .from_center(location, 0.0, 0.0, 1.0, self.deck.root())?;
                self.driver.move_head(top);
            }
            let Some(axis) = command.axis else { continue };
            if let Some(instrument) = self.instruments.get(&axis) {
                if let Some(target) = Self::plunger_target(instrument, &command.action) {
                    self.driver.move_plunger(axis, target);
                }
            }
        }
        tracing::info!(commands = self.commands.len(), "protocol run complete");
        Ok(self.warnings.clone())
    }

    fn simulate(&mut self) -> Vec<String> {
        if self.intercept(DestructiveOp::Simulate) {
            return Vec::new();
        }
        self.warnings = self.replay();
        tracing::debug!(
            commands = self.commands.len(),
            warnings = self.warnings.len(),
            "simulation complete"
        );
        self.warnings.clone()
    }
}
