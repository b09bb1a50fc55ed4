//! Queued protocol commands
//!
//! Protocol code never moves anything directly: every action is enqueued on
//! the robot and later replayed by `simulate()` (virtual liquid state) or
//! `run()` (virtual driver).

use crate::deck::{Deck, PlaceableId};
use crate::instrument::Axis;

/// What a command does
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Aspirate { volume: f64 },
    Dispense { volume: f64 },
    PickUpTip,
    DropTip,
    BlowOut,
    TouchTip,
    MoveTo,
    Delay { seconds: f64 },
    Comment(String),
    Home,
}

impl Action {
    /// Short verb used in descriptions and warnings
    #[must_use]
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Aspirate { .. } => "aspirate",
            Self::Dispense { .. } => "dispense",
            Self::PickUpTip => "pick up tip",
            Self::DropTip => "drop tip",
            Self::BlowOut => "blow out",
            Self::TouchTip => "touch tip",
            Self::MoveTo => "move to",
            Self::Delay { .. } => "delay",
            Self::Comment(_) => "comment",
            Self::Home => "home",
        }
    }
}

/// One queued step
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// Instrument performing the action (`None` for robot-level steps)
    pub axis: Option<Axis>,
    pub action: Action,
    pub location: Option<PlaceableId>,
}

impl Command {
    /// Instrument action, optionally at a location
    #[inline]
    #[must_use]
    pub fn instrument(axis: Axis, action: Action, location: Option<PlaceableId>) -> Self {
        Self {
            axis: Some(axis),
            action,
            location,
        }
    }

    /// Robot-level action
    #[inline]
    #[must_use]
    pub fn robot(action: Action) -> Self {
        Self {
            axis: None,
            action,
            location: None,
        }
    }

    /// Human-readable form, e.g. `aspirate 50uL from A1 of plate`
    #[must_use]
    pub fn describe(&self, deck: &Deck) -> String {
        let mut text = match &self.action {
            Action::Aspirate { volume } => format!("aspirate {volume}uL"),
            Action::Dispense { volume } => format!("dispense {volume}uL"),
            Action::Delay { seconds } => format!("delay {seconds}s"),
            Action::Comment(message) => format!("comment: {message}"),
            other => other.verb().to_string(),
        };
        if let Some(location) = self.location {
            let preposition = match self.action {
                Action::Aspirate { .. } | Action::PickUpTip => "from",
                Action::Dispense { .. } | Action::DropTip | Action::MoveTo => "to",
                _ => "at",
            };
            text = format!("{text} {preposition} {}", deck.describe(location));
        }
        if let Some(axis) = self.axis {
            text = format!("[{axis}] {text}");
        }
        text
    }
}
