//! Virtual motion driver
//!
//! Stands in for the serial motor controller. It only tracks where the head
//! and plungers are and keeps a log of every motion it was asked to make.

use crate::geometry::Vector;
use crate::instrument::Axis;
use std::collections::BTreeMap;

/// Port name used when `connect` is called without one
pub const VIRTUAL_PORT: &str = "virtual-smoothie";

/// A single motion sent to the driver
#[derive(Debug, Clone, PartialEq)]
pub enum Motion {
    Head(Vector),
    Plunger { axis: Axis, position: f64 },
}

#[derive(Debug, Clone, Default)]
pub struct VirtualDriver {
    port: Option<String>,
    head: Vector,
    plungers: BTreeMap<Axis, f64>,
    motions: Vec<Motion>,
}

impl VirtualDriver {
    pub fn connect(&mut self, port: Option<&str>) {
        self.port = Some(port.unwrap_or(VIRTUAL_PORT).to_string());
    }

    pub fn disconnect(&mut self) {
        self.port = None;
    }

    #[inline]
    #[must_use]
    pub fn port(&self) -> Option<&str> {
        self.port.as_deref()
    }

    pub fn move_head(&mut self, target: Vector) {
        self.head = target;
        self.motions.push(Motion::Head(target));
    }

    pub fn move_plunger(&mut self, axis: Axis, position: f64) {
        self.plungers.insert(axis, position);
        self.motions.push(Motion::Plunger { axis, position });
    }

    #[inline]
    #[must_use]
    pub fn head(&self) -> Vector {
        self.head
    }

    /// Plunger position of an axis (0 before it ever moved)
    #[must_use]
    pub fn plunger(&self, axis: Axis) -> f64 {
        self.plungers.get(&axis).copied().unwrap_or(0.0)
    }

    #[inline]
    #[must_use]
    pub fn motions(&self) -> &[Motion] {
        &self.motions
    }
}
