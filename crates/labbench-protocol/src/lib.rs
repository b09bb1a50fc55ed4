//! labbench Protocol Front-ends
//!
//! Turns protocol documents into queued robot commands.
//!
//! # Front-ends
//!
//! - **Declarative**: JSON documents (`deck`, `head`, `instructions`),
//!   validated with every problem collected before anything is reported
//! - **Scripted**: Lua source run in a restricted interpreter against a
//!   [`SharedRobot`]
//!
//! # Architecture
//!
//! ```text
//! JSON text ──→ DeclarativeProcessor ──┐
//!                                      ├──→ Pipetting ──→ Robot command queue
//! Lua source ─→ ScriptRunner (mlua) ───┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use labbench_protocol::DeclarativeProcessor;
//! use labbench_hardware::Robot;
//!
//! let mut robot = Robot::new();
//! let mut processor = DeclarativeProcessor::new(text);
//! if processor.process(&mut robot).is_err() {
//!     for error in processor.errors() {
//!         eprintln!("{error}");
//!     }
//! }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod declarative;
pub mod error;
pub mod liquid;
pub mod scripted;

// Re-exports for convenience
pub use declarative::DeclarativeProcessor;
pub use error::{DeclarativeError, ScriptFault};
pub use liquid::{Pipetting, TipTracker};
pub use scripted::{ScriptConfig, ScriptRunner, SharedRobot};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
