//! labbench Core
//!
//! Protocol sandboxing, topology extraction and calibration tracking on top
//! of the simulated robot.
//!
//! # Core Operations
//!
//! - **Load**: run a declarative or scripted protocol against a freshly
//!   reset robot with destructive operations suppressed ([`ProtocolSandbox`])
//! - **Topology**: the containers each pipette touches ([`topology`])
//! - **Calibrate**: record container and plunger calibration ([`calibration`])
//! - **Step list**: per-pipette calibration summary ([`StepListCache`])
//!
//! # Architecture
//!
//! ```text
//! payload ─→ LabSession ─→ ProtocolSandbox ─→ Robot (reset, sandboxed run, simulate)
//!                │
//!                ├──→ StepListCache ─→ topology + calibration queries
//!                └──→ calibration requests ─→ Robot calibration store
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use labbench_core::LabSession;
//!
//! let session = LabSession::new();
//! let response = session.load_scripted(source.as_bytes(), "transfer.lua");
//! if response.is_ok() {
//!     session.calibrate_placeable("plate", "b")?;
//!     let steps = session.refresh_step_list();
//! }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod calibration;
pub mod config;
pub mod error;
pub mod logging;
pub mod sandbox;
pub mod session;
pub mod step_list;
pub mod topology;

// Re-exports for convenience
pub use config::LabConfig;
pub use error::{CalibrationError, CoreError, Result};
pub use sandbox::{LoadResponse, ProtocolSandbox, SandboxGuard, INVALID_JSON};
pub use session::LabSession;
pub use step_list::{PlaceableStep, StepListCache, StepListEntry};
pub use topology::{sort_containers, ContainerInfo, ContainerLike};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
