//! airbench Flight Sequence Test Harness
//!
//! This crate drives one or more simulated vehicles through scripted command
//! sequences on a virtual clock, so a flight test is fully reproducible from
//! its seed.
//!
//! # Core Principle: Lockstep Time
//!
//! - **Time**: the virtual clock moves only when a command (or the runner) advances it
//! - **Physics**: a background loop executes exactly the ticks each advance grants
//! - **Randomness**: wind gusts derive from one 64-bit seed and the body's registration index
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                        SimWorld                           │
//! │  ┌────────────────┐  TickGrant   ┌────────────────────┐   │
//! │  │  VirtualClock  │─────────────►│    PhysicsLoop     │   │
//! │  │                │◄─────────────│  (own OS thread)   │   │
//! │  └───────▲────────┘     ack      └─────────┬──────────┘   │
//! │          │ step()                          │ step(dt)     │
//! │  ┌───────┴────────┐  setpoint    ┌─────────▼──────────┐   │
//! │  │   ControlApi   │◄────────────►│    VehicleBody     │   │
//! │  └───────▲────────┘  snapshots   └────────────────────┘   │
//! └──────────┼────────────────────────────────────────────────┘
//!            │ enable / arm / takeoff / move / land
//!   FlightTestRunner ──► StatusLog
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use airbench_sim::{FlightTestRunner, ScenarioId};
//!
//! let result = FlightTestRunner::new(42)
//!     .with_log_path("log.txt")
//!     .run(ScenarioId::SimpleFlight);
//! assert!(result.passed);
//! ```

mod error;
mod physics_loop;
mod world;
mod status_log;
mod runner;
mod exporter;
pub mod scenarios;

pub use error::{RunError, SimError};
pub use physics_loop::{LoopStats, PhysicsLoop};
pub use world::{SimConfig, SimWorld};
pub use status_log::StatusLog;
pub use runner::{FlightTestRunner, PhaseRecord, ScenarioResult};
pub use exporter::{FlightExport, FlightFrame, SimEvent, VehiclePosition};
pub use scenarios::ScenarioId;
