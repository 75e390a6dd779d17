//! airbench Environment Abstraction Layer
//!
//! This crate owns the one thing every other airbench component must agree
//! on: time. Nothing in a test run reads the wall clock. Components receive a
//! [`SimClock`] explicitly, and "waiting" means asking the clock to advance.
//!
//! # Core Concept: Lockstep Ticks
//!
//! A [`VirtualClock`] with a physics loop attached (through a [`TickSource`])
//! hands every crossed step boundary to the loop as a [`TickGrant`] and only
//! returns from `advance` once the loop has executed those ticks. Two runs
//! with the same step size therefore see exactly the same sequence of
//! physics steps, no matter how the OS schedules the loop thread.
//!
//! # Example
//!
//! ```ignore
//! use airbench_env::{SimClock, VirtualClock};
//! use std::time::Duration;
//!
//! let clock = VirtualClock::shared(Duration::from_millis(3))?;
//! let source = clock.tick_source()?; // moved into the physics loop thread
//! clock.advance(Duration::from_millis(40))?; // returns after 13 ticks ran
//! ```

mod clock;
mod error;
mod types;
mod virtual_clock;

pub use clock::{duration_from_secs, SimClock};
pub use error::EnvError;
pub use types::VehicleId;
pub use virtual_clock::{TickGrant, TickSource, VirtualClock};
