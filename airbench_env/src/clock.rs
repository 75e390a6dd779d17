//! Core time-source trait for airbench components.

use crate::error::EnvError;
use std::time::Duration;

/// The central interface for time.
///
/// Every component that needs "now" or has to wait for something receives
/// a clock explicitly. There is no process-wide clock: each test run builds
/// its own and hands it to the control API and the physics loop.
///
/// # Determinism
///
/// Implementations never sleep on the wall clock. Waiting means asking the
/// clock to advance, and the clock is responsible for making the simulated
/// world catch up before returning.
pub trait SimClock: Send + Sync + 'static {
    /// Returns the current virtual time since clock creation.
    fn now(&self) -> Duration;

    /// Returns the fixed step size of this clock.
    fn step_size(&self) -> Duration;

    /// Moves time forward by exactly `duration`.
    ///
    /// Returns the virtual time after the advance. When a tick driver is
    /// attached, every step boundary crossed has been executed by the driver
    /// before this returns.
    fn advance(&self, duration: Duration) -> Result<Duration, EnvError>;

    /// Returns true while a live tick driver is attached.
    fn is_driven(&self) -> bool;

    /// Advances by a single step.
    fn step(&self) -> Result<Duration, EnvError> {
        self.advance(self.step_size())
    }

    /// Advances by a duration given in seconds (negative values are ignored).
    fn sleep_for(&self, secs: f64) -> Result<Duration, EnvError> {
        self.advance(duration_from_secs(secs.max(0.0))?)
    }
}

/// Converts seconds to a duration rounded to the nearest nanosecond.
///
/// `0.03` s must be exactly ten 3 ms ticks, not one nanosecond short of it.
pub fn duration_from_secs(secs: f64) -> Result<Duration, EnvError> {
    let nanos = (secs * 1e9).round();
    if !nanos.is_finite() || nanos < 0.0 || nanos >= u64::MAX as f64 {
        return Err(EnvError::InvalidDuration(format!("{secs} s")));
    }
    Ok(Duration::from_nanos(nanos as u64))
}
