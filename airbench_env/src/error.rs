//! Error types for the airbench environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvError {
    /// The clock step size must be a positive duration.
    #[error("Invalid step size: {0}")]
    InvalidStepSize(String),

    /// A duration could not be represented (NaN, infinite, overflow).
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    /// A live tick driver already owns this clock.
    #[error("A tick driver is already attached to this clock")]
    DriverAlreadyAttached,

    /// The tick driver went away while time was being advanced.
    #[error("Tick driver detached: {0}")]
    DriverDetached(String),

    /// The operation is not allowed while a tick driver is attached.
    #[error("Operation refused while a tick driver is attached: {0}")]
    DriverAttached(String),
}

impl EnvError {
    /// Creates a detached-driver error.
    pub fn detached(msg: impl Into<String>) -> Self {
        Self::DriverDetached(msg.into())
    }
}
