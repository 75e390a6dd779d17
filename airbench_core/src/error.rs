//! Error types for vehicle commands, settings, and body lifecycle.

use thiserror::Error;

/// Why the control API refused a command.
///
/// Carried inside [`CommandOutcome::Rejected`](crate::CommandOutcome); never fatal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("API control is not enabled")]
    ApiControlDisabled,

    #[error("ground contact not established (set_grounded(true) must follow physics registration)")]
    GroundContactNotEstablished,

    #[error("vehicle is not armed")]
    NotArmed,

    #[error("vehicle must be on the ground: {0}")]
    NotOnGround(String),

    #[error("vehicle is already airborne")]
    AlreadyAirborne,

    #[error("vehicle is not airborne")]
    NotAirborne,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("physics loop is not running: {0}")]
    PhysicsNotRunning(String),

    #[error("no vehicle body is bound to this API")]
    NotBound,
}

/// Settings and vehicle-profile errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("unknown vehicle profile: {0}")]
    UnknownProfile(String),

    #[error("invalid vehicle parameter: {0}")]
    InvalidParameter(String),

    #[error("settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Body lifecycle errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("vehicle body is not registered with a physics loop: {0}")]
    NotRegistered(String),

    #[error("vehicle body is already registered as {0}")]
    AlreadyRegistered(String),

    #[error("control API is already bound to another vehicle body")]
    AlreadyBound,
}
