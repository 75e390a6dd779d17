//! Error types for the physics loop and the flight test runner.

use airbench_core::{CoreError, SettingsError};
use airbench_env::EnvError;
use thiserror::Error;

/// Simulation lifecycle errors.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("physics loop already started")]
    AlreadyStarted,

    #[error("bodies must be registered before the physics loop starts")]
    RegistrationClosed,

    #[error("failed to spawn physics thread: {0}")]
    Spawn(std::io::Error),

    #[error(transparent)]
    Env(#[from] EnvError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Fatal errors that abort a flight test run.
///
/// Command-level failures are not here: they come back as
/// [`CommandOutcome`](airbench_core::CommandOutcome) values.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("vehicle profile unavailable: {0}")]
    MissingProfile(SettingsError),

    #[error("could not create control API: {0}")]
    ApiCreation(SettingsError),

    #[error("vehicle not ready: {0}")]
    NotReady(String),

    #[error("assertion failed: {0}")]
    Assertion(String),

    #[error("status log error: {0}")]
    Log(#[from] std::io::Error),

    #[error(transparent)]
    Sim(#[from] SimError),
}

impl From<CoreError> for RunError {
    fn from(e: CoreError) -> Self {
        RunError::Sim(SimError::Core(e))
    }
}

impl From<EnvError> for RunError {
    fn from(e: EnvError) -> Self {
        RunError::Sim(SimError::Env(e))
    }
}
