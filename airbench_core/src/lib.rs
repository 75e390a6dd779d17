//! airbench Core - Simulated Multirotor and Its Control API
//!
//! This library provides everything one simulated vehicle is made of:
//! 1. **Ground truth**: kinematic + environmental state, published as immutable snapshots
//! 2. **Physics**: a point-mass integrator with inelastic ground contact and seeded wind
//! 3. **Control**: a synchronous command API whose blocking calls step virtual time
//!
//! The physics loop that drives bodies lives in `airbench_sim`; this crate
//! only knows about one step at a time.

pub mod body;
pub mod control_api;
pub mod controller;
pub mod error;
pub mod kinematics;
pub mod params;
pub mod physics;
pub mod vehicle_state;

// Re-export key types for convenience
pub use body::{PhysicsBody, VehicleBody};
pub use control_api::{
    ApiState, CommandOutcome, ControlApi, DrivetrainType, LandedState, Readiness, Telemetry, YawMode,
};
pub use controller::{FlightController, HeadingControl, PathTarget, Setpoint};
pub use error::{CommandError, CoreError, SettingsError};
pub use kinematics::{EnvironmentState, GeoPoint, KinematicsState, Pose, Twist, GRAVITY};
pub use params::{
    ControllerGains, Settings, SettingsProvider, VehicleParams, WindParams, SIMPLE_FLIGHT,
};
pub use physics::{Actuation, Integration, KinematicIntegrator, PhysicsEngine, WindModel};
pub use vehicle_state::{StateSnapshot, VehicleState};
