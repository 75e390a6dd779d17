//! SimWorld - the simulation harness container.

use crate::error::SimError;
use crate::physics_loop::{LoopStats, PhysicsLoop};

use airbench_core::{
    ControlApi, EnvironmentState, KinematicIntegrator, KinematicsState, SettingsProvider,
    VehicleBody, VehicleParams, VehicleState, SIMPLE_FLIGHT,
};
use airbench_env::{SimClock, VirtualClock};
use nalgebra::Vector3;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a flight test run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Virtual clock step in seconds
    pub step_secs: f64,

    /// Virtual time to let the world settle before the first command
    pub stabilize_secs: f64,

    /// Virtual time spent hovering between takeoff and the waypoint
    pub hover_secs: f64,

    /// Waypoint (NED, metres)
    pub waypoint: Vector3<f64>,

    /// Cruise speed towards the waypoint (m/s)
    pub velocity: f64,

    pub takeoff_timeout: f64,
    pub move_timeout: f64,
    pub land_timeout: f64,

    /// Vehicle profile name
    pub vehicle: String,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            step_secs: 3e-3,
            stabilize_secs: 0.04,
            hover_secs: 2.0,
            waypoint: Vector3::new(-5.0, -5.0, -5.0),
            velocity: 5.0,
            takeoff_timeout: 50.0,
            move_timeout: 1e3,
            land_timeout: 10.0,
            vehicle: SIMPLE_FLIGHT.to_string(),
        }
    }
}

/// The SimWorld - one clock, one physics loop, and the vehicles it steps.
pub struct SimWorld {
    /// Configuration
    pub config: SimConfig,

    clock: Arc<VirtualClock>,
    physics: PhysicsLoop,
    vehicles: Vec<Arc<VehicleBody<VirtualClock>>>,
}

impl SimWorld {
    /// Creates a world with its own clock. The physics loop is not started.
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        let clock = Arc::new(VirtualClock::from_secs(config.step_secs)?);
        let physics = PhysicsLoop::new(Arc::clone(&clock)).with_seed(config.seed);

        Ok(Self {
            config,
            clock,
            physics,
            vehicles: Vec::new(),
        })
    }

    /// Builds a body at the origin around an existing control API and registers it.
    pub fn add_vehicle(
        &mut self,
        params: VehicleParams,
        api: Arc<ControlApi<VirtualClock>>,
    ) -> Result<Arc<VehicleBody<VirtualClock>>, SimError> {
        let origin = Vector3::zeros();
        let state = VehicleState::shared(
            KinematicsState::at_rest(origin),
            EnvironmentState::new(origin, params.home),
        );
        let body = Arc::new(VehicleBody::new(params, api, state, Box::new(KinematicIntegrator))?);

        self.physics.register(body.clone())?;
        self.vehicles.push(Arc::clone(&body));
        Ok(body)
    }

    /// Resolves a profile and spawns a vehicle from it.
    pub fn spawn_vehicle(
        &mut self,
        settings: &dyn SettingsProvider,
        name: &str,
    ) -> Result<Arc<VehicleBody<VirtualClock>>, SimError> {
        let params = settings.create_config(name)?;
        let api = params.create_control_api(Arc::clone(&self.clock))?;
        self.add_vehicle(params, api)
    }

    pub fn start(&mut self) -> Result<(), SimError> {
        self.physics.start()
    }

    pub fn stop(&mut self) -> LoopStats {
        self.physics.stop()
    }

    pub fn is_running(&self) -> bool {
        self.physics.is_running()
    }

    pub fn clock(&self) -> &Arc<VirtualClock> {
        &self.clock
    }

    pub fn vehicles(&self) -> &[Arc<VehicleBody<VirtualClock>>] {
        &self.vehicles
    }

    /// Current virtual time.
    pub fn time(&self) -> Duration {
        self.clock.now()
    }

    pub fn tick_count(&self) -> u64 {
        self.clock.tick_index()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airbench_core::{Settings, SettingsError};

    #[test]
    fn test_world_spawns_registered_vehicles() {
        let mut world = SimWorld::new(SimConfig::default()).unwrap();
        let settings = Settings::default();

        let body = world.spawn_vehicle(&settings, SIMPLE_FLIGHT).unwrap();
        assert!(body.is_registered());
        assert_eq!(world.vehicles().len(), 1);
        assert!(!world.is_running());
        assert!(!body.api().is_ready().ready);

        world.start().unwrap();
        assert!(body.api().is_ready().ready);
        world.stop();
    }

    #[test]
    fn test_world_unknown_profile() {
        let mut world = SimWorld::new(SimConfig::default()).unwrap();
        let result = world.spawn_vehicle(&Settings::default(), "Nope");
        assert!(matches!(
            result,
            Err(SimError::Settings(SettingsError::UnknownProfile(_)))
        ));
    }

    #[test]
    fn test_world_rejects_bad_step() {
        let config = SimConfig {
            step_secs: 0.0,
            ..SimConfig::default()
        };
        assert!(matches!(SimWorld::new(config), Err(SimError::Env(_))));
    }

    #[test]
    fn test_world_time_follows_clock() {
        let mut world = SimWorld::new(SimConfig::default()).unwrap();
        world.spawn_vehicle(&Settings::default(), SIMPLE_FLIGHT).unwrap();
        world.start().unwrap();

        world.clock().sleep_for(0.03).unwrap();
        assert_eq!(world.tick_count(), 10);
        assert_eq!(world.time(), Duration::from_millis(30));
        assert_eq!(world.vehicles()[0].state().snapshot().tick, 10);
    }
}
