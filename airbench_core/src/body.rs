//! Simulated vehicle body: parameters, control API, and ground truth in one unit.

use crate::control_api::ControlApi;
use crate::error::CoreError;
use crate::params::VehicleParams;
use crate::physics::{PhysicsEngine, WindModel};
use crate::vehicle_state::{StateSnapshot, VehicleState};

use airbench_env::{SimClock, VehicleId};
use nalgebra::Vector3;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

/// Anything the physics loop can step.
pub trait PhysicsBody: Send + Sync {
    /// Called once when the body joins a physics loop.
    fn attach(&self, id: VehicleId, wind_seed: u64) -> Result<(), CoreError>;

    /// Advances the body by one fixed step ending at `timestamp`.
    fn step(&self, dt: Duration, tick: u64, timestamp: Duration);

    /// Latest published state.
    fn snapshot(&self) -> Arc<StateSnapshot>;

    /// Profile name, for logs.
    fn name(&self) -> &str;
}

/// A multirotor driven by its [`ControlApi`].
pub struct VehicleBody<C: SimClock> {
    params: VehicleParams,
    api: Arc<ControlApi<C>>,
    state: Arc<VehicleState>,
    engine: Box<dyn PhysicsEngine>,
    registration: OnceLock<VehicleId>,

    /// Wind stream; the lock also serializes steps against `set_grounded`
    dynamics: Mutex<WindModel>,
}

impl<C: SimClock> VehicleBody<C> {
    /// Assembles a body and points its control API at the body's state.
    pub fn new(
        params: VehicleParams,
        api: Arc<ControlApi<C>>,
        state: Arc<VehicleState>,
        engine: Box<dyn PhysicsEngine>,
    ) -> Result<Self, CoreError> {
        api.bind_ground_truth(Arc::clone(&state))?;
        let wind = WindModel::new(0, &params.wind);

        Ok(Self {
            params,
            api,
            state,
            engine,
            registration: OnceLock::new(),
            dynamics: Mutex::new(wind),
        })
    }

    pub fn api(&self) -> &Arc<ControlApi<C>> {
        &self.api
    }

    pub fn state(&self) -> &Arc<VehicleState> {
        &self.state
    }

    pub fn params(&self) -> &VehicleParams {
        &self.params
    }

    /// Id assigned at registration.
    pub fn id(&self) -> Option<VehicleId> {
        self.registration.get().copied()
    }

    pub fn is_registered(&self) -> bool {
        self.registration.get().is_some()
    }

    /// Establishes (`true`) or revokes (`false`) ground contact.
    ///
    /// Establishing puts the body at rest on the ground plane below its
    /// current position. Only valid once the body is registered with a
    /// physics loop, since a later registration would not see it.
    pub fn set_grounded(&self, grounded: bool) -> Result<(), CoreError> {
        if !self.is_registered() {
            return Err(CoreError::NotRegistered(self.params.name.clone()));
        }

        let _step = self.dynamics.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = (*self.state.snapshot()).clone();
        if grounded {
            let mut position = next.position();
            position.z = 0.0;
            next.kinematics.pose.position = position;
            next.kinematics.twist.linear = Vector3::zeros();
            next.kinematics.twist.angular = Vector3::zeros();
            next.kinematics.linear_acceleration = Vector3::zeros();
            next.environment.update(position, Vector3::zeros());
        }
        next.grounded = grounded;
        next.ground_established = grounded;

        let published = self.state.publish(next);
        self.api.observe(&published);
        info!(vehicle = %self.params.name, grounded, "ground contact set");
        Ok(())
    }
}

impl<C: SimClock> PhysicsBody for VehicleBody<C> {
    fn attach(&self, id: VehicleId, wind_seed: u64) -> Result<(), CoreError> {
        if let Some(existing) = self.registration.get() {
            return Err(CoreError::AlreadyRegistered(existing.to_string()));
        }
        self.registration
            .set(id)
            .map_err(|id| CoreError::AlreadyRegistered(id.to_string()))?;
        *self.dynamics.lock().unwrap_or_else(PoisonError::into_inner) =
            WindModel::new(wind_seed, &self.params.wind);
        debug!(vehicle = %self.params.name, %id, wind_seed, "body attached");
        Ok(())
    }

    fn step(&self, dt: Duration, tick: u64, timestamp: Duration) {
        let mut wind = self.dynamics.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.state.snapshot();

        let actuation = self.api.actuation(&current);
        let disturbance = wind.sample();
        let integration = self.engine.integrate(
            &current.kinematics,
            current.grounded,
            &actuation,
            &disturbance,
            &self.params,
            dt.as_secs_f64(),
        );

        let mut environment = current.environment;
        environment.update(integration.kinematics.pose.position, disturbance);

        let published = self.state.publish(StateSnapshot {
            kinematics: integration.kinematics,
            environment,
            grounded: integration.grounded,
            ground_established: current.ground_established,
            timestamp,
            tick,
        });
        self.api.observe(&published);
    }

    fn snapshot(&self) -> Arc<StateSnapshot> {
        self.state.snapshot()
    }

    fn name(&self) -> &str {
        &self.params.name
    }
}
