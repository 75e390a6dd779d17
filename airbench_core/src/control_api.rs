//! Synchronous vehicle-control facade.
//!
//! Commands are validated against a small state machine, then resolved by the
//! simulated [`FlightController`]. Blocking commands (`takeoff`,
//! `move_to_position`, `land`) never sleep on wall time: they step the
//! virtual clock, which in turn waits for the physics loop to execute the tick.
//!
//! ```text
//! ControlDisabled <-> ControlEnabled -> Armed -> TakingOff -> Hovering <-> Moving
//!                                         ^                     |
//!                                         +---- Landed <- Landing
//! ```

use crate::controller::{FlightController, HeadingControl, PathTarget, Setpoint};
use crate::error::{CommandError, CoreError};
use crate::kinematics::GeoPoint;
use crate::params::VehicleParams;
use crate::physics::Actuation;
use crate::vehicle_state::{StateSnapshot, VehicleState};

use airbench_env::{duration_from_secs, EnvError, SimClock};
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Externally visible state of the control API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiState {
    ControlDisabled,
    ControlEnabled,
    Armed,
    TakingOff,
    Hovering,
    Moving,
    Landing,
    Landed,
}

/// Flight phase tracked independently of the API-control flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlightPhase {
    Disarmed,
    Armed,
    TakingOff,
    Hovering,
    Moving,
    Landing,
    Landed,
}

impl FlightPhase {
    fn is_airborne(self) -> bool {
        matches!(
            self,
            FlightPhase::TakingOff | FlightPhase::Hovering | FlightPhase::Moving | FlightPhase::Landing
        )
    }
}

/// How yaw relates to the direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DrivetrainType {
    /// Yaw is controlled independently of the path
    #[default]
    MaxDegreeOfFreedom,

    /// The nose follows the path; the yaw angle is an offset from it
    ForwardOnly,
}

/// Heading target during movement.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct YawMode {
    /// `yaw_or_rate` is a rate (deg/s) rather than an angle (deg)
    pub is_rate: bool,
    pub yaw_or_rate: f64,
}

impl YawMode {
    pub fn new(is_rate: bool, yaw_or_rate: f64) -> Self {
        Self { is_rate, yaw_or_rate }
    }

    pub fn angle(degrees: f64) -> Self {
        Self::new(false, degrees)
    }

    pub fn rate(degrees_per_sec: f64) -> Self {
        Self::new(true, degrees_per_sec)
    }
}

/// Result of a control command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// The command reached its goal after `elapsed` virtual time
    Completed { elapsed: Duration },

    /// The goal was not reached in time; the vehicle holds its position
    TimedOut { elapsed: Duration, diagnostic: String },

    /// The command was refused before anything moved
    Rejected { error: CommandError },
}

impl CommandOutcome {
    fn done() -> Self {
        CommandOutcome::Completed { elapsed: Duration::ZERO }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CommandOutcome::Completed { .. })
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, CommandOutcome::TimedOut { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, CommandOutcome::Rejected { .. })
    }

    /// Virtual time the command spent, if it ran at all.
    pub fn elapsed(&self) -> Option<Duration> {
        match self {
            CommandOutcome::Completed { elapsed } | CommandOutcome::TimedOut { elapsed, .. } => {
                Some(*elapsed)
            }
            CommandOutcome::Rejected { .. } => None,
        }
    }

    /// Why the command did not complete, if it did not.
    pub fn diagnostic(&self) -> Option<String> {
        match self {
            CommandOutcome::Completed { .. } => None,
            CommandOutcome::TimedOut { diagnostic, .. } => Some(diagnostic.clone()),
            CommandOutcome::Rejected { error } => Some(error.to_string()),
        }
    }
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutcome::Completed { elapsed } => {
                write!(f, "completed in {:.3}s", elapsed.as_secs_f64())
            }
            CommandOutcome::TimedOut { elapsed, diagnostic } => {
                write!(f, "timed out after {:.3}s: {diagnostic}", elapsed.as_secs_f64())
            }
            CommandOutcome::Rejected { error } => write!(f, "rejected: {error}"),
        }
    }
}

/// Answer of [`ControlApi::is_ready`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readiness {
    pub ready: bool,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LandedState {
    Landed,
    Flying,
}

/// Vehicle state as reported to API clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub position: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,

    /// Heading in radians
    pub yaw: f64,
    pub linear_velocity: Vector3<f64>,
    pub geo_point: GeoPoint,
    pub landed_state: LandedState,
    pub timestamp: Duration,
    pub api_state: ApiState,
}

struct ApiInner {
    api_enabled: bool,
    phase: FlightPhase,
    setpoint: Setpoint,
    messages: Vec<String>,
    last_grounded: Option<bool>,
}

impl ApiInner {
    fn new() -> Self {
        Self {
            api_enabled: false,
            phase: FlightPhase::Disarmed,
            setpoint: Setpoint::Idle,
            messages: Vec::new(),
            last_grounded: None,
        }
    }

    fn api_state(&self) -> ApiState {
        if !self.api_enabled {
            return ApiState::ControlDisabled;
        }
        match self.phase {
            FlightPhase::Disarmed => ApiState::ControlEnabled,
            FlightPhase::Armed => ApiState::Armed,
            FlightPhase::TakingOff => ApiState::TakingOff,
            FlightPhase::Hovering => ApiState::Hovering,
            FlightPhase::Moving => ApiState::Moving,
            FlightPhase::Landing => ApiState::Landing,
            FlightPhase::Landed => ApiState::Landed,
        }
    }
}

enum Wait {
    Reached(Duration),
    Expired(Duration),
}

/// Command facade of one simulated multirotor.
pub struct ControlApi<C: SimClock> {
    clock: Arc<C>,
    params: VehicleParams,
    controller: FlightController,
    ground_truth: OnceLock<Arc<VehicleState>>,
    inner: Mutex<ApiInner>,

    /// Serializes blocking commands
    command_lock: Mutex<()>,
}

impl<C: SimClock> ControlApi<C> {
    pub fn new(params: VehicleParams, clock: Arc<C>) -> Self {
        Self {
            controller: FlightController::new(&params),
            clock,
            params,
            ground_truth: OnceLock::new(),
            inner: Mutex::new(ApiInner::new()),
            command_lock: Mutex::new(()),
        }
    }

    pub fn params(&self) -> &VehicleParams {
        &self.params
    }

    /// Binds the simulated ground truth and resets the state machine.
    ///
    /// An API drives exactly one body for its whole life.
    pub fn bind_ground_truth(&self, state: Arc<VehicleState>) -> Result<(), CoreError> {
        self.ground_truth
            .set(state)
            .map_err(|_| CoreError::AlreadyBound)?;
        *self.lock_inner() = ApiInner::new();
        debug!(vehicle = %self.params.name, "ground truth bound");
        Ok(())
    }

    /// Reports whether commands can run: ground truth bound and physics driving the clock.
    pub fn is_ready(&self) -> Readiness {
        if self.ground_truth.get().is_none() {
            return Readiness {
                ready: false,
                message: "simulated ground truth is not set".to_string(),
            };
        }
        if !self.clock.is_driven() {
            return Readiness {
                ready: false,
                message: "physics loop is not running: no tick driver on the clock".to_string(),
            };
        }
        Readiness {
            ready: true,
            message: format!("{} ready", self.params.name),
        }
    }

    pub fn api_state(&self) -> ApiState {
        self.lock_inner().api_state()
    }

    /// Returns the latest telemetry.
    pub fn state(&self) -> Result<Telemetry, CommandError> {
        let snapshot = self.ground_truth.get().ok_or(CommandError::NotBound)?.snapshot();
        let api_state = self.api_state();

        Ok(Telemetry {
            position: snapshot.position(),
            orientation: snapshot.kinematics.pose.orientation,
            yaw: snapshot.kinematics.pose.yaw(),
            linear_velocity: snapshot.kinematics.twist.linear,
            geo_point: snapshot.environment.geo_point,
            landed_state: if snapshot.grounded {
                LandedState::Landed
            } else {
                LandedState::Flying
            },
            timestamp: snapshot.timestamp,
            api_state,
        })
    }

    pub fn status_messages(&self) -> Vec<String> {
        self.lock_inner().messages.clone()
    }

    pub fn drain_status_messages(&self) -> Vec<String> {
        std::mem::take(&mut self.lock_inner().messages)
    }

    pub fn clear_status_messages(&self) {
        self.lock_inner().messages.clear();
    }

    pub fn enable_api_control(&self, enable: bool) -> CommandOutcome {
        let mut inner = self.lock_inner();
        if inner.api_enabled != enable {
            inner.api_enabled = enable;
            let text = if enable { "API control enabled" } else { "API control disabled" };
            self.push_message(&mut inner, text.to_string());
            debug!(state = ?inner.api_state(), "{text}");
        }
        CommandOutcome::done()
    }

    pub fn arm_disarm(&self, arm: bool) -> CommandOutcome {
        let command = if arm { "arm" } else { "disarm" };
        let mut inner = self.lock_inner();

        if !inner.api_enabled {
            return self.reject_locked(&mut inner, command, CommandError::ApiControlDisabled);
        }
        let snapshot = match self.ground_truth.get() {
            Some(state) => state.snapshot(),
            None => return self.reject_locked(&mut inner, command, CommandError::NotBound),
        };

        if arm {
            if !snapshot.ground_established {
                return self.reject_locked(&mut inner, command, CommandError::GroundContactNotEstablished);
            }
            if !snapshot.grounded {
                return self.reject_locked(
                    &mut inner,
                    command,
                    CommandError::NotOnGround("arming requires ground contact".to_string()),
                );
            }
            if inner.phase == FlightPhase::Disarmed {
                inner.phase = FlightPhase::Armed;
                self.push_message(&mut inner, "vehicle armed".to_string());
                debug!(state = ?inner.api_state(), "armed");
            }
        } else {
            if inner.phase.is_airborne() && !snapshot.grounded {
                return self.reject_locked(
                    &mut inner,
                    command,
                    CommandError::NotOnGround("cannot disarm while airborne".to_string()),
                );
            }
            if inner.phase != FlightPhase::Disarmed {
                inner.phase = FlightPhase::Disarmed;
                inner.setpoint = Setpoint::Idle;
                self.push_message(&mut inner, "vehicle disarmed".to_string());
                debug!(state = ?inner.api_state(), "disarmed");
            }
        }

        CommandOutcome::done()
    }

    /// Climbs `takeoff_altitude` above the current position and settles there.
    pub fn takeoff(&self, timeout_secs: f64) -> CommandOutcome {
        let _command = self.command_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let timeout = match parse_timeout(timeout_secs) {
            Ok(timeout) => timeout,
            Err(error) => return self.reject("takeoff", error),
        };

        let (state, target, yaw) = {
            let mut inner = self.lock_inner();
            let state = match self.admit(&inner) {
                Ok(state) => state,
                Err(error) => return self.reject_locked(&mut inner, "takeoff", error),
            };
            let snapshot = state.snapshot();
            if inner.phase.is_airborne() || !snapshot.grounded {
                return self.reject_locked(&mut inner, "takeoff", CommandError::AlreadyAirborne);
            }
            if let Err(error) = self.require_driver() {
                return self.reject_locked(&mut inner, "takeoff", error);
            }

            let yaw = snapshot.kinematics.pose.yaw();
            let target = snapshot.position() + Vector3::new(0.0, 0.0, -self.params.takeoff_altitude);
            inner.phase = FlightPhase::TakingOff;
            inner.setpoint = Setpoint::Hold {
                position: target,
                heading: HeadingControl::Angle(yaw),
            };
            self.push_message(
                &mut inner,
                format!("taking off to {:.2} m", -target.z),
            );
            debug!(state = ?inner.api_state(), target_altitude = -target.z, "takeoff started");
            (state, target, yaw)
        };

        let tolerance = self.params.takeoff_tolerance;
        let settle = self.params.settle_velocity;
        let waited = self.wait_until(&state, timeout, |snapshot| {
            (snapshot.position().z - target.z).abs() <= tolerance && snapshot.speed() < settle
        });

        let mut inner = self.lock_inner();
        match waited {
            Ok(Wait::Reached(elapsed)) => {
                inner.phase = FlightPhase::Hovering;
                self.push_message(
                    &mut inner,
                    format!("takeoff complete at {:.2} m", state.snapshot().altitude()),
                );
                info!(elapsed_secs = elapsed.as_secs_f64(), "takeoff complete");
                CommandOutcome::Completed { elapsed }
            }
            Ok(Wait::Expired(elapsed)) => {
                self.hold_here(&mut inner, &state, HeadingControl::Angle(yaw));
                self.timed_out(&mut inner, "takeoff", elapsed)
            }
            Err(error) => {
                self.hold_here(&mut inner, &state, HeadingControl::Angle(yaw));
                self.reject_locked(&mut inner, "takeoff", physics_stopped(error))
            }
        }
    }

    /// Flies a straight line to the NED target.
    ///
    /// `lookahead` < 0 selects the automatic carrot distance.
    #[allow(clippy::too_many_arguments)]
    pub fn move_to_position(
        &self,
        x: f64,
        y: f64,
        z: f64,
        velocity: f64,
        timeout_secs: f64,
        drivetrain: DrivetrainType,
        yaw_mode: YawMode,
        lookahead: f64,
        adaptive_lookahead: f64,
    ) -> CommandOutcome {
        let _command = self.command_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let target = Vector3::new(x, y, z);

        let validated = parse_timeout(timeout_secs).and_then(|timeout| {
            if !target.iter().all(|v| v.is_finite()) {
                return Err(CommandError::InvalidParameter(format!(
                    "target ({x}, {y}, {z}) is not finite"
                )));
            }
            if !(velocity.is_finite() && velocity > 0.0) {
                return Err(CommandError::InvalidParameter(format!(
                    "velocity must be positive, got {velocity}"
                )));
            }
            if lookahead == 0.0 || !lookahead.is_finite() || !adaptive_lookahead.is_finite() {
                return Err(CommandError::InvalidParameter(format!(
                    "lookahead must be positive or -1 (automatic), got {lookahead}"
                )));
            }
            if !yaw_mode.yaw_or_rate.is_finite() {
                return Err(CommandError::InvalidParameter("yaw must be finite".to_string()));
            }
            if drivetrain == DrivetrainType::ForwardOnly && yaw_mode.is_rate {
                return Err(CommandError::InvalidParameter(
                    "ForwardOnly drivetrain cannot use a yaw rate".to_string(),
                ));
            }
            Ok(timeout)
        });
        let timeout = match validated {
            Ok(timeout) => timeout,
            Err(error) => return self.reject("move_to_position", error),
        };

        let (state, path) = {
            let mut inner = self.lock_inner();
            let state = match self.admit(&inner) {
                Ok(state) => state,
                Err(error) => return self.reject_locked(&mut inner, "move_to_position", error),
            };
            if !matches!(inner.phase, FlightPhase::Hovering | FlightPhase::Moving) {
                return self.reject_locked(&mut inner, "move_to_position", CommandError::NotAirborne);
            }
            if let Err(error) = self.require_driver() {
                return self.reject_locked(&mut inner, "move_to_position", error);
            }

            let heading = match (drivetrain, yaw_mode.is_rate) {
                (DrivetrainType::ForwardOnly, _) => HeadingControl::AlongPath {
                    offset: yaw_mode.yaw_or_rate.to_radians(),
                },
                (DrivetrainType::MaxDegreeOfFreedom, true) => {
                    HeadingControl::Rate(yaw_mode.yaw_or_rate.to_radians())
                }
                (DrivetrainType::MaxDegreeOfFreedom, false) => {
                    HeadingControl::Angle(yaw_mode.yaw_or_rate.to_radians())
                }
            };
            let lookahead = if lookahead < 0.0 {
                PathTarget::auto_lookahead(
                    velocity,
                    adaptive_lookahead,
                    self.params.command_period,
                    self.params.distance_accuracy,
                )
            } else {
                lookahead
            };

            inner.phase = FlightPhase::Moving;
            let path = PathTarget {
                origin: state.snapshot().position(),
                target,
                velocity,
                lookahead,
                heading,
            };
            inner.setpoint = Setpoint::Track(path);
            self.push_message(
                &mut inner,
                format!("moving to ({x:.2}, {y:.2}, {z:.2}) at {velocity:.2} m/s"),
            );
            debug!(state = ?inner.api_state(), lookahead, "move started");
            (state, path)
        };

        let accuracy = self.params.distance_accuracy;
        let waited = self.wait_until(&state, timeout, |snapshot| {
            (snapshot.position() - target).norm() <= accuracy
        });

        let mut inner = self.lock_inner();
        let yaw = state.snapshot().kinematics.pose.yaw();
        match waited {
            Ok(Wait::Reached(elapsed)) => {
                inner.phase = FlightPhase::Hovering;
                inner.setpoint = Setpoint::Hold {
                    position: target,
                    heading: path.settled_heading(yaw),
                };
                self.push_message(&mut inner, format!("reached ({x:.2}, {y:.2}, {z:.2})"));
                info!(elapsed_secs = elapsed.as_secs_f64(), "move complete");
                CommandOutcome::Completed { elapsed }
            }
            Ok(Wait::Expired(elapsed)) => {
                self.hold_here(&mut inner, &state, HeadingControl::Angle(yaw));
                self.timed_out(&mut inner, "move_to_position", elapsed)
            }
            Err(error) => {
                self.hold_here(&mut inner, &state, HeadingControl::Angle(yaw));
                self.reject_locked(&mut inner, "move_to_position", physics_stopped(error))
            }
        }
    }

    /// Descends at `landing_velocity` until touchdown.
    pub fn land(&self, timeout_secs: f64) -> CommandOutcome {
        let _command = self.command_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let timeout = match parse_timeout(timeout_secs) {
            Ok(timeout) => timeout,
            Err(error) => return self.reject("land", error),
        };

        let (state, yaw) = {
            let mut inner = self.lock_inner();
            let state = match self.admit(&inner) {
                Ok(state) => state,
                Err(error) => return self.reject_locked(&mut inner, "land", error),
            };
            if !inner.phase.is_airborne() {
                self.push_message(&mut inner, "land: already on the ground".to_string());
                return CommandOutcome::done();
            }
            if let Err(error) = self.require_driver() {
                return self.reject_locked(&mut inner, "land", error);
            }

            let snapshot = state.snapshot();
            let yaw = snapshot.kinematics.pose.yaw();
            inner.phase = FlightPhase::Landing;
            inner.setpoint = Setpoint::Descend {
                position: snapshot.position(),
                rate: self.params.landing_velocity,
                heading: HeadingControl::Angle(yaw),
            };
            self.push_message(&mut inner, format!("landing from {:.2} m", snapshot.altitude()));
            debug!(state = ?inner.api_state(), "landing started");
            (state, yaw)
        };

        let waited = self.wait_until(&state, timeout, |snapshot| snapshot.grounded);

        let mut inner = self.lock_inner();
        match waited {
            Ok(Wait::Reached(elapsed)) => {
                inner.phase = FlightPhase::Landed;
                inner.setpoint = Setpoint::Idle;
                self.push_message(&mut inner, "landing complete".to_string());
                info!(elapsed_secs = elapsed.as_secs_f64(), "landed");
                CommandOutcome::Completed { elapsed }
            }
            Ok(Wait::Expired(elapsed)) => {
                self.hold_here(&mut inner, &state, HeadingControl::Angle(yaw));
                self.timed_out(&mut inner, "land", elapsed)
            }
            Err(error) => {
                self.hold_here(&mut inner, &state, HeadingControl::Angle(yaw));
                self.reject_locked(&mut inner, "land", physics_stopped(error))
            }
        }
    }

    /// Holds the current position.
    pub fn hover(&self) -> CommandOutcome {
        let _command = self.command_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut inner = self.lock_inner();
        let state = match self.admit(&inner) {
            Ok(state) => state,
            Err(error) => return self.reject_locked(&mut inner, "hover", error),
        };
        if !inner.phase.is_airborne() {
            return self.reject_locked(&mut inner, "hover", CommandError::NotAirborne);
        }

        let yaw = state.snapshot().kinematics.pose.yaw();
        self.hold_here(&mut inner, &state, HeadingControl::Angle(yaw));
        self.push_message(&mut inner, "hovering".to_string());
        CommandOutcome::done()
    }

    /// Physics-side: computes the actuation for the current setpoint.
    pub fn actuation(&self, snapshot: &StateSnapshot) -> Actuation {
        let inner = self.lock_inner();
        if inner.phase == FlightPhase::Disarmed {
            return Actuation::idle();
        }
        self.controller.compute(&inner.setpoint, &snapshot.kinematics)
    }

    /// Physics-side: notes liftoff and touchdown in the freshly published state.
    pub fn observe(&self, snapshot: &StateSnapshot) {
        let mut inner = self.lock_inner();
        let previous = inner.last_grounded.replace(snapshot.grounded);

        match (previous, snapshot.grounded) {
            (Some(false), true) => {
                if inner.phase == FlightPhase::Landing {
                    inner.phase = FlightPhase::Landed;
                    inner.setpoint = Setpoint::Idle;
                }
                self.push_message(&mut inner, "touchdown".to_string());
                debug!(tick = snapshot.tick, state = ?inner.api_state(), "touchdown");
            }
            (Some(true), false) => {
                self.push_message(&mut inner, "liftoff".to_string());
                debug!(tick = snapshot.tick, state = ?inner.api_state(), "liftoff");
            }
            _ => {}
        }
    }

    /// Checks shared by every flight command.
    fn admit(&self, inner: &ApiInner) -> Result<Arc<VehicleState>, CommandError> {
        if !inner.api_enabled {
            return Err(CommandError::ApiControlDisabled);
        }
        if inner.phase == FlightPhase::Disarmed {
            return Err(CommandError::NotArmed);
        }
        let state = self.ground_truth.get().ok_or(CommandError::NotBound)?;
        if !state.snapshot().ground_established {
            return Err(CommandError::GroundContactNotEstablished);
        }
        Ok(Arc::clone(state))
    }

    fn require_driver(&self) -> Result<(), CommandError> {
        if self.clock.is_driven() {
            Ok(())
        } else {
            Err(CommandError::PhysicsNotRunning(
                "no tick driver attached to the clock".to_string(),
            ))
        }
    }

    /// Steps virtual time until `done` holds or `timeout` has elapsed.
    ///
    /// Returns within `timeout` plus one clock step.
    fn wait_until<F>(&self, state: &VehicleState, timeout: Duration, mut done: F) -> Result<Wait, EnvError>
    where
        F: FnMut(&StateSnapshot) -> bool,
    {
        let start = self.clock.now();
        loop {
            let elapsed = self.clock.now().saturating_sub(start);
            if done(&state.snapshot()) {
                return Ok(Wait::Reached(elapsed));
            }
            if elapsed >= timeout {
                return Ok(Wait::Expired(elapsed));
            }
            self.clock.step()?;
        }
    }

    fn hold_here(&self, inner: &mut ApiInner, state: &VehicleState, heading: HeadingControl) {
        let snapshot = state.snapshot();
        if !inner.phase.is_airborne() {
            return;
        }
        if snapshot.grounded {
            // Never left (or already back on) the ground
            inner.phase = FlightPhase::Landed;
            inner.setpoint = Setpoint::Idle;
        } else {
            inner.phase = FlightPhase::Hovering;
            inner.setpoint = Setpoint::Hold {
                position: snapshot.position(),
                heading,
            };
        }
    }

    fn timed_out(&self, inner: &mut ApiInner, command: &str, elapsed: Duration) -> CommandOutcome {
        let diagnostic = format!(
            "{command} did not finish within {:.3}s, holding position",
            elapsed.as_secs_f64()
        );
        self.push_message(inner, diagnostic.clone());
        warn!(command, elapsed_secs = elapsed.as_secs_f64(), "command timed out");
        CommandOutcome::TimedOut { elapsed, diagnostic }
    }

    fn reject(&self, command: &str, error: CommandError) -> CommandOutcome {
        let mut inner = self.lock_inner();
        self.reject_locked(&mut inner, command, error)
    }

    fn reject_locked(&self, inner: &mut ApiInner, command: &str, error: CommandError) -> CommandOutcome {
        self.push_message(inner, format!("{command} rejected: {error}"));
        warn!(command, %error, "command rejected");
        CommandOutcome::Rejected { error }
    }

    fn push_message(&self, inner: &mut ApiInner, text: String) {
        let stamped = format!("[{:>9.3}s] {text}", self.clock.now().as_secs_f64());
        inner.messages.push(stamped);
    }

    fn lock_inner(&self) -> MutexGuard<'_, ApiInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn parse_timeout(timeout_secs: f64) -> Result<Duration, CommandError> {
    if !(timeout_secs.is_finite() && timeout_secs >= 0.0) {
        return Err(CommandError::InvalidParameter(format!(
            "timeout must be a non-negative number of seconds, got {timeout_secs}"
        )));
    }
    duration_from_secs(timeout_secs).map_err(|e| CommandError::InvalidParameter(e.to_string()))
}

fn physics_stopped(error: EnvError) -> CommandError {
    CommandError::PhysicsNotRunning(error.to_string())
}
