//! Flight test runner - scripts command sequences against a simulated vehicle.

use crate::error::RunError;
use crate::scenarios::ScenarioId;
use crate::status_log::StatusLog;
use crate::world::{SimConfig, SimWorld};

use airbench_core::{
    ApiState, CommandError, CommandOutcome, ControlApi, DrivetrainType, LandedState, Settings,
    SettingsProvider, VehicleBody, YawMode,
};
use airbench_env::{duration_from_secs, SimClock, VirtualClock};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::mem::discriminant;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Land timeout used to provoke a timeout (s)
const SHORT_LAND_TIMEOUT_SECS: f64 = 0.5;

/// Largest altitude still counted as landed (m)
const LANDED_ALTITUDE_TOLERANCE: f64 = 0.1;

/// Telemetry captured at the end of one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    /// Command or wait that ended the phase
    pub phase: String,

    /// Human-readable command outcome
    pub outcome: String,

    pub success: bool,

    /// Virtual time the command spent (None if it was rejected)
    pub elapsed_secs: Option<f64>,

    /// Virtual time at the end of the phase
    pub time_secs: f64,

    /// Physics tick of the telemetry
    pub tick: u64,

    pub position: Vector3<f64>,
    pub altitude: f64,
    pub api_state: ApiState,
    pub landed_state: LandedState,
}

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Physics ticks executed
    pub total_ticks: u64,

    /// Final simulation time in seconds
    pub final_time_secs: f64,

    /// Vehicle position at the end (None if no vehicle was built)
    pub final_position: Option<Vector3<f64>>,

    /// Phase-by-phase trace
    pub phases: Vec<PhaseRecord>,

    /// Every status message, in order
    pub status_messages: Vec<String>,

    /// Failure message if any
    pub failure_reason: Option<String>,
}

/// Runs flight test scenarios.
#[derive(Clone)]
pub struct FlightTestRunner {
    config: SimConfig,
    settings: Arc<dyn SettingsProvider>,
    log_path: Option<PathBuf>,
}

impl FlightTestRunner {
    /// Creates a runner with the reference flight sequence and built-in settings.
    pub fn new(seed: u64) -> Self {
        Self {
            config: SimConfig {
                seed,
                ..SimConfig::default()
            },
            settings: Arc::new(Settings::default()),
            log_path: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn with_config(mut self, config: SimConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses a settings document: its profiles and its clock step.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.config.step_secs = settings.clock_step_secs;
        self.settings = Arc::new(settings);
        self
    }

    /// Uses another settings provider (the clock step is left unchanged).
    pub fn with_provider(mut self, provider: Arc<dyn SettingsProvider>) -> Self {
        self.settings = provider;
        self
    }

    /// Sets the clock step in seconds.
    pub fn with_step(mut self, step_secs: f64) -> Self {
        self.config.step_secs = step_secs;
        self
    }

    /// Sets the vehicle profile.
    pub fn with_vehicle(mut self, name: &str) -> Self {
        self.config.vehicle = name.to_string();
        self
    }

    /// Sets the waypoint and cruise speed.
    pub fn with_waypoint(mut self, waypoint: Vector3<f64>, velocity: f64) -> Self {
        self.config.waypoint = waypoint;
        self.config.velocity = velocity;
        self
    }

    /// Sets the land timeout of the final landing.
    pub fn with_land_timeout(mut self, secs: f64) -> Self {
        self.config.land_timeout = secs;
        self
    }

    /// Writes status messages to a log file at `path`.
    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.config.seed);

        let mut session = match self.setup(scenario) {
            Ok(session) => session,
            Err(e) => {
                warn!("{} aborted during setup: {}", scenario.name(), e);
                return ScenarioResult {
                    scenario,
                    seed: self.config.seed,
                    passed: false,
                    total_ticks: 0,
                    final_time_secs: 0.0,
                    final_position: None,
                    phases: Vec::new(),
                    status_messages: Vec::new(),
                    failure_reason: Some(e.to_string()),
                };
            }
        };

        let outcome = match scenario {
            ScenarioId::SimpleFlight => self.run_simple_flight(&mut session),
            ScenarioId::UngroundedCommand => self.run_ungrounded_command(&mut session),
            ScenarioId::ArmBeforeEnable => self.run_arm_before_enable(&mut session),
            ScenarioId::TakeoffBeforeArm => self.run_takeoff_before_arm(&mut session),
            ScenarioId::LandTimeout => self.run_land_timeout(&mut session),
            ScenarioId::CommandBeforeStart => self.run_command_before_start(&mut session),
        };

        session.finish(scenario, self.config.seed, outcome)
    }

    /// Builds the world and the vehicle. The physics loop is left stopped.
    fn setup(&self, scenario: ScenarioId) -> Result<FlightSession, RunError> {
        let mut world = SimWorld::new(self.config.clone())?;

        let params = self
            .settings
            .create_config(&self.config.vehicle)
            .map_err(RunError::MissingProfile)?;
        let api = params
            .create_control_api(Arc::clone(world.clock()))
            .map_err(RunError::ApiCreation)?;
        let body = world.add_vehicle(params, api)?;

        let mut log = self.log_path.as_ref().map(StatusLog::create);
        if let Some(log) = log.as_mut() {
            log.append(&format!(
                "airbench status log: scenario={} seed={} vehicle={}",
                scenario.name(),
                self.config.seed,
                self.config.vehicle
            ))?;
        }

        info!("starting position: {:?}", body.state().snapshot().position());
        Ok(FlightSession {
            world,
            body,
            log,
            phases: Vec::new(),
            messages: Vec::new(),
        })
    }

    /// FT-001: the reference sequence end to end.
    fn run_simple_flight(&self, s: &mut FlightSession) -> Result<(), RunError> {
        self.prepare(s, true)?;
        self.take_off(s)?;
        s.hover_for(self.config.hover_secs)?;
        self.fly_to_waypoint(s)?;
        self.land_and_verify(s)
    }

    /// FT-002: ground contact is a precondition of arming.
    fn run_ungrounded_command(&self, s: &mut FlightSession) -> Result<(), RunError> {
        self.prepare(s, false)?;

        let enable = s.api().enable_api_control(true);
        s.expect_success("enable_api_control", &enable)?;

        let arm = s.api().arm_disarm(true);
        s.expect_rejection("arm", &arm, &CommandError::GroundContactNotEstablished)?;
        if !s.messages.iter().any(|m| m.contains("arm rejected")) {
            return Err(RunError::Assertion(
                "rejected arm produced no status message".to_string(),
            ));
        }

        let takeoff = s.api().takeoff(self.config.takeoff_timeout);
        s.expect_rejection("takeoff", &takeoff, &CommandError::NotArmed)?;

        // Establishing contact afterwards makes the vehicle usable again
        s.body.set_grounded(true)?;
        let arm = s.api().arm_disarm(true);
        s.expect_success("arm_after_grounding", &arm)
    }

    /// FT-003: arming needs API control.
    fn run_arm_before_enable(&self, s: &mut FlightSession) -> Result<(), RunError> {
        self.prepare(s, true)?;

        let arm = s.api().arm_disarm(true);
        s.expect_rejection("arm", &arm, &CommandError::ApiControlDisabled)?;
        s.expect_state(ApiState::ControlDisabled)?;

        let enable = s.api().enable_api_control(true);
        s.expect_success("enable_api_control", &enable)?;
        let arm = s.api().arm_disarm(true);
        s.expect_success("arm", &arm)?;
        s.expect_state(ApiState::Armed)
    }

    /// FT-004: takeoff needs an armed vehicle.
    fn run_takeoff_before_arm(&self, s: &mut FlightSession) -> Result<(), RunError> {
        self.prepare(s, true)?;

        let enable = s.api().enable_api_control(true);
        s.expect_success("enable_api_control", &enable)?;

        let takeoff = s.api().takeoff(self.config.takeoff_timeout);
        s.expect_rejection("takeoff", &takeoff, &CommandError::NotArmed)?;
        s.expect_state(ApiState::ControlEnabled)?;

        let snapshot = s.body.state().snapshot();
        if !snapshot.grounded || snapshot.altitude() != 0.0 {
            return Err(RunError::Assertion(format!(
                "vehicle moved after a rejected takeoff (altitude {:.3})",
                snapshot.altitude()
            )));
        }
        Ok(())
    }

    /// FT-005: a land that cannot finish returns on time and leaves the vehicle hovering.
    fn run_land_timeout(&self, s: &mut FlightSession) -> Result<(), RunError> {
        self.prepare(s, true)?;
        self.take_off(s)?;

        let land = s.api().land(SHORT_LAND_TIMEOUT_SECS);
        s.expect_timeout("land_short", &land, SHORT_LAND_TIMEOUT_SECS)?;
        s.expect_state(ApiState::Hovering)?;

        self.land_and_verify(s)
    }

    /// FT-006: blocking commands fail predictably until the loop runs.
    fn run_command_before_start(&self, s: &mut FlightSession) -> Result<(), RunError> {
        let readiness = s.api().is_ready();
        if readiness.ready {
            return Err(RunError::Assertion(
                "vehicle reported ready before the physics loop started".to_string(),
            ));
        }
        debug!("not ready as expected: {}", readiness.message);

        s.body.set_grounded(true)?;
        s.world.clock().sleep_for(self.config.stabilize_secs)?;

        let enable = s.api().enable_api_control(true);
        s.expect_success("enable_api_control", &enable)?;
        let arm = s.api().arm_disarm(true);
        s.expect_success("arm", &arm)?;

        let takeoff = s.api().takeoff(self.config.takeoff_timeout);
        s.expect_rejection(
            "takeoff_before_start",
            &takeoff,
            &CommandError::PhysicsNotRunning(String::new()),
        )?;

        s.world.start()?;
        s.ensure_ready()?;
        let takeoff = s.api().takeoff(self.config.takeoff_timeout);
        s.expect_success("takeoff", &takeoff)?;
        self.land_and_verify(s)
    }

    /// Starts physics, checks readiness, optionally grounds the vehicle, and lets it settle.
    fn prepare(&self, s: &mut FlightSession, ground: bool) -> Result<(), RunError> {
        s.world.start()?;
        s.ensure_ready()?;
        if ground {
            s.body.set_grounded(true)?;
        }
        s.world.clock().sleep_for(self.config.stabilize_secs)?;
        Ok(())
    }

    fn take_off(&self, s: &mut FlightSession) -> Result<(), RunError> {
        let enable = s.api().enable_api_control(true);
        s.expect_success("enable_api_control", &enable)?;

        let arm = s.api().arm_disarm(true);
        s.expect_success("arm", &arm)?;

        let takeoff = s.api().takeoff(self.config.takeoff_timeout);
        s.expect_success("takeoff", &takeoff)?;
        info!("took-off position: {:?}", s.body.state().snapshot().position());
        Ok(())
    }

    fn fly_to_waypoint(&self, s: &mut FlightSession) -> Result<(), RunError> {
        let target = self.config.waypoint;
        let outcome = s.api().move_to_position(
            target.x,
            target.y,
            target.z,
            self.config.velocity,
            self.config.move_timeout,
            DrivetrainType::MaxDegreeOfFreedom,
            YawMode::rate(0.0),
            -1.0,
            0.0,
        );
        s.expect_success("move_to_position", &outcome)?;
        info!("waypoint position: {:?}", s.body.state().snapshot().position());
        Ok(())
    }

    fn land_and_verify(&self, s: &mut FlightSession) -> Result<(), RunError> {
        let land = s.api().land(self.config.land_timeout);
        s.expect_success("land", &land)?;

        let snapshot = s.body.state().snapshot();
        info!("landed position: {:?}", snapshot.position());
        if !snapshot.grounded || snapshot.altitude().abs() > LANDED_ALTITUDE_TOLERANCE {
            return Err(RunError::Assertion(format!(
                "landing left the vehicle at altitude {:.3} m (grounded={})",
                snapshot.altitude(),
                snapshot.grounded
            )));
        }
        s.expect_state(ApiState::Landed)
    }
}

/// One scenario's world, vehicle, log, and trace.
struct FlightSession {
    world: SimWorld,
    body: Arc<VehicleBody<VirtualClock>>,
    log: Option<StatusLog>,
    phases: Vec<PhaseRecord>,
    messages: Vec<String>,
}

impl FlightSession {
    fn api(&self) -> &ControlApi<VirtualClock> {
        self.body.api()
    }

    fn ensure_ready(&self) -> Result<(), RunError> {
        let readiness = self.api().is_ready();
        if readiness.ready {
            debug!("{}", readiness.message);
            Ok(())
        } else {
            Err(RunError::NotReady(readiness.message))
        }
    }

    /// Holds the current position and lets virtual time pass.
    fn hover_for(&mut self, secs: f64) -> Result<(), RunError> {
        let hold = self.api().hover();
        if !hold.is_success() {
            return self.expect_success("hover", &hold);
        }

        let clock = Arc::clone(self.world.clock());
        let start = clock.now();
        clock.sleep_for(secs)?;
        let outcome = CommandOutcome::Completed {
            elapsed: clock.now().saturating_sub(start),
        };
        self.record("hover", &outcome)
    }

    /// Moves pending status messages into the trace and the log.
    fn flush_messages(&mut self) -> Result<(), RunError> {
        for message in self.body.api().drain_status_messages() {
            if let Some(log) = self.log.as_mut() {
                log.append(&message)?;
            }
            self.messages.push(message);
        }
        Ok(())
    }

    fn record(&mut self, phase: &str, outcome: &CommandOutcome) -> Result<(), RunError> {
        let snapshot = self.body.state().snapshot();
        let api_state = self.api().api_state();

        info!(
            phase,
            %outcome,
            altitude = snapshot.altitude(),
            t = snapshot.timestamp.as_secs_f64(),
            "phase finished"
        );
        self.phases.push(PhaseRecord {
            phase: phase.to_string(),
            outcome: outcome.to_string(),
            success: outcome.is_success(),
            elapsed_secs: outcome.elapsed().map(|e| e.as_secs_f64()),
            time_secs: self.world.time().as_secs_f64(),
            tick: snapshot.tick,
            position: snapshot.position(),
            altitude: snapshot.altitude(),
            api_state,
            landed_state: if snapshot.grounded {
                LandedState::Landed
            } else {
                LandedState::Flying
            },
        });
        self.flush_messages()
    }

    fn expect_success(&mut self, phase: &str, outcome: &CommandOutcome) -> Result<(), RunError> {
        self.record(phase, outcome)?;
        if outcome.is_success() {
            Ok(())
        } else {
            Err(RunError::Assertion(format!("{phase} {outcome}")))
        }
    }

    /// Expects a rejection with the same kind of error as `expected`.
    fn expect_rejection(
        &mut self,
        phase: &str,
        outcome: &CommandOutcome,
        expected: &CommandError,
    ) -> Result<(), RunError> {
        self.record(phase, outcome)?;
        match outcome {
            CommandOutcome::Rejected { error } if discriminant(error) == discriminant(expected) => Ok(()),
            other => Err(RunError::Assertion(format!(
                "{phase}: expected rejection ({expected}), got {other}"
            ))),
        }
    }

    /// Expects a timeout no earlier than `timeout` and within one step after it.
    fn expect_timeout(&mut self, phase: &str, outcome: &CommandOutcome, timeout: f64) -> Result<(), RunError> {
        self.record(phase, outcome)?;
        let CommandOutcome::TimedOut { elapsed, .. } = outcome else {
            return Err(RunError::Assertion(format!("{phase}: expected timeout, got {outcome}")));
        };

        let limit = duration_from_secs(timeout)?;
        let step = self.world.clock().step_size();
        if *elapsed < limit || *elapsed > limit + step {
            return Err(RunError::Assertion(format!(
                "{phase}: returned after {:?}, outside [{limit:?}, {:?}]",
                elapsed,
                limit + step
            )));
        }
        Ok(())
    }

    fn expect_state(&self, expected: ApiState) -> Result<(), RunError> {
        let state = self.api().api_state();
        if state == expected {
            Ok(())
        } else {
            Err(RunError::Assertion(format!("expected {expected:?}, API is {state:?}")))
        }
    }

    /// Flushes and closes the log, stops physics, and builds the result.
    fn finish(mut self, scenario: ScenarioId, seed: u64, outcome: Result<(), RunError>) -> ScenarioResult {
        let flushed = self.flush_messages().and_then(|()| match self.log.as_mut() {
            Some(log) => log.close().map_err(RunError::from),
            None => Ok(()),
        });
        let outcome = outcome.and(flushed);

        let stats = self.world.stop();
        let final_time: Duration = self.world.time();
        let snapshot = self.body.state().snapshot();

        match &outcome {
            Ok(()) => info!("✓ {} finished after {} ticks", scenario.name(), stats.ticks),
            Err(e) => warn!("✗ {} failed: {}", scenario.name(), e),
        }

        ScenarioResult {
            scenario,
            seed,
            passed: outcome.is_ok(),
            total_ticks: stats.ticks,
            final_time_secs: final_time.as_secs_f64(),
            final_position: Some(snapshot.position()),
            phases: self.phases,
            status_messages: self.messages,
            failure_reason: outcome.err().map(|e| e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_simple_flight_scenario() {
        let result = FlightTestRunner::new(42).run(ScenarioId::SimpleFlight);

        assert!(result.passed, "{:?}", result.failure_reason);
        let phases: Vec<&str> = result.phases.iter().map(|p| p.phase.as_str()).collect();
        assert_eq!(
            phases,
            vec!["enable_api_control", "arm", "takeoff", "hover", "move_to_position", "land"]
        );

        let takeoff = &result.phases[2];
        assert!((takeoff.altitude - 3.0).abs() <= 0.1);
        let waypoint = &result.phases[4];
        assert!((waypoint.position - Vector3::new(-5.0, -5.0, -5.0)).norm() <= 0.2);

        let landed = result.phases.last().unwrap();
        assert!(landed.altitude.abs() <= 0.1);
        assert_eq!(landed.api_state, ApiState::Landed);
        assert!(result.status_messages.iter().any(|m| m.ends_with("landing complete")));
        assert!(result.total_ticks > 0);
    }

    #[test]
    fn test_precondition_scenarios_pass() {
        let runner = FlightTestRunner::new(42);
        for scenario in [
            ScenarioId::UngroundedCommand,
            ScenarioId::ArmBeforeEnable,
            ScenarioId::TakeoffBeforeArm,
            ScenarioId::LandTimeout,
            ScenarioId::CommandBeforeStart,
        ] {
            let result = runner.run(scenario);
            assert!(result.passed, "{}: {:?}", scenario, result.failure_reason);
        }
    }

    #[test]
    fn test_ungrounded_command_is_logged() {
        let result = FlightTestRunner::new(42).run(ScenarioId::UngroundedCommand);

        let arm = &result.phases[1];
        assert_eq!(arm.phase, "arm");
        assert!(!arm.success);
        assert!(arm.outcome.contains("ground contact not established"));
        assert!(result
            .status_messages
            .iter()
            .any(|m| m.contains("arm rejected: ground contact not established")));
    }

    #[test]
    fn test_same_seed_is_bit_identical() {
        let first = FlightTestRunner::new(7).run(ScenarioId::SimpleFlight);
        let second = FlightTestRunner::new(7).run(ScenarioId::SimpleFlight);

        assert!(first.passed && second.passed);
        assert_eq!(first.phases, second.phases);
        assert_eq!(first.status_messages, second.status_messages);
        assert_eq!(first.total_ticks, second.total_ticks);
        assert_eq!(first.final_position, second.final_position);
    }

    #[test]
    fn test_different_seed_changes_trace() {
        let first = FlightTestRunner::new(1).run(ScenarioId::SimpleFlight);
        let second = FlightTestRunner::new(2).run(ScenarioId::SimpleFlight);
        assert_ne!(first.final_position, second.final_position);
    }

    #[test]
    fn test_status_log_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");

        let result = FlightTestRunner::new(42)
            .with_log_path(&path)
            .run(ScenarioId::SimpleFlight);
        assert!(result.passed);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert!(lines[0].starts_with("airbench status log: scenario=simple_flight"));
        assert_eq!(lines.len(), result.status_messages.len() + 1);
        assert_eq!(&lines[1..], result.status_messages.as_slice());
    }

    #[test]
    fn test_missing_profile_aborts() {
        let result = FlightTestRunner::new(42)
            .with_vehicle("PX4")
            .run(ScenarioId::SimpleFlight);

        assert!(!result.passed);
        assert!(result.phases.is_empty());
        assert!(result
            .failure_reason
            .as_deref()
            .is_some_and(|r| r.contains("vehicle profile unavailable")));
    }

    #[test]
    fn test_custom_settings_step() {
        let settings = Settings {
            clock_step_secs: 5e-3,
            ..Settings::default()
        };
        let runner = FlightTestRunner::new(3).with_settings(settings);
        assert_eq!(runner.config().step_secs, 5e-3);

        let result = runner.run(ScenarioId::TakeoffBeforeArm);
        assert!(result.passed, "{:?}", result.failure_reason);
        // stabilize 0.04 s at 5 ms
        assert_eq!(result.total_ticks, 8);
    }

    /// Builds a world with the vehicle hovering at takeoff altitude.
    fn airborne_session(seed: u64) -> FlightSession {
        let runner = FlightTestRunner::new(seed);
        let mut session = runner.setup(ScenarioId::LandTimeout).unwrap();
        runner.prepare(&mut session, true).unwrap();
        runner.take_off(&mut session).unwrap();
        session
    }

    fn move_with(
        session: &FlightSession,
        target: Vector3<f64>,
        drivetrain: DrivetrainType,
        yaw_mode: YawMode,
    ) -> CommandOutcome {
        session
            .api()
            .move_to_position(target.x, target.y, target.z, 5.0, 60.0, drivetrain, yaw_mode, -1.0, 0.0)
    }

    #[test]
    fn test_builders_shape_the_run() {
        let config = SimConfig {
            seed: 9,
            hover_secs: 0.5,
            ..SimConfig::default()
        };
        let runner = FlightTestRunner::new(1)
            .with_config(config)
            .with_provider(Arc::new(Settings::default()))
            .with_step(4e-3)
            .with_waypoint(Vector3::new(2.0, 1.0, -4.0), 3.0);

        assert_eq!(runner.config().seed, 9);
        assert_eq!(runner.config().step_secs, 4e-3);
        assert_eq!(runner.config().velocity, 3.0);

        let result = runner.run(ScenarioId::SimpleFlight);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.seed, 9);
        let waypoint = &result.phases[4];
        assert!((waypoint.position - Vector3::new(2.0, 1.0, -4.0)).norm() <= 0.2);
    }

    #[test]
    fn test_short_land_timeout_fails_the_flight() {
        let result = FlightTestRunner::new(42)
            .with_land_timeout(0.5)
            .run(ScenarioId::SimpleFlight);

        assert!(!result.passed);
        let land = result.phases.last().unwrap();
        assert_eq!(land.phase, "land");
        assert!(!land.success);
        assert_eq!(land.api_state, ApiState::Hovering);
    }

    #[test]
    fn test_hover_phase_holds_position() {
        let mut session = airborne_session(5);
        let start = session.body.state().snapshot().position();

        session.hover_for(2.0).unwrap();

        let hover = session.phases.last().unwrap();
        assert_eq!(hover.phase, "hover");
        assert!(hover.success);
        assert_eq!(hover.api_state, ApiState::Hovering);
        assert!((hover.position - start).norm() < 0.1);
        assert!(session.messages.iter().any(|m| m.ends_with("hovering")));
    }

    #[test]
    fn test_hover_on_ground_fails_the_phase() {
        let runner = FlightTestRunner::new(5);
        let mut session = runner.setup(ScenarioId::SimpleFlight).unwrap();
        runner.prepare(&mut session, true).unwrap();
        session.api().enable_api_control(true);
        session.api().arm_disarm(true);
        let before = session.world.time();

        assert!(session.hover_for(1.0).is_err());
        let hover = session.phases.last().unwrap();
        assert_eq!(hover.phase, "hover");
        assert!(hover.outcome.contains("not airborne"));
        assert_eq!(session.world.time(), before);
    }

    #[test]
    fn test_zero_yaw_rate_holds_heading() {
        let session = airborne_session(21);
        let before = session.api().state().unwrap().yaw;

        let target = Vector3::new(-5.0, -5.0, -5.0);
        let outcome = move_with(&session, target, DrivetrainType::MaxDegreeOfFreedom, YawMode::rate(0.0));
        assert!(outcome.is_success(), "{}", outcome);
        session.world.clock().sleep_for(1.0).unwrap();

        assert!((session.api().state().unwrap().yaw - before).abs() < 1e-9);
    }

    #[test]
    fn test_yaw_rate_turns_during_move() {
        let session = airborne_session(21);
        let before = session.api().state().unwrap().yaw;

        let target = Vector3::new(5.0, 0.0, -3.0);
        let outcome = move_with(&session, target, DrivetrainType::MaxDegreeOfFreedom, YawMode::rate(30.0));
        let elapsed = outcome.elapsed().unwrap().as_secs_f64();
        assert!(outcome.is_success(), "{}", outcome);

        // The turn stops on arrival
        let expected = before + 30f64.to_radians() * elapsed;
        assert!(expected < std::f64::consts::PI);
        assert!((session.api().state().unwrap().yaw - expected).abs() < 1e-9);
        session.world.clock().sleep_for(1.0).unwrap();
        assert!((session.api().state().unwrap().yaw - expected).abs() < 1e-9);
    }

    #[test]
    fn test_yaw_angle_is_reached() {
        let session = airborne_session(21);

        let target = Vector3::new(5.0, 0.0, -3.0);
        let outcome = move_with(&session, target, DrivetrainType::MaxDegreeOfFreedom, YawMode::angle(90.0));
        assert!(outcome.is_success(), "{}", outcome);
        session.world.clock().sleep_for(3.0).unwrap();

        let yaw = session.api().state().unwrap().yaw;
        assert!((yaw - std::f64::consts::FRAC_PI_2).abs() < 1e-3, "yaw {yaw}");
    }

    #[test]
    fn test_forward_only_faces_along_path() {
        let session = airborne_session(21);
        let start = session.body.state().snapshot().position();
        let target = start + Vector3::new(10.0, 10.0, 0.0);

        let outcome = move_with(&session, target, DrivetrainType::ForwardOnly, YawMode::angle(0.0));
        assert!(outcome.is_success(), "{}", outcome);
        session.world.clock().sleep_for(3.0).unwrap();

        let yaw = session.api().state().unwrap().yaw;
        assert!((yaw - std::f64::consts::FRAC_PI_4).abs() < 1e-3, "yaw {yaw}");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn prop_land_returns_within_timeout_plus_one_step(timeout in 0.0f64..1.5, climb in 0.0f64..40.0) {
            let session = airborne_session(11);
            let clock = Arc::clone(session.world.clock());

            let start = session.body.state().snapshot().position();
            let target = Vector3::new(start.x, start.y, -3.0 - climb);
            let outcome = move_with(&session, target, DrivetrainType::MaxDegreeOfFreedom, YawMode::rate(0.0));
            prop_assert!(outcome.is_success(), "{}", outcome);

            let before = clock.now();
            let outcome = session.api().land(timeout);
            let spent = clock.now() - before;

            let limit = duration_from_secs(timeout).unwrap();
            prop_assert!(outcome.is_timed_out(), "{}", outcome);
            prop_assert!(spent >= limit);
            prop_assert!(spent <= limit + clock.step_size());
            prop_assert_eq!(session.api().api_state(), ApiState::Hovering);
        }
    }
}
