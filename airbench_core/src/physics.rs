//! Physics integration behind a narrow trait, plus the seeded wind model.

use crate::kinematics::{wrap_angle, KinematicsState, Twist, GRAVITY};
use crate::params::{VehicleParams, WindParams};

use nalgebra::{UnitQuaternion, Vector3};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

/// Controller output for one physics step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Actuation {
    /// Rotor thrust per unit mass, world frame (NED, m/s²)
    pub specific_thrust: Vector3<f64>,

    /// Commanded yaw rate (rad/s)
    pub yaw_rate: f64,
}

impl Actuation {
    /// Motors idle: no thrust, no yaw.
    pub fn idle() -> Self {
        Self {
            specific_thrust: Vector3::zeros(),
            yaw_rate: 0.0,
        }
    }
}

impl Default for Actuation {
    fn default() -> Self {
        Self::idle()
    }
}

/// Result of integrating one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Integration {
    pub kinematics: KinematicsState,
    pub grounded: bool,
}

/// A rigid-body integrator.
pub trait PhysicsEngine: Send + Sync {
    /// Advances `current` by `dt` seconds under the given input.
    fn integrate(
        &self,
        current: &KinematicsState,
        grounded: bool,
        actuation: &Actuation,
        disturbance: &Vector3<f64>,
        params: &VehicleParams,
        dt: f64,
    ) -> Integration;
}

/// Semi-implicit Euler point-mass integrator with a flat ground plane at z = 0.
///
/// Thrust is limited to `max_thrust_to_weight * g` and can only push up.
/// Ground contact is inelastic: a body that reaches the plane stops there,
/// and a resting body stays put until net force lifts it.
#[derive(Debug, Clone, Copy, Default)]
pub struct KinematicIntegrator;

impl KinematicIntegrator {
    fn limit_thrust(thrust: &Vector3<f64>, params: &VehicleParams) -> Vector3<f64> {
        let max = params.max_thrust_to_weight * GRAVITY;
        let upward = Vector3::new(thrust.x, thrust.y, thrust.z.min(0.0));
        let norm = upward.norm();
        if norm > max {
            upward * (max / norm)
        } else {
            upward
        }
    }

    /// Attitude for display: the level heading, then tilted onto the thrust axis.
    fn orientation(thrust: &Vector3<f64>, yaw: f64) -> UnitQuaternion<f64> {
        let heading = UnitQuaternion::from_euler_angles(0.0, 0.0, yaw);
        let up = Vector3::new(0.0, 0.0, -1.0);
        match UnitQuaternion::rotation_between(&up, thrust) {
            Some(tilt) if thrust.norm() > 1e-6 => tilt * heading,
            _ => heading,
        }
    }
}

impl PhysicsEngine for KinematicIntegrator {
    fn integrate(
        &self,
        current: &KinematicsState,
        grounded: bool,
        actuation: &Actuation,
        disturbance: &Vector3<f64>,
        params: &VehicleParams,
        dt: f64,
    ) -> Integration {
        let thrust = Self::limit_thrust(&actuation.specific_thrust, params);
        let velocity = current.twist.linear;
        let acceleration = thrust + Vector3::new(0.0, 0.0, GRAVITY) - velocity * params.linear_drag
            + disturbance;

        // Resting contact: the normal force absorbs everything that does not lift.
        if grounded && acceleration.z >= 0.0 {
            let mut resting = *current;
            resting.twist = Twist::zero();
            resting.linear_acceleration = Vector3::zeros();
            resting.pose.position.z = resting.pose.position.z.min(0.0);
            return Integration {
                kinematics: resting,
                grounded: true,
            };
        }

        let mut next_velocity = velocity + acceleration * dt;
        let mut next_position = current.pose.position + next_velocity * dt;
        let mut applied = acceleration;
        let mut touched_down = false;

        if next_position.z >= 0.0 && next_velocity.z >= 0.0 {
            next_position.z = 0.0;
            next_velocity = Vector3::zeros();
            applied = Vector3::zeros();
            touched_down = true;
        }

        let yaw_rate = if touched_down { 0.0 } else { actuation.yaw_rate };
        // Heading is its own state; the tilted quaternion's Euler yaw is not.
        let yaw = wrap_angle(current.pose.heading + yaw_rate * dt);

        let mut next = *current;
        next.pose.position = next_position;
        next.pose.heading = yaw;
        next.pose.orientation = Self::orientation(&thrust, yaw);
        next.twist.linear = next_velocity;
        next.twist.angular = Vector3::new(0.0, 0.0, yaw_rate);
        next.linear_acceleration = applied;

        Integration {
            kinematics: next,
            grounded: touched_down,
        }
    }
}

/// Deterministic wind gusts.
///
/// Each body owns its own stream, seeded from the run seed and its
/// registration index, so adding a vehicle never perturbs another's trajectory.
#[derive(Debug, Clone)]
pub struct WindModel {
    rng: ChaCha8Rng,
    mean: Vector3<f64>,
    gust: Option<Normal<f64>>,
}

impl WindModel {
    pub fn new(seed: u64, params: &WindParams) -> Self {
        let gust = if params.gust_std > 0.0 {
            Normal::new(0.0, params.gust_std).ok()
        } else {
            None
        };

        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            mean: Vector3::from(params.mean),
            gust,
        }
    }

    /// Still air.
    pub fn calm() -> Self {
        Self::new(0, &WindParams { mean: [0.0; 3], gust_std: 0.0 })
    }

    /// Draws the disturbance for the next step.
    pub fn sample(&mut self) -> Vector3<f64> {
        match &self.gust {
            Some(normal) => {
                self.mean
                    + Vector3::new(
                        normal.sample(&mut self.rng),
                        normal.sample(&mut self.rng),
                        normal.sample(&mut self.rng),
                    )
            }
            None => self.mean,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const DT: f64 = 0.003;

    fn hover_thrust() -> Actuation {
        Actuation {
            specific_thrust: Vector3::new(0.0, 0.0, -GRAVITY),
            yaw_rate: 0.0,
        }
    }

    #[test]
    fn test_resting_body_stays_on_ground() {
        let params = VehicleParams::default();
        let state = KinematicsState::zero();

        let result = KinematicIntegrator.integrate(&state, true, &Actuation::idle(), &Vector3::zeros(), &params, DT);

        assert!(result.grounded);
        assert_eq!(result.kinematics.pose.position, Vector3::zeros());
        assert_eq!(result.kinematics.twist.linear, Vector3::zeros());
    }

    #[test]
    fn test_free_body_falls_onto_ground_plane() {
        let params = VehicleParams::default();
        let mut state = KinematicsState::at_rest(Vector3::new(0.0, 0.0, -0.001));
        let mut grounded = false;

        for _ in 0..100 {
            let result = KinematicIntegrator.integrate(&state, grounded, &Actuation::idle(), &Vector3::zeros(), &params, DT);
            state = result.kinematics;
            grounded = result.grounded;
        }

        assert!(grounded);
        assert_eq!(state.pose.position.z, 0.0);
        assert_eq!(state.speed(), 0.0);
    }

    #[test]
    fn test_excess_thrust_lifts_off() {
        let params = VehicleParams::default();
        let climb = Actuation {
            specific_thrust: Vector3::new(0.0, 0.0, -1.5 * GRAVITY),
            yaw_rate: 0.0,
        };

        let result = KinematicIntegrator.integrate(&KinematicsState::zero(), true, &climb, &Vector3::zeros(), &params, DT);

        assert!(!result.grounded);
        assert!(result.kinematics.pose.position.z < 0.0);
    }

    #[test]
    fn test_hover_thrust_balances_gravity() {
        let params = VehicleParams::default();
        let state = KinematicsState::at_rest(Vector3::new(0.0, 0.0, -3.0));

        let result = KinematicIntegrator.integrate(&state, false, &hover_thrust(), &Vector3::zeros(), &params, DT);

        assert_relative_eq!(result.kinematics.pose.position.z, -3.0, epsilon = 1e-12);
        assert!(!result.grounded);
    }

    #[test]
    fn test_thrust_is_limited_and_never_pushes_down() {
        let params = VehicleParams::default();
        let limited = KinematicIntegrator::limit_thrust(&Vector3::new(0.0, 0.0, -100.0), &params);
        assert_relative_eq!(limited.norm(), params.max_thrust_to_weight * GRAVITY);

        let downward = KinematicIntegrator::limit_thrust(&Vector3::new(1.0, 0.0, 5.0), &params);
        assert_eq!(downward.z, 0.0);
    }

    #[test]
    fn test_heading_holds_under_tilt() {
        let params = VehicleParams::default();
        let mut state = KinematicsState::at_rest(Vector3::new(0.0, 0.0, -10.0));
        state.pose.heading = 0.3;
        let tilted = Actuation {
            specific_thrust: Vector3::new(3.0, 4.0, -GRAVITY),
            yaw_rate: 0.0,
        };

        for _ in 0..500 {
            state = KinematicIntegrator
                .integrate(&state, false, &tilted, &Vector3::zeros(), &params, DT)
                .kinematics;
        }

        assert_eq!(state.pose.yaw(), 0.3);
        // The attitude is tilted away from level while the heading is not.
        let (roll, pitch, _) = state.pose.orientation.euler_angles();
        assert!(roll.abs() > 0.1 || pitch.abs() > 0.1);
    }

    #[test]
    fn test_yaw_rate_integrates_and_wraps() {
        let params = VehicleParams::default();
        let mut state = KinematicsState::at_rest(Vector3::new(0.0, 0.0, -10.0));
        let turning = Actuation {
            specific_thrust: Vector3::new(2.0, -1.0, -GRAVITY),
            yaw_rate: 1.0,
        };

        for _ in 0..1000 {
            state = KinematicIntegrator
                .integrate(&state, false, &turning, &Vector3::zeros(), &params, DT)
                .kinematics;
        }

        // 3 rad of turn stays 3 rad; 1000 more steps wrap past π.
        assert_relative_eq!(state.pose.yaw(), 3.0, epsilon = 1e-9);
        for _ in 0..1000 {
            state = KinematicIntegrator
                .integrate(&state, false, &turning, &Vector3::zeros(), &params, DT)
                .kinematics;
        }
        assert_relative_eq!(state.pose.yaw(), 6.0 - std::f64::consts::TAU, epsilon = 1e-9);
    }

    #[test]
    fn test_wind_model_is_seeded() {
        let params = WindParams { mean: [0.0; 3], gust_std: 0.5 };
        let mut a = WindModel::new(7, &params);
        let mut b = WindModel::new(7, &params);
        let mut c = WindModel::new(8, &params);

        let first_a = a.sample();
        assert_eq!(first_a, b.sample());
        assert_ne!(first_a, c.sample());
        assert_eq!(WindModel::calm().sample(), Vector3::zeros());
    }
}
