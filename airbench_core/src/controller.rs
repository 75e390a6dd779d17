//! Cascaded position → velocity → thrust controller.
//!
//! The control API chooses a [`Setpoint`]; the physics loop asks the
//! controller for an [`Actuation`] once per tick. The laws are deliberately
//! simple proportional loops: the harness cares about sequencing and timing,
//! not about flight-control fidelity.

use crate::kinematics::{wrap_angle, KinematicsState, GRAVITY};
use crate::params::VehicleParams;
use crate::physics::Actuation;

use nalgebra::Vector3;

/// Heading target while flying.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeadingControl {
    /// Hold an absolute yaw angle (rad)
    Angle(f64),

    /// Turn at a constant rate (rad/s)
    Rate(f64),

    /// Point the nose along the current path, plus an offset (rad)
    AlongPath { offset: f64 },
}

/// Straight-line path followed with a lookahead "carrot".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathTarget {
    pub origin: Vector3<f64>,
    pub target: Vector3<f64>,

    /// Cruise speed (m/s)
    pub velocity: f64,

    /// Distance of the carrot ahead of the closest point on the path (m)
    pub lookahead: f64,

    pub heading: HeadingControl,
}

impl PathTarget {
    /// Lookahead used when the caller asks for the automatic one.
    pub fn auto_lookahead(
        velocity: f64,
        adaptive_lookahead: f64,
        command_period: f64,
        distance_accuracy: f64,
    ) -> f64 {
        let factor = if adaptive_lookahead > 0.0 { 30.0 } else { 40.0 };
        (velocity * command_period * factor).max(1.5 * distance_accuracy)
    }

    /// Unit direction of travel, or `None` for a degenerate path.
    pub fn direction(&self) -> Option<Vector3<f64>> {
        let path = self.target - self.origin;
        let length = path.norm();
        (length > 1e-9).then(|| path / length)
    }

    /// Heading to hold once the target is reached. An angle stays the goal, a
    /// path heading freezes on the path's course, and a turn stops at `yaw`.
    pub fn settled_heading(&self, yaw: f64) -> HeadingControl {
        match self.heading {
            HeadingControl::Angle(angle) => HeadingControl::Angle(angle),
            HeadingControl::AlongPath { offset } => match self.direction() {
                Some(direction) if direction.xy().norm() > 1e-6 => {
                    HeadingControl::Angle(wrap_angle(direction.y.atan2(direction.x) + offset))
                }
                _ => HeadingControl::Angle(yaw),
            },
            HeadingControl::Rate(_) => HeadingControl::Angle(yaw),
        }
    }

    /// Point the vehicle should steer towards from `position`.
    pub fn carrot(&self, position: &Vector3<f64>) -> Vector3<f64> {
        let Some(direction) = self.direction() else {
            return self.target;
        };
        let length = (self.target - self.origin).norm();
        let along = (position - self.origin).dot(&direction).clamp(0.0, length);
        let ahead = (along + self.lookahead).min(length);
        self.origin + direction * ahead
    }
}

/// What the controller is currently trying to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Setpoint {
    /// Motors idle
    Idle,

    /// Hold a position
    Hold {
        position: Vector3<f64>,
        heading: HeadingControl,
    },

    /// Follow a straight path to its target
    Track(PathTarget),

    /// Hold horizontal position and sink at `rate` (m/s)
    Descend {
        position: Vector3<f64>,
        rate: f64,
        heading: HeadingControl,
    },
}

/// Proportional cascade controller configured from vehicle parameters.
#[derive(Debug, Clone)]
pub struct FlightController {
    params: VehicleParams,
}

impl FlightController {
    pub fn new(params: &VehicleParams) -> Self {
        Self {
            params: params.clone(),
        }
    }

    /// Computes the actuation that drives `state` towards `setpoint`.
    pub fn compute(&self, setpoint: &Setpoint, state: &KinematicsState) -> Actuation {
        let position = state.pose.position;

        let (desired_velocity, heading, path) = match setpoint {
            Setpoint::Idle => return Actuation::idle(),
            Setpoint::Hold { position: target, heading } => {
                (self.toward(target, &position), *heading, None)
            }
            Setpoint::Track(path) => {
                let remaining = (path.target - position).norm();
                let carrot = path.carrot(&position);
                let to_carrot = carrot - position;
                let speed = path.velocity.min(self.params.gains.position_p * remaining);
                let velocity = match to_carrot.try_normalize(1e-9) {
                    Some(direction) => direction * speed,
                    None => Vector3::zeros(),
                };
                (self.limit(velocity, self.params.max_velocity), path.heading, path.direction())
            }
            Setpoint::Descend { position: target, rate, heading } => {
                let mut velocity = self.toward(target, &position);
                velocity.z = rate.abs();
                (velocity, *heading, None)
            }
        };

        let gains = &self.params.gains;
        let velocity = state.twist.linear;
        let acceleration = self.limit(
            (desired_velocity - velocity) * gains.velocity_p,
            self.params.max_acceleration,
        );
        let specific_thrust =
            acceleration - Vector3::new(0.0, 0.0, GRAVITY) + velocity * self.params.linear_drag;

        Actuation {
            specific_thrust,
            yaw_rate: self.yaw_rate(&heading, state.pose.yaw(), path.as_ref()),
        }
    }

    fn toward(&self, target: &Vector3<f64>, position: &Vector3<f64>) -> Vector3<f64> {
        self.limit(
            (target - position) * self.params.gains.position_p,
            self.params.max_velocity,
        )
    }

    fn limit(&self, v: Vector3<f64>, max: f64) -> Vector3<f64> {
        let norm = v.norm();
        if norm > max {
            v * (max / norm)
        } else {
            v
        }
    }

    fn yaw_rate(&self, heading: &HeadingControl, yaw: f64, path: Option<&Vector3<f64>>) -> f64 {
        let max_rate = self.params.max_yaw_rate_deg.to_radians();
        let rate = match heading {
            HeadingControl::Rate(rate) => *rate,
            HeadingControl::Angle(angle) => self.params.gains.yaw_p * wrap_angle(angle - yaw),
            HeadingControl::AlongPath { offset } => match path {
                Some(direction) if direction.xy().norm() > 1e-6 => {
                    let course = direction.y.atan2(direction.x);
                    self.params.gains.yaw_p * wrap_angle(course + offset - yaw)
                }
                _ => 0.0,
            },
        };
        rate.clamp(-max_rate, max_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn hold(position: Vector3<f64>) -> Setpoint {
        Setpoint::Hold {
            position,
            heading: HeadingControl::Angle(0.0),
        }
    }

    #[test]
    fn test_idle_setpoint_cuts_motors() {
        let controller = FlightController::new(&VehicleParams::default());
        let actuation = controller.compute(&Setpoint::Idle, &KinematicsState::zero());
        assert_eq!(actuation, Actuation::idle());
    }

    #[test]
    fn test_hold_at_rest_cancels_gravity() {
        let controller = FlightController::new(&VehicleParams::default());
        let state = KinematicsState::at_rest(Vector3::new(1.0, 2.0, -3.0));

        let actuation = controller.compute(&hold(state.pose.position), &state);

        assert_relative_eq!(actuation.specific_thrust, Vector3::new(0.0, 0.0, -GRAVITY));
        assert_eq!(actuation.yaw_rate, 0.0);
    }

    #[test]
    fn test_hold_above_pushes_up() {
        let controller = FlightController::new(&VehicleParams::default());
        let actuation = controller.compute(&hold(Vector3::new(0.0, 0.0, -3.0)), &KinematicsState::zero());

        // Climbing needs more than hover thrust, but acceleration stays limited
        assert!(actuation.specific_thrust.z < -GRAVITY);
        assert_relative_eq!(actuation.specific_thrust.z, -GRAVITY - 8.0);
    }

    #[test]
    fn test_auto_lookahead() {
        assert_relative_eq!(PathTarget::auto_lookahead(5.0, 0.0, 0.02, 0.2), 4.0);
        assert_relative_eq!(PathTarget::auto_lookahead(5.0, 1.0, 0.02, 0.2), 3.0);
        assert_relative_eq!(PathTarget::auto_lookahead(0.1, 0.0, 0.02, 0.2), 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_carrot_runs_ahead_and_stops_at_target() {
        let path = PathTarget {
            origin: Vector3::zeros(),
            target: Vector3::new(10.0, 0.0, 0.0),
            velocity: 5.0,
            lookahead: 2.0,
            heading: HeadingControl::Rate(0.0),
        };

        assert_relative_eq!(path.carrot(&Vector3::new(3.0, 1.0, 0.0)), Vector3::new(5.0, 0.0, 0.0));
        assert_relative_eq!(path.carrot(&Vector3::new(9.5, 0.0, 0.0)), path.target);
        assert_relative_eq!(path.carrot(&Vector3::new(-4.0, 0.0, 0.0)), Vector3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_settled_heading() {
        let mut path = PathTarget {
            origin: Vector3::zeros(),
            target: Vector3::new(5.0, 5.0, 0.0),
            velocity: 5.0,
            lookahead: 2.0,
            heading: HeadingControl::AlongPath { offset: 0.0 },
        };
        assert_eq!(path.settled_heading(0.1), HeadingControl::Angle(std::f64::consts::FRAC_PI_4));

        path.heading = HeadingControl::Angle(1.0);
        assert_eq!(path.settled_heading(0.1), HeadingControl::Angle(1.0));

        path.heading = HeadingControl::Rate(0.5);
        assert_eq!(path.settled_heading(0.1), HeadingControl::Angle(0.1));

        // Straight up has no course to follow
        path.heading = HeadingControl::AlongPath { offset: 0.0 };
        path.target = Vector3::new(0.0, 0.0, -5.0);
        assert_eq!(path.settled_heading(0.1), HeadingControl::Angle(0.1));
    }

    #[test]
    fn test_heading_along_path() {
        let controller = FlightController::new(&VehicleParams::default());
        let path = Vector3::new(0.0, 1.0, 0.0);
        let max_rate = 90f64.to_radians();

        // Course is +90°, current yaw 0: turn right at the yaw rate limit
        let rate = controller.yaw_rate(&HeadingControl::AlongPath { offset: 0.0 }, 0.0, Some(&path));
        assert_relative_eq!(rate, max_rate);

        let aligned = controller.yaw_rate(
            &HeadingControl::AlongPath { offset: 0.0 },
            std::f64::consts::FRAC_PI_2,
            Some(&path),
        );
        assert_relative_eq!(aligned, 0.0);
        assert_relative_eq!(controller.yaw_rate(&HeadingControl::Rate(10.0), 0.0, None), max_rate);
    }
}
