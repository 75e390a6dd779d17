//! Kinematic and environmental state of a simulated vehicle.
//!
//! All vectors use the NED frame: x north, y east, z down. The ground plane
//! sits at z = 0, so altitude is `-z`.

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Standard gravity (m/s²)
pub const GRAVITY: f64 = 9.80665;

/// WGS-84 equatorial radius (m), used for small-offset geo conversion
const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Position and orientation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position [x, y, z] in metres (NED)
    pub position: Vector3<f64>,

    /// Body orientation relative to NED
    pub orientation: UnitQuaternion<f64>,

    /// Heading in radians, integrated on its own so tilt never bleeds into it
    #[serde(default)]
    pub heading: f64,
}

impl Pose {
    /// Pose at the origin with identity orientation.
    pub fn zero() -> Self {
        Self {
            position: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
            heading: 0.0,
        }
    }

    /// Creates a pose from a position and orientation. The heading is read
    /// from the orientation, so pass a level one.
    pub fn new(position: Vector3<f64>, orientation: UnitQuaternion<f64>) -> Self {
        Self {
            position,
            orientation,
            heading: orientation.euler_angles().2,
        }
    }

    /// Heading in radians, in (-π, π].
    pub fn yaw(&self) -> f64 {
        self.heading
    }

    /// Height above the ground plane in metres.
    pub fn altitude(&self) -> f64 {
        -self.position.z
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::zero()
    }
}

/// Linear and angular velocity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Twist {
    /// Linear velocity [vx, vy, vz] in m/s (NED)
    pub linear: Vector3<f64>,

    /// Angular velocity [p, q, r] in rad/s
    pub angular: Vector3<f64>,
}

impl Twist {
    pub fn zero() -> Self {
        Self {
            linear: Vector3::zeros(),
            angular: Vector3::zeros(),
        }
    }
}

impl Default for Twist {
    fn default() -> Self {
        Self::zero()
    }
}

/// Full kinematic state of a rigid body.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct KinematicsState {
    pub pose: Pose,
    pub twist: Twist,

    /// Linear acceleration applied during the last step (m/s²)
    pub linear_acceleration: Vector3<f64>,
}

impl KinematicsState {
    /// Everything zero: at the origin, at rest.
    pub fn zero() -> Self {
        Self::default()
    }

    /// At rest at the given position, keeping orientation identity.
    pub fn at_rest(position: Vector3<f64>) -> Self {
        Self {
            pose: Pose::new(position, UnitQuaternion::identity()),
            ..Self::zero()
        }
    }

    /// Speed magnitude in m/s.
    pub fn speed(&self) -> f64 {
        self.twist.linear.norm()
    }
}

/// Geodetic coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees
    pub latitude: f64,

    /// Longitude in degrees
    pub longitude: f64,

    /// Altitude in metres above the reference ellipsoid
    pub altitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
        }
    }

    /// Returns the point reached by moving `ned` metres from this one.
    ///
    /// Flat-earth approximation, accurate for the few hundred metres a test
    /// flight covers.
    pub fn offset_ned(&self, ned: &Vector3<f64>) -> GeoPoint {
        let lat_rad = self.latitude.to_radians();
        let d_lat = ned.x / EARTH_RADIUS_M;
        let d_lon = ned.y / (EARTH_RADIUS_M * lat_rad.cos());

        GeoPoint {
            latitude: self.latitude + d_lat.to_degrees(),
            longitude: self.longitude + d_lon.to_degrees(),
            altitude: self.altitude - ned.z,
        }
    }
}

impl Default for GeoPoint {
    fn default() -> Self {
        // Home location used by the stock SimpleFlight settings
        Self::new(47.641468, -122.140165, 122.0)
    }
}

/// State of the environment around the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentState {
    /// Absolute position of the vehicle (NED, metres from home)
    pub position: Vector3<f64>,

    /// Geo-reference anchor: the geodetic location of the NED origin
    pub home: GeoPoint,

    /// Geodetic location of the vehicle
    pub geo_point: GeoPoint,

    /// Gravity vector (NED, m/s²)
    pub gravity: Vector3<f64>,

    /// Wind disturbance acting on the vehicle during the last step (m/s²)
    pub wind_acceleration: Vector3<f64>,
}

impl EnvironmentState {
    /// Creates an environment anchored at `home`, with the vehicle at `position`.
    pub fn new(position: Vector3<f64>, home: GeoPoint) -> Self {
        Self {
            position,
            home,
            geo_point: home.offset_ned(&position),
            gravity: Vector3::new(0.0, 0.0, GRAVITY),
            wind_acceleration: Vector3::zeros(),
        }
    }

    /// Moves the environment along with the vehicle.
    pub fn update(&mut self, position: Vector3<f64>, wind_acceleration: Vector3<f64>) {
        self.position = position;
        self.geo_point = self.home.offset_ned(&position);
        self.wind_acceleration = wind_acceleration;
    }
}

impl Default for EnvironmentState {
    fn default() -> Self {
        Self::new(Vector3::zeros(), GeoPoint::default())
    }
}

/// Wraps an angle to (-π, π].
pub fn wrap_angle(angle: f64) -> f64 {
    if angle > -std::f64::consts::PI && angle <= std::f64::consts::PI {
        return angle;
    }
    let wrapped = (angle + std::f64::consts::PI).rem_euclid(std::f64::consts::TAU) - std::f64::consts::PI;
    if wrapped <= -std::f64::consts::PI {
        wrapped + std::f64::consts::TAU
    } else {
        wrapped
    }
}
