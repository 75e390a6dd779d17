//! Vehicle parameters and the settings provider that resolves them.
//!
//! Settings are plain JSON:
//!
//! ```text
//! {
//!   "clock_step_secs": 0.003,
//!   "seed": 42,
//!   "vehicles": {
//!     "SimpleFlight": { "takeoff_altitude": 3.0, "wind": { "gust_std": 0.05 } }
//!   }
//! }
//! ```
//!
//! Missing fields fall back to the `SimpleFlight` defaults.

use crate::control_api::ControlApi;
use crate::error::SettingsError;
use crate::kinematics::GeoPoint;

use airbench_env::SimClock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Name of the built-in quadrotor profile.
pub const SIMPLE_FLIGHT: &str = "SimpleFlight";

/// Gains of the cascaded position/velocity controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerGains {
    /// Position error → desired velocity (1/s)
    pub position_p: f64,

    /// Velocity error → desired acceleration (1/s)
    pub velocity_p: f64,

    /// Heading error → yaw rate (1/s)
    pub yaw_p: f64,
}

impl Default for ControllerGains {
    fn default() -> Self {
        Self {
            position_p: 1.5,
            velocity_p: 4.0,
            yaw_p: 2.0,
        }
    }
}

/// Seeded wind disturbance, as acceleration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindParams {
    /// Steady component (NED, m/s²)
    pub mean: [f64; 3],

    /// Standard deviation of the per-step gust, each axis (m/s²)
    pub gust_std: f64,
}

impl Default for WindParams {
    fn default() -> Self {
        Self {
            mean: [0.0; 3],
            gust_std: 0.05,
        }
    }
}

/// Parameters of one vehicle profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleParams {
    /// Profile name (filled in by the settings provider)
    pub name: String,

    /// Mass in kg (reported only; dynamics work in specific force)
    pub mass_kg: f64,

    /// Maximum total thrust as a multiple of weight
    pub max_thrust_to_weight: f64,

    /// Linear drag coefficient (1/s)
    pub linear_drag: f64,

    /// Velocity limit of the controller (m/s)
    pub max_velocity: f64,

    /// Acceleration limit of the controller (m/s²)
    pub max_acceleration: f64,

    /// Yaw rate limit (deg/s)
    pub max_yaw_rate_deg: f64,

    /// Climb height of `takeoff` above the start point (m)
    pub takeoff_altitude: f64,

    /// Altitude band in which takeoff counts as complete (m)
    pub takeoff_tolerance: f64,

    /// Speed below which the vehicle counts as settled (m/s)
    pub settle_velocity: f64,

    /// Distance at which a waypoint counts as reached (m)
    pub distance_accuracy: f64,

    /// Descent rate of `land` (m/s)
    pub landing_velocity: f64,

    /// Controller command period used for automatic lookahead (s)
    pub command_period: f64,

    pub gains: ControllerGains,
    pub wind: WindParams,

    /// Geodetic location of the NED origin
    pub home: GeoPoint,
}

impl Default for VehicleParams {
    fn default() -> Self {
        Self::simple_flight()
    }
}

impl VehicleParams {
    /// The stock quadrotor profile.
    pub fn simple_flight() -> Self {
        Self {
            name: SIMPLE_FLIGHT.to_string(),
            mass_kg: 1.0,
            max_thrust_to_weight: 2.0,
            linear_drag: 0.1,
            max_velocity: 10.0,
            max_acceleration: 8.0,
            max_yaw_rate_deg: 90.0,
            takeoff_altitude: 3.0,
            takeoff_tolerance: 0.1,
            settle_velocity: 0.25,
            distance_accuracy: 0.2,
            landing_velocity: 1.0,
            command_period: 0.02,
            gains: ControllerGains::default(),
            wind: WindParams::default(),
            home: GeoPoint::default(),
        }
    }

    /// Checks that every parameter is usable by the controller and integrator.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let positive = [
            ("mass_kg", self.mass_kg),
            ("max_thrust_to_weight", self.max_thrust_to_weight),
            ("max_velocity", self.max_velocity),
            ("max_acceleration", self.max_acceleration),
            ("max_yaw_rate_deg", self.max_yaw_rate_deg),
            ("takeoff_altitude", self.takeoff_altitude),
            ("takeoff_tolerance", self.takeoff_tolerance),
            ("settle_velocity", self.settle_velocity),
            ("distance_accuracy", self.distance_accuracy),
            ("landing_velocity", self.landing_velocity),
            ("command_period", self.command_period),
            ("gains.position_p", self.gains.position_p),
            ("gains.velocity_p", self.gains.velocity_p),
            ("gains.yaw_p", self.gains.yaw_p),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(SettingsError::InvalidParameter(format!(
                    "{field} must be positive, got {value}"
                )));
            }
        }

        if self.max_thrust_to_weight <= 1.0 {
            return Err(SettingsError::InvalidParameter(
                "max_thrust_to_weight must exceed 1.0 to leave the ground".to_string(),
            ));
        }
        if !(self.linear_drag.is_finite() && self.linear_drag >= 0.0) {
            return Err(SettingsError::InvalidParameter(format!(
                "linear_drag must be non-negative, got {}",
                self.linear_drag
            )));
        }
        if !(self.wind.gust_std.is_finite() && self.wind.gust_std >= 0.0)
            || self.wind.mean.iter().any(|v| !v.is_finite())
        {
            return Err(SettingsError::InvalidParameter(
                "wind parameters must be finite and gust_std non-negative".to_string(),
            ));
        }

        Ok(())
    }

    /// Creates the control API for this vehicle, bound to `clock`.
    pub fn create_control_api<C: SimClock>(
        &self,
        clock: Arc<C>,
    ) -> Result<Arc<ControlApi<C>>, SettingsError> {
        self.validate()?;
        Ok(Arc::new(ControlApi::new(self.clone(), clock)))
    }
}

/// Resolves named vehicle profiles.
pub trait SettingsProvider {
    /// Returns the parameters of the named vehicle profile.
    fn create_config(&self, name: &str) -> Result<VehicleParams, SettingsError>;

    /// Lists the available profile names.
    fn profile_names(&self) -> Vec<String>;
}

/// JSON-backed settings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Virtual clock step size (s)
    pub clock_step_secs: f64,

    /// Master seed for disturbances
    pub seed: u64,

    /// Vehicle profiles by name
    pub vehicles: BTreeMap<String, VehicleParams>,
}

impl Default for Settings {
    fn default() -> Self {
        let mut vehicles = BTreeMap::new();
        vehicles.insert(SIMPLE_FLIGHT.to_string(), VehicleParams::simple_flight());

        Self {
            clock_step_secs: 3e-3,
            seed: 42,
            vehicles,
        }
    }
}

impl Settings {
    /// Parses settings from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads settings from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Serializes the settings as pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl SettingsProvider for Settings {
    fn create_config(&self, name: &str) -> Result<VehicleParams, SettingsError> {
        let mut params = self
            .vehicles
            .get(name)
            .cloned()
            .ok_or_else(|| SettingsError::UnknownProfile(name.to_string()))?;
        params.name = name.to_string();
        params.validate()?;
        Ok(params)
    }

    fn profile_names(&self) -> Vec<String> {
        self.vehicles.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings_resolve_simple_flight() {
        let settings = Settings::default();
        let params = settings.create_config(SIMPLE_FLIGHT).unwrap();

        assert_eq!(params.name, SIMPLE_FLIGHT);
        assert_eq!(params.takeoff_altitude, 3.0);
        assert_eq!(settings.profile_names(), vec![SIMPLE_FLIGHT.to_string()]);
    }

    #[test]
    fn test_unknown_profile() {
        let settings = Settings::default();
        assert!(matches!(
            settings.create_config("PX4"),
            Err(SettingsError::UnknownProfile(name)) if name == "PX4"
        ));
    }

    #[test]
    fn test_partial_profile_uses_defaults() {
        let json = r#"{
            "clock_step_secs": 0.005,
            "vehicles": { "Heavy": { "max_velocity": 4.0, "wind": { "gust_std": 0.0 } } }
        }"#;
        let settings = Settings::from_json_str(json).unwrap();
        let params = settings.create_config("Heavy").unwrap();

        assert_eq!(settings.clock_step_secs, 0.005);
        assert_eq!(settings.seed, 42);
        assert_eq!(params.name, "Heavy");
        assert_eq!(params.max_velocity, 4.0);
        assert_eq!(params.wind.gust_std, 0.0);
        assert_eq!(params.takeoff_altitude, 3.0);
    }

    #[test]
    fn test_invalid_profile_rejected() {
        let json = r#"{ "vehicles": { "Broken": { "max_thrust_to_weight": 0.8 } } }"#;
        let settings = Settings::from_json_str(json).unwrap();
        assert!(matches!(
            settings.create_config("Broken"),
            Err(SettingsError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_settings_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let json = Settings::default().to_json_pretty().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let loaded = Settings::from_file(file.path()).unwrap();
        assert_eq!(loaded.seed, 42);
        assert_eq!(loaded.profile_names(), vec![SIMPLE_FLIGHT.to_string()]);
        let params = loaded.create_config(SIMPLE_FLIGHT).unwrap();
        assert_eq!(params.takeoff_altitude, 3.0);
        assert_eq!(params.gains, ControllerGains::default());
    }

    #[test]
    fn test_settings_parse_error() {
        assert!(matches!(
            Settings::from_json_str("{ not json"),
            Err(SettingsError::Parse(_))
        ));
    }
}
