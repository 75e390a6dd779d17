//! Flight test scenarios.

use serde::{Deserialize, Serialize};

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioId {
    /// FT-001: enable, arm, take off, hover, fly to the waypoint, land
    SimpleFlight,

    /// FT-002: commands before ground contact is established
    UngroundedCommand,

    /// FT-003: arming without API control
    ArmBeforeEnable,

    /// FT-004: takeoff without arming
    TakeoffBeforeArm,

    /// FT-005: land with a timeout too short to reach the ground
    LandTimeout,

    /// FT-006: blocking commands before the physics loop runs
    CommandBeforeStart,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::SimpleFlight,
            ScenarioId::UngroundedCommand,
            ScenarioId::ArmBeforeEnable,
            ScenarioId::TakeoffBeforeArm,
            ScenarioId::LandTimeout,
            ScenarioId::CommandBeforeStart,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::SimpleFlight => "simple_flight",
            ScenarioId::UngroundedCommand => "ungrounded_command",
            ScenarioId::ArmBeforeEnable => "arm_before_enable",
            ScenarioId::TakeoffBeforeArm => "takeoff_before_arm",
            ScenarioId::LandTimeout => "land_timeout",
            ScenarioId::CommandBeforeStart => "command_before_start",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::SimpleFlight => "End-to-end flight: takeoff, 2 s hover, waypoint (-5,-5,-5), land",
            ScenarioId::UngroundedCommand => "Arm before set_grounded(true) is rejected, then recovers",
            ScenarioId::ArmBeforeEnable => "Arm without API control is rejected",
            ScenarioId::TakeoffBeforeArm => "Takeoff on a disarmed vehicle is rejected",
            ScenarioId::LandTimeout => "Short land timeout returns within timeout + one step, vehicle holds",
            ScenarioId::CommandBeforeStart => "Blocking command before the physics loop starts fails predictably",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simple_flight" | "simpleflight" | "ft-001" => Ok(ScenarioId::SimpleFlight),
            "ungrounded_command" | "ungrounded" | "ft-002" => Ok(ScenarioId::UngroundedCommand),
            "arm_before_enable" | "ft-003" => Ok(ScenarioId::ArmBeforeEnable),
            "takeoff_before_arm" | "ft-004" => Ok(ScenarioId::TakeoffBeforeArm),
            "land_timeout" | "ft-005" => Ok(ScenarioId::LandTimeout),
            "command_before_start" | "ft-006" => Ok(ScenarioId::CommandBeforeStart),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_back() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
        }
        assert_eq!("FT-005".parse::<ScenarioId>(), Ok(ScenarioId::LandTimeout));
        assert!("all".parse::<ScenarioId>().is_err());
    }
}
