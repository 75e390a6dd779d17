//! JSON exporter for flight traces.
//!
//! Exports a scenario's phase-by-phase telemetry and its status messages so
//! that runs can be plotted or diffed offline.

use crate::runner::ScenarioResult;

use airbench_core::ApiState;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Telemetry at the end of one phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightFrame {
    /// Simulation time in seconds
    pub time_sec: f64,

    pub tick: u64,

    /// Phase that ended at this frame
    pub phase: String,

    pub outcome: String,

    pub position: VehiclePosition,

    pub altitude: f64,

    pub api_state: ApiState,
}

/// NED position of the vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehiclePosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl VehiclePosition {
    pub fn new(pos: Vector3<f64>) -> Self {
        Self {
            x: pos.x,
            y: pos.y,
            z: pos.z,
        }
    }
}

/// Status message raised by the control API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimEvent {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

impl SimEvent {
    /// Rejections and timeouts are warnings; everything else is informational.
    pub fn from_status(message: &str) -> Self {
        let warning = message.contains(" rejected: ") || message.contains("did not finish");
        Self {
            message: message.to_string(),
            level: Some(if warning { "warn" } else { "info" }.to_string()),
        }
    }
}

/// Complete flight export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Duration in seconds
    pub duration_sec: f64,

    /// All frames
    pub frames: Vec<FlightFrame>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SimEvent>,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl FlightExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            duration_sec: 0.0,
            frames: Vec::new(),
            events: Vec::new(),
            passed: false,
            failure_reason: None,
        }
    }

    /// Builds the export of a finished scenario.
    pub fn from_result(result: &ScenarioResult) -> Self {
        let mut export = Self::new(result.scenario.name(), result.seed);
        for phase in &result.phases {
            export.add_frame(FlightFrame {
                time_sec: phase.time_secs,
                tick: phase.tick,
                phase: phase.phase.clone(),
                outcome: phase.outcome.clone(),
                position: VehiclePosition::new(phase.position),
                altitude: phase.altitude,
                api_state: phase.api_state,
            });
        }
        export.events = result
            .status_messages
            .iter()
            .map(|m| SimEvent::from_status(m))
            .collect();
        export.duration_sec = export.duration_sec.max(result.final_time_secs);
        export.finalize(result.passed, result.failure_reason.clone());
        export
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: FlightFrame) {
        self.duration_sec = frame.time_sec;
        self.frames.push(frame);
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, failure_reason: Option<String>) {
        self.passed = passed;
        self.failure_reason = failure_reason;
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::FlightTestRunner;
    use crate::scenarios::ScenarioId;

    #[test]
    fn test_event_levels() {
        assert_eq!(
            SimEvent::from_status("[    0.040s] arm rejected: API control is not enabled").level.as_deref(),
            Some("warn")
        );
        assert_eq!(SimEvent::from_status("[    5.000s] touchdown").level.as_deref(), Some("info"));
    }

    #[test]
    fn test_export_written() {
        let result = FlightTestRunner::new(42).run(ScenarioId::ArmBeforeEnable);
        let export = FlightExport::from_result(&result);

        assert_eq!(export.scenario, "arm_before_enable");
        assert_eq!(export.frames.len(), result.phases.len());
        assert!(export.events.iter().any(|e| e.level.as_deref() == Some("warn")));
        assert!(export.passed);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.json");
        export.write_to_file(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["seed"], 42);
        assert_eq!(json["frames"][0]["phase"], "arm");
        assert_eq!(json["frames"][0]["api_state"], "ControlDisabled");
    }
}
