//! Shared vehicle state: a publish/snapshot cell.
//!
//! The physics loop is the only writer. It builds a complete
//! [`StateSnapshot`] and swaps it in; readers clone the `Arc` of whichever
//! snapshot is current and never observe a half-written step.

use crate::kinematics::{EnvironmentState, KinematicsState};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Immutable state of one vehicle at one instant of virtual time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Pose, twist, acceleration
    pub kinematics: KinematicsState,

    /// Environment around the vehicle (position, geo-reference, wind)
    pub environment: EnvironmentState,

    /// Vehicle is in resting contact with the ground plane
    pub grounded: bool,

    /// Ground contact was explicitly established after physics registration
    pub ground_established: bool,

    /// Virtual time at which this snapshot was produced
    pub timestamp: Duration,

    /// Physics tick that produced this snapshot (0 = initial state)
    pub tick: u64,
}

impl StateSnapshot {
    /// Initial snapshot before any physics step.
    pub fn initial(kinematics: KinematicsState, environment: EnvironmentState) -> Self {
        Self {
            kinematics,
            environment,
            grounded: false,
            ground_established: false,
            timestamp: Duration::ZERO,
            tick: 0,
        }
    }

    pub fn position(&self) -> Vector3<f64> {
        self.kinematics.pose.position
    }

    pub fn altitude(&self) -> f64 {
        self.kinematics.pose.altitude()
    }

    pub fn speed(&self) -> f64 {
        self.kinematics.speed()
    }
}

/// Kinematic + environmental state shared by a body and its control API.
#[derive(Debug)]
pub struct VehicleState {
    current: RwLock<Arc<StateSnapshot>>,
}

impl VehicleState {
    /// Creates the state cell from initial kinematics and environment.
    pub fn new(kinematics: KinematicsState, environment: EnvironmentState) -> Self {
        Self {
            current: RwLock::new(Arc::new(StateSnapshot::initial(kinematics, environment))),
        }
    }

    /// Creates an Arc-wrapped state cell.
    pub fn shared(kinematics: KinematicsState, environment: EnvironmentState) -> Arc<Self> {
        Arc::new(Self::new(kinematics, environment))
    }

    /// Returns the latest published snapshot.
    pub fn snapshot(&self) -> Arc<StateSnapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replaces the current snapshot, returning the published value.
    pub(crate) fn publish(&self, snapshot: StateSnapshot) -> Arc<StateSnapshot> {
        let published = Arc::new(snapshot);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&published);
        published
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_survives_publish() {
        let state = VehicleState::new(KinematicsState::zero(), EnvironmentState::default());
        let before = state.snapshot();

        let mut next = (*before).clone();
        next.kinematics.pose.position.z = -2.0;
        next.tick = 1;
        state.publish(next);

        // Readers holding the old snapshot keep a consistent view
        assert_eq!(before.tick, 0);
        assert_eq!(before.altitude(), 0.0);
        assert_eq!(state.snapshot().tick, 1);
        assert_eq!(state.snapshot().altitude(), 2.0);
    }

    #[test]
    fn test_initial_snapshot_is_not_grounded() {
        let state = VehicleState::new(KinematicsState::zero(), EnvironmentState::default());
        let snapshot = state.snapshot();
        assert!(!snapshot.grounded);
        assert!(!snapshot.ground_established);
    }
}
