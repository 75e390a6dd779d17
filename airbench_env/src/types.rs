//! Common types for the airbench environment abstraction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a simulated vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VehicleId(pub Uuid);

impl VehicleId {
    /// Creates a deterministic VehicleId from a seed (registration index).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for VehicleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // First 8 chars are enough to tell vehicles apart in logs
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vehicle_id_from_seed_is_stable() {
        assert_eq!(VehicleId::from_seed(3), VehicleId::from_seed(3));
        assert_ne!(VehicleId::from_seed(3), VehicleId::from_seed(4));
        assert_eq!(VehicleId::from_seed(7).to_string().len(), 8);
    }

    #[test]
    fn test_vehicle_id_short_form_is_uuid_prefix() {
        let id = VehicleId::from_seed(1);
        assert_eq!(id.as_uuid(), id.0);
        assert!(id.as_uuid().to_string().starts_with(&id.to_string()));
    }
}
