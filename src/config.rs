use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::ParkingError;
use crate::facility::{ParkingFacility, DEFAULT_MAX_CLAIM_ATTEMPTS};
use crate::gate::GateDirection;
use crate::spot::SpotCategory;
use crate::ticket::PricingPolicy;

/// Start-up description of a facility, usually loaded from JSON.
///
/// ```json
/// {
///   "id": "PL-001",
///   "name": "Downtown Garage",
///   "address": "123 Main St",
///   "floors": 3,
///   "pricing": { "hourly_base_rate": "5.00", "ev_hourly_rate": "2.00" },
///   "spots": [{ "floor": 0, "spot_id": "F0-C1", "category": "Compact" }],
///   "gates": [{ "gate_id": "G1", "direction": "Both" }]
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FacilityConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
    pub floors: u32,
    #[serde(default)]
    pub pricing: PricingPolicy,
    #[serde(default = "default_max_claim_attempts")]
    pub max_claim_attempts: u32,
    #[serde(default = "default_overdue_after_hours")]
    pub overdue_after_hours: u32,
    #[serde(default)]
    pub spots: Vec<SpotConfig>,
    #[serde(default)]
    pub gates: Vec<GateConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpotConfig {
    pub floor: u32,
    pub spot_id: String,
    pub category: SpotCategory,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateConfig {
    pub gate_id: String,
    pub direction: GateDirection,
}

fn default_max_claim_attempts() -> u32 {
    DEFAULT_MAX_CLAIM_ATTEMPTS
}

fn default_overdue_after_hours() -> u32 {
    24
}

impl FacilityConfig {
    pub fn new(id: impl Into<String>, name: impl Into<String>, floors: u32) -> Self {
        FacilityConfig {
            id: id.into(),
            name: name.into(),
            address: String::new(),
            floors,
            pricing: PricingPolicy::default(),
            max_claim_attempts: default_max_claim_attempts(),
            overdue_after_hours: default_overdue_after_hours(),
            spots: Vec::new(),
            gates: Vec::new(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ParkingError> {
        let config: FacilityConfig = serde_json::from_str(json)
            .map_err(|e| ParkingError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_slice(json: &[u8]) -> Result<Self, ParkingError> {
        let config: FacilityConfig = serde_json::from_slice(json)
            .map_err(|e| ParkingError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ParkingError> {
        if self.id.trim().is_empty() {
            return Err(ParkingError::InvalidConfig("facility id is empty".into()));
        }
        if self.floors == 0 {
            return Err(ParkingError::InvalidConfig(
                "a facility needs at least one floor".into(),
            ));
        }
        if self.max_claim_attempts == 0 {
            return Err(ParkingError::InvalidConfig(
                "max_claim_attempts must be at least 1".into(),
            ));
        }
        self.pricing.validate().map_err(ParkingError::InvalidConfig)
    }

    pub fn overdue_after(&self) -> Duration {
        Duration::hours(i64::from(self.overdue_after_hours))
    }
}

impl ParkingFacility {
    /// Builds and provisions a facility. Any provisioning failure is a
    /// configuration error.
    pub fn from_config(config: &FacilityConfig) -> Result<Self, ParkingError> {
        config.validate()?;
        let facility = ParkingFacility::new(
            config.id.clone(),
            config.name.clone(),
            config.address.clone(),
            config.floors,
        )
        .with_pricing(config.pricing.clone())
        .with_overdue_after(config.overdue_after())
        .with_max_claim_attempts(config.max_claim_attempts);

        for gate in &config.gates {
            facility.add_gate(&gate.gate_id, gate.direction)?;
        }
        for spot in &config.spots {
            facility.add_spot(spot.floor, &spot.spot_id, spot.category)?;
        }
        tracing::info!(
            facility = %config.id,
            floors = config.floors,
            spots = config.spots.len(),
            gates = config.gates.len(),
            "facility provisioned"
        );
        Ok(facility)
    }
}
