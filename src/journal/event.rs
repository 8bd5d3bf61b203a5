use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::spot::SpotCategory;
use crate::vehicle::VehicleCategory;

/// Facts the facility records for downstream consumers (billing export,
/// occupancy boards, audit).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FacilityEvent {
    VehicleParked {
        ticket_id: String,
        plate: String,
        vehicle_category: VehicleCategory,
        floor: u32,
        spot_id: String,
        spot_category: SpotCategory,
        gate_id: String,
        at: DateTime<Utc>,
    },
    VehicleExited {
        ticket_id: String,
        plate: String,
        spot_id: String,
        gate_id: String,
        amount_due: Decimal,
        at: DateTime<Utc>,
    },
    PaymentAccepted {
        ticket_id: String,
        amount_paid: Decimal,
        at: DateTime<Utc>,
    },
    PaymentRejected {
        ticket_id: String,
        amount_paid: Decimal,
        at: DateTime<Utc>,
    },
}

impl FacilityEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            FacilityEvent::VehicleParked { .. } => "VehicleParked",
            FacilityEvent::VehicleExited { .. } => "VehicleExited",
            FacilityEvent::PaymentAccepted { .. } => "PaymentAccepted",
            FacilityEvent::PaymentRejected { .. } => "PaymentRejected",
        }
    }

    pub fn at(&self) -> DateTime<Utc> {
        match self {
            FacilityEvent::VehicleParked { at, .. }
            | FacilityEvent::VehicleExited { at, .. }
            | FacilityEvent::PaymentAccepted { at, .. }
            | FacilityEvent::PaymentRejected { at, .. } => *at,
        }
    }
}
