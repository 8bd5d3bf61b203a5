use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ParkingError;
use crate::vehicle::Vehicle;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SpotCategory {
    Compact,
    Regular,
    Large,
    Handicapped,
    Electric,
}

impl SpotCategory {
    pub const ALL: [SpotCategory; 5] = [
        SpotCategory::Compact,
        SpotCategory::Regular,
        SpotCategory::Large,
        SpotCategory::Handicapped,
        SpotCategory::Electric,
    ];

    pub fn price_multiplier(self) -> Decimal {
        match self {
            SpotCategory::Compact => Decimal::ONE,
            SpotCategory::Regular => Decimal::new(12, 1),
            SpotCategory::Large => Decimal::new(15, 1),
            SpotCategory::Handicapped => Decimal::new(13, 1),
            SpotCategory::Electric => Decimal::new(12, 1),
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            SpotCategory::Compact => "Compact",
            SpotCategory::Regular => "Regular",
            SpotCategory::Large => "Large",
            SpotCategory::Handicapped => "Handicapped",
            SpotCategory::Electric => "Electric",
        }
    }

    pub fn has_ev_charging(self) -> bool {
        self == SpotCategory::Electric
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpotStatus {
    Available,
    Occupied,
    Reserved,
    OutOfOrder,
}

impl SpotStatus {
    pub fn display_name(self) -> &'static str {
        match self {
            SpotStatus::Available => "Available",
            SpotStatus::Occupied => "Occupied",
            SpotStatus::Reserved => "Reserved",
            SpotStatus::OutOfOrder => "Out of Order",
        }
    }
}

/// Occupancy carries the vehicle only in the occupied state, so a spot can
/// never be Occupied without a vehicle or hold a vehicle while free.
#[derive(Debug)]
enum Occupancy {
    Available,
    Occupied {
        vehicle: Vehicle,
        since: DateTime<Utc>,
    },
    Reserved,
    OutOfOrder,
}

impl Occupancy {
    fn status(&self) -> SpotStatus {
        match self {
            Occupancy::Available => SpotStatus::Available,
            Occupancy::Occupied { .. } => SpotStatus::Occupied,
            Occupancy::Reserved => SpotStatus::Reserved,
            Occupancy::OutOfOrder => SpotStatus::OutOfOrder,
        }
    }
}

/// A single parking space.
///
/// Every state transition happens under the spot's own mutex, which makes
/// [`Spot::claim`] the compare-and-swap that decides races between gates.
#[derive(Debug)]
pub struct Spot {
    id: String,
    category: SpotCategory,
    floor: u32,
    state: Mutex<Occupancy>,
}

/// Read-only view of a spot handed to callers outside the facility.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpotSnapshot {
    pub spot_id: String,
    pub category: SpotCategory,
    pub floor: u32,
    pub status: SpotStatus,
    pub vehicle: Option<Vehicle>,
    pub occupied_since: Option<DateTime<Utc>>,
}

impl Spot {
    pub fn new(id: impl Into<String>, category: SpotCategory, floor: u32) -> Self {
        Spot {
            id: id.into(),
            category,
            floor,
            state: Mutex::new(Occupancy::Available),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn category(&self) -> SpotCategory {
        self.category
    }

    pub fn floor(&self) -> u32 {
        self.floor
    }

    pub fn status(&self) -> SpotStatus {
        self.state().status()
    }

    pub fn is_available(&self) -> bool {
        matches!(*self.state(), Occupancy::Available)
    }

    pub fn parked_vehicle(&self) -> Option<Vehicle> {
        match &*self.state() {
            Occupancy::Occupied { vehicle, .. } => Some(vehicle.clone()),
            _ => None,
        }
    }

    pub fn holds(&self, plate: &str) -> bool {
        matches!(&*self.state(), Occupancy::Occupied { vehicle, .. } if vehicle.plate() == plate)
    }

    pub fn occupied_since(&self) -> Option<DateTime<Utc>> {
        match &*self.state() {
            Occupancy::Occupied { since, .. } => Some(*since),
            _ => None,
        }
    }

    /// Available → Occupied. Returns `false` when the spot was not
    /// available, which under contention means another gate won it.
    pub fn claim(&self, vehicle: &Vehicle, at: DateTime<Utc>) -> bool {
        let mut state = self.state();
        if !matches!(*state, Occupancy::Available) {
            return false;
        }
        *state = Occupancy::Occupied {
            vehicle: vehicle.clone(),
            since: at,
        };
        true
    }

    /// Occupied → Available, but only for the vehicle named by `plate`.
    ///
    /// A spot holding some other vehicle (or nothing) is left untouched.
    pub fn release(&self, plate: &str) -> Result<Vehicle, ParkingError> {
        let mut state = self.state();
        match std::mem::replace(&mut *state, Occupancy::Available) {
            Occupancy::Occupied { vehicle, .. } if vehicle.plate() == plate => Ok(vehicle),
            previous => {
                let found = match &previous {
                    Occupancy::Occupied { vehicle, .. } => Some(vehicle.plate().to_string()),
                    _ => None,
                };
                *state = previous;
                Err(ParkingError::VehicleMismatch {
                    spot_id: self.id.clone(),
                    expected: plate.to_string(),
                    found,
                })
            }
        }
    }

    pub fn reserve(&self) -> Result<(), ParkingError> {
        self.transition(&[SpotStatus::Available], Occupancy::Reserved)
    }

    pub fn mark_out_of_order(&self) -> Result<(), ParkingError> {
        self.transition(&[SpotStatus::Available], Occupancy::OutOfOrder)
    }

    pub fn mark_available(&self) -> Result<(), ParkingError> {
        self.transition(
            &[SpotStatus::Reserved, SpotStatus::OutOfOrder],
            Occupancy::Available,
        )
    }

    pub fn snapshot(&self) -> SpotSnapshot {
        let state = self.state();
        let (vehicle, occupied_since) = match &*state {
            Occupancy::Occupied { vehicle, since } => (Some(vehicle.clone()), Some(*since)),
            _ => (None, None),
        };
        SpotSnapshot {
            spot_id: self.id.clone(),
            category: self.category,
            floor: self.floor,
            status: state.status(),
            vehicle,
            occupied_since,
        }
    }

    fn transition(&self, from: &[SpotStatus], to: Occupancy) -> Result<(), ParkingError> {
        let mut state = self.state();
        let status = state.status();
        if !from.contains(&status) {
            return Err(ParkingError::SpotStateConflict {
                spot_id: self.id.clone(),
                status,
            });
        }
        *state = to;
        Ok(())
    }

    // Every write is a single assignment, so a poisoned guard still holds a
    // consistent occupancy.
    fn state(&self) -> MutexGuard<'_, Occupancy> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
