use std::fmt;

use crate::spot::{SpotCategory, SpotStatus};
use crate::vehicle::VehicleCategory;

/// Coarse classification of a [`ParkingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Facility set-up is inconsistent. Fatal at start-up.
    Configuration,
    /// The request itself is malformed or names an unusable gate.
    Validation,
    /// An expected operational outcome (lot full, already parked, ...).
    Conflict,
    /// Internal failure such as a poisoned lock.
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParkingError {
    UnknownFloor(u32),
    FloorMismatch {
        spot_id: String,
        spot_floor: u32,
        floor: u32,
    },
    DuplicateSpot(String),
    DuplicateGate(String),
    UnregisteredVehicleCategory(VehicleCategory),
    InvalidConfig(String),

    UnknownGate(String),
    GateCannotAdmit(String),
    GateCannotRelease(String),
    MalformedId(&'static str),
    InvalidAmount(String),

    VehicleAlreadyParked(String),
    NoAvailableSpot(VehicleCategory),
    IncompatibleSpot {
        vehicle: VehicleCategory,
        spot: SpotCategory,
    },
    UnknownSpot(String),
    SpotStateConflict {
        spot_id: String,
        status: SpotStatus,
    },
    NoActiveSession(String),
    TicketNotFound(String),
    TicketAlreadyCompleted(String),
    VehicleMismatch {
        spot_id: String,
        expected: String,
        found: Option<String>,
    },
    ExitRollbackFailed {
        ticket_id: String,
        spot_id: String,
        cause: Box<ParkingError>,
    },

    LockPoisoned(&'static str),
}

impl ParkingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ParkingError::UnknownFloor(_)
            | ParkingError::FloorMismatch { .. }
            | ParkingError::DuplicateSpot(_)
            | ParkingError::DuplicateGate(_)
            | ParkingError::UnregisteredVehicleCategory(_)
            | ParkingError::InvalidConfig(_) => ErrorKind::Configuration,
            ParkingError::UnknownGate(_)
            | ParkingError::GateCannotAdmit(_)
            | ParkingError::GateCannotRelease(_)
            | ParkingError::MalformedId(_)
            | ParkingError::InvalidAmount(_) => ErrorKind::Validation,
            ParkingError::VehicleAlreadyParked(_)
            | ParkingError::NoAvailableSpot(_)
            | ParkingError::IncompatibleSpot { .. }
            | ParkingError::UnknownSpot(_)
            | ParkingError::SpotStateConflict { .. }
            | ParkingError::NoActiveSession(_)
            | ParkingError::TicketNotFound(_)
            | ParkingError::TicketAlreadyCompleted(_) => ErrorKind::Conflict,
            ParkingError::VehicleMismatch { .. }
            | ParkingError::ExitRollbackFailed { .. }
            | ParkingError::LockPoisoned(_) => ErrorKind::Internal,
        }
    }
}

impl fmt::Display for ParkingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParkingError::UnknownFloor(floor) => write!(f, "floor {} does not exist", floor),
            ParkingError::FloorMismatch {
                spot_id,
                spot_floor,
                floor,
            } => write!(
                f,
                "spot {} belongs to floor {} but was added to floor {}",
                spot_id, spot_floor, floor
            ),
            ParkingError::DuplicateSpot(id) => write!(f, "spot {} is already provisioned", id),
            ParkingError::DuplicateGate(id) => write!(f, "gate {} is already provisioned", id),
            ParkingError::UnregisteredVehicleCategory(category) => write!(
                f,
                "vehicle category {} has no compatibility rule",
                category.display_name()
            ),
            ParkingError::InvalidConfig(message) => write!(f, "invalid configuration: {}", message),
            ParkingError::UnknownGate(id) => write!(f, "gate {} does not exist", id),
            ParkingError::GateCannotAdmit(id) => {
                write!(f, "gate {} cannot admit vehicles right now", id)
            }
            ParkingError::GateCannotRelease(id) => {
                write!(f, "gate {} cannot release vehicles right now", id)
            }
            ParkingError::MalformedId(what) => write!(f, "{} must not be empty", what),
            ParkingError::InvalidAmount(amount) => write!(f, "invalid payment amount {}", amount),
            ParkingError::VehicleAlreadyParked(plate) => {
                write!(f, "vehicle {} is already parked", plate)
            }
            ParkingError::NoAvailableSpot(category) => write!(
                f,
                "no available parking spot for {}",
                category.display_name()
            ),
            ParkingError::IncompatibleSpot { vehicle, spot } => write!(
                f,
                "{} cannot park in a {} spot",
                vehicle.display_name(),
                spot.display_name()
            ),
            ParkingError::UnknownSpot(id) => write!(f, "spot {} does not exist", id),
            ParkingError::SpotStateConflict { spot_id, status } => write!(
                f,
                "spot {} is {} and cannot make that transition",
                spot_id,
                status.display_name()
            ),
            ParkingError::NoActiveSession(plate) => {
                write!(f, "no active parking session for vehicle {}", plate)
            }
            ParkingError::TicketNotFound(id) => write!(f, "ticket {} not found", id),
            ParkingError::TicketAlreadyCompleted(id) => {
                write!(f, "ticket {} is already completed", id)
            }
            ParkingError::VehicleMismatch {
                spot_id,
                expected,
                found,
            } => match found {
                Some(found) => write!(
                    f,
                    "spot {} held vehicle {} but ticket names {}",
                    spot_id, found, expected
                ),
                None => write!(
                    f,
                    "spot {} was empty but ticket names vehicle {}",
                    spot_id, expected
                ),
            },
            ParkingError::ExitRollbackFailed {
                ticket_id,
                spot_id,
                cause,
            } => write!(
                f,
                "exit of ticket {} failed ({}) and spot {} could not be restored",
                ticket_id, cause, spot_id
            ),
            ParkingError::LockPoisoned(operation) => {
                write!(f, "facility lock poisoned during {}", operation)
            }
        }
    }
}

impl std::error::Error for ParkingError {}
