//! Shared fixtures: a small two-floor facility on a manual clock.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use parking_facility::{
    GateDirection, ManualClock, ParkingFacility, SpotCategory, SpotStatus, Vehicle,
    VehicleCategory,
};

pub fn opening_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
}

/// Floor 0: C1 Compact, R1 R2 Regular, E1 Electric, H1 Handicapped.
/// Floor 1: L1 L2 Large, R3 Regular.
/// Gates: G-MAIN (both ways), G-IN (entry only), G-OUT (exit only).
pub fn facility() -> (ParkingFacility, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(opening_time()));
    let facility = ParkingFacility::new("PL-001", "Downtown Garage", "123 Main St", 2)
        .with_clock(clock.clone());

    facility.add_gate("G-MAIN", GateDirection::Both).unwrap();
    facility.add_gate("G-IN", GateDirection::EntryOnly).unwrap();
    facility.add_gate("G-OUT", GateDirection::ExitOnly).unwrap();

    for (floor, id, category) in [
        (0, "C1", SpotCategory::Compact),
        (0, "R1", SpotCategory::Regular),
        (0, "R2", SpotCategory::Regular),
        (0, "E1", SpotCategory::Electric),
        (0, "H1", SpotCategory::Handicapped),
        (1, "L1", SpotCategory::Large),
        (1, "L2", SpotCategory::Large),
        (1, "R3", SpotCategory::Regular),
    ] {
        facility.add_spot(floor, id, category).unwrap();
    }

    (facility, clock)
}

/// A single-floor facility with `count` spots of one category.
pub fn uniform_facility(count: usize, category: SpotCategory) -> ParkingFacility {
    let facility = ParkingFacility::new("PL-002", "Side Lot", "9 Side St", 1);
    facility.add_gate("G-MAIN", GateDirection::Both).unwrap();
    for n in 0..count {
        facility.add_spot(0, &format!("S{}", n + 1), category).unwrap();
    }
    facility
}

pub fn car(plate: &str) -> Vehicle {
    Vehicle::new(plate, VehicleCategory::Car, "Red", "John Doe")
}

pub fn motorcycle(plate: &str) -> Vehicle {
    Vehicle::new(plate, VehicleCategory::Motorcycle, "Black", "Jane Roe")
}

pub fn van(plate: &str) -> Vehicle {
    Vehicle::new(plate, VehicleCategory::Van, "White", "Acme Deliveries")
}

pub fn truck(plate: &str) -> Vehicle {
    Vehicle::new(plate, VehicleCategory::Truck, "Blue", "Bob Hauler")
}

/// Every spot is Occupied exactly when it holds a vehicle, and every
/// active ticket points at a spot holding its plate.
pub fn assert_consistent(facility: &ParkingFacility) {
    let status = facility.status().unwrap();
    for floor in &status.floors {
        assert!(floor.occupied + floor.available <= floor.capacity);
    }

    let spots = facility.spot_snapshots().unwrap();
    assert_eq!(spots.len(), status.total_capacity);
    for spot in &spots {
        assert_eq!(
            spot.status == SpotStatus::Occupied,
            spot.vehicle.is_some(),
            "spot {} on floor {}",
            spot.spot_id,
            spot.floor
        );
        assert_eq!(spot.vehicle.is_some(), spot.occupied_since.is_some());
    }

    for ticket in facility.ledger().active_tickets().unwrap() {
        let spot = facility
            .spot_snapshot(ticket.floor(), ticket.spot_id())
            .unwrap();
        assert_eq!(
            spot.vehicle.as_ref().map(|v| v.plate().to_string()),
            Some(ticket.plate().to_string())
        );
    }
    assert_eq!(
        facility.currently_parked_vehicles().unwrap().len(),
        facility.ledger().active_count().unwrap()
    );
}
