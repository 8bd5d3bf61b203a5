use chrono::Duration;
use parking_facility::{ErrorKind, ParkingError, SpotCategory, SpotStatus, VehicleCategory};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::support::{assert_consistent, car, facility, motorcycle, opening_time, truck, van};

#[test]
fn park_then_unpark_then_park_again() {
    let (facility, clock) = facility();
    let vehicle = car("ABC-123");

    let first = facility.park(&vehicle, "G-MAIN").unwrap();
    clock.advance(Duration::minutes(20));
    facility.unpark("ABC-123", "G-MAIN").unwrap();
    clock.advance(Duration::minutes(5));
    let second = facility.park(&vehicle, "G-MAIN").unwrap();

    assert_ne!(first.id(), second.id());
    assert_eq!(second.spot_id(), first.spot_id());
    facility.unpark("ABC-123", "G-MAIN").unwrap();
    facility.park(&vehicle, "G-MAIN").unwrap();
    assert_consistent(&facility);
}

#[test]
fn tickets_carry_date_prefixed_sequence() {
    let (facility, _) = facility();
    let a = facility.park(&car("ABC-123"), "G-IN").unwrap();
    let b = facility.park(&car("XYZ-789"), "G-IN").unwrap();

    assert_eq!(a.id(), "TKT-20240301-0001");
    assert_eq!(b.id(), "TKT-20240301-0002");
    assert_eq!(a.entry_time(), opening_time());
    assert_eq!(a.entry_gate_id(), "G-IN");
}

#[test]
fn each_vehicle_gets_its_preferred_category() {
    let (facility, _) = facility();

    assert_eq!(facility.park(&motorcycle("M-1"), "G-IN").unwrap().spot_id(), "C1");
    assert_eq!(facility.park(&car("C-1"), "G-IN").unwrap().spot_id(), "R1");
    // no Large spot on floor 0, so the van settles for Regular there
    assert_eq!(facility.park(&van("V-1"), "G-IN").unwrap().spot_id(), "R2");

    let truck_ticket = facility.park(&truck("T-1"), "G-IN").unwrap();
    assert_eq!(truck_ticket.spot_id(), "L1");
    assert_eq!(truck_ticket.floor(), 1);
    assert_eq!(truck_ticket.spot_category(), SpotCategory::Large);
}

#[test]
fn car_falls_back_to_electric_then_handicapped() {
    let (facility, _) = facility();
    let spots: Vec<String> = ["A-1", "A-2", "A-3", "A-4", "A-5", "A-6"]
        .iter()
        .map(|plate| facility.park(&car(plate), "G-IN").unwrap().spot_id().to_string())
        .collect();

    // floor 0 is searched completely before floor 1
    assert_eq!(spots, vec!["R1", "R2", "E1", "H1", "R3", "L1"]);
    assert_eq!(facility.spot_snapshot(0, "C1").unwrap().status, SpotStatus::Available);
}

#[test]
fn full_for_trucks_once_large_spots_are_gone() {
    let (facility, _) = facility();
    facility.park(&truck("T-1"), "G-IN").unwrap();
    facility.park(&truck("T-2"), "G-IN").unwrap();

    let err = facility.park(&truck("T-3"), "G-IN").unwrap_err();
    assert_eq!(err, ParkingError::NoAvailableSpot(VehicleCategory::Truck));
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(facility.ledger().active_count().unwrap(), 2);
}

#[test]
fn truck_cannot_be_forced_into_smaller_spots() {
    let (facility, _) = facility();
    for spot in ["C1", "R1", "H1", "E1"] {
        let err = facility
            .park_at_spot(&truck("T-1"), "G-IN", 0, spot)
            .unwrap_err();
        assert!(
            matches!(
                err,
                ParkingError::IncompatibleSpot {
                    vehicle: VehicleCategory::Truck,
                    ..
                }
            ),
            "{}",
            err
        );
    }
    assert!(facility.active_ticket_for("T-1").unwrap().is_none());
    assert_eq!(facility.spot_snapshot(0, "C1").unwrap().status, SpotStatus::Available);

    let ticket = facility.park_at_spot(&truck("T-1"), "G-IN", 1, "L2").unwrap();
    assert_eq!(ticket.spot_id(), "L2");
}

#[test]
fn park_at_spot_rejects_taken_or_unknown_spots() {
    let (facility, _) = facility();
    facility.park_at_spot(&car("ABC-123"), "G-IN", 0, "E1").unwrap();

    assert_eq!(
        facility
            .park_at_spot(&car("XYZ-789"), "G-IN", 0, "E1")
            .unwrap_err(),
        ParkingError::SpotStateConflict {
            spot_id: "E1".into(),
            status: SpotStatus::Occupied,
        }
    );
    assert_eq!(
        facility
            .park_at_spot(&car("XYZ-789"), "G-IN", 0, "Z9")
            .unwrap_err(),
        ParkingError::UnknownSpot("Z9".into())
    );
    assert_eq!(
        facility
            .park_at_spot(&car("XYZ-789"), "G-IN", 5, "E1")
            .unwrap_err(),
        ParkingError::UnknownFloor(5)
    );
}

#[test]
fn same_plate_cannot_park_twice() {
    let (facility, _) = facility();
    facility.park(&car("ABC-123"), "G-IN").unwrap();

    // a different car object with the same plate is the same vehicle
    let err = facility.park(&van("ABC-123"), "G-MAIN").unwrap_err();
    assert_eq!(err, ParkingError::VehicleAlreadyParked("ABC-123".into()));
    assert_eq!(facility.ledger().active_count().unwrap(), 1);
    assert_eq!(facility.gate("G-MAIN").unwrap().unwrap().passages, 0);
}

#[test]
fn unpark_without_session_fails() {
    let (facility, _) = facility();
    assert_eq!(
        facility.unpark("NOPE-1", "G-OUT").unwrap_err(),
        ParkingError::NoActiveSession("NOPE-1".into())
    );

    facility.park(&car("ABC-123"), "G-IN").unwrap();
    facility.unpark("ABC-123", "G-OUT").unwrap();
    assert_eq!(
        facility.unpark("ABC-123", "G-OUT").unwrap_err(),
        ParkingError::NoActiveSession("ABC-123".into())
    );
}

#[test]
fn regular_spot_sixty_five_minutes_bills_two_hours() {
    let (facility, clock) = facility();
    let ticket = facility.park(&car("ABC-123"), "G-IN").unwrap();
    assert_eq!(ticket.spot_category(), SpotCategory::Regular);

    clock.advance(Duration::minutes(65));
    let due = facility.unpark("ABC-123", "G-OUT").unwrap();
    assert_eq!(due, dec!(12.00));

    let completed = facility.ticket(ticket.id()).unwrap().unwrap();
    let fee = completed.fee().unwrap();
    assert_eq!(fee.hours, 2);
    assert_eq!(fee.ev_charging, Decimal::ZERO);
    assert_eq!(completed.exit_gate_id(), Some("G-OUT"));
}

#[test]
fn electric_spot_thirty_minutes_adds_ev_surcharge() {
    let (facility, clock) = facility();
    let ticket = facility.park_at_spot(&car("EV-001"), "G-IN", 0, "E1").unwrap();
    assert!(ticket.has_ev_charging());

    clock.advance(Duration::minutes(30));
    assert_eq!(facility.unpark("EV-001", "G-OUT").unwrap(), dec!(8.00));

    let fee = facility.ticket(ticket.id()).unwrap().unwrap().fee().cloned().unwrap();
    assert_eq!(fee.hours, 1);
    assert_eq!(fee.parking, dec!(6.00));
    assert_eq!(fee.ev_charging, dec!(2.00));
}

#[test]
fn quote_grows_while_parked() {
    let (facility, clock) = facility();
    facility.park_at_spot(&van("V-1"), "G-IN", 1, "L1").unwrap();

    let mut last = Decimal::ZERO;
    for _ in 0..5 {
        let quote = facility.quote_for_vehicle("V-1").unwrap();
        assert!(quote.total >= last);
        assert!(quote.ev_charging.is_zero());
        last = quote.total;
        clock.advance(Duration::minutes(45));
    }
    // Van in Large: 5.00 x 1.5 x 1.5 per hour
    assert_eq!(facility.quote_for_vehicle("V-1").unwrap().total, dec!(45.00));
}

#[test]
fn gates_count_only_successful_passages() {
    let (facility, clock) = facility();
    facility.park(&car("ABC-123"), "G-IN").unwrap();
    let _ = facility.park(&car("ABC-123"), "G-IN");
    clock.advance(Duration::hours(1));
    facility.unpark("ABC-123", "G-OUT").unwrap();

    let entry = facility.gate("G-IN").unwrap().unwrap();
    let exit = facility.gate("G-OUT").unwrap().unwrap();
    assert_eq!(entry.passages, 1);
    assert_eq!(entry.last_used, Some(opening_time()));
    assert_eq!(exit.passages, 1);
    assert_eq!(exit.last_used, Some(opening_time() + Duration::hours(1)));
}

#[test]
fn broken_gate_rejects_traffic() {
    let (facility, _) = facility();
    facility.set_gate_operational("G-IN", false).unwrap();

    let err = facility.park(&car("ABC-123"), "G-IN").unwrap_err();
    assert_eq!(err, ParkingError::GateCannotAdmit("G-IN".into()));
    assert_eq!(err.kind(), ErrorKind::Validation);

    facility.set_gate_operational("G-IN", true).unwrap();
    facility.park(&car("ABC-123"), "G-IN").unwrap();
}

#[test]
fn location_and_parked_vehicle_queries() {
    let (facility, _) = facility();
    facility.park(&car("ABC-123"), "G-IN").unwrap();
    facility.park(&truck("T-1"), "G-IN").unwrap();

    let location = facility.find_vehicle_location("T-1").unwrap().unwrap();
    assert_eq!(location.floor, 1);
    assert_eq!(location.spot_id, "L1");
    assert_eq!(location.status, SpotStatus::Occupied);
    assert!(facility.find_vehicle_location("NOPE-1").unwrap().is_none());

    let plates: Vec<String> = facility
        .currently_parked_vehicles()
        .unwrap()
        .iter()
        .map(|v| v.plate().to_string())
        .collect();
    assert_eq!(plates.len(), 2);
    assert!(plates.contains(&"ABC-123".to_string()));
    assert!(plates.contains(&"T-1".to_string()));
    assert_consistent(&facility);
}
