use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

use parking_facility::{ParkingError, SpotCategory, VehicleCategory};

use crate::support::{assert_consistent, car, facility, uniform_facility};

#[test]
fn last_spot_goes_to_exactly_one_gate() {
    let facility = Arc::new(uniform_facility(1, SpotCategory::Regular));
    let start = Arc::new(Barrier::new(16));

    let handles: Vec<_> = (0..16)
        .map(|n| {
            let facility = Arc::clone(&facility);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                facility.park(&car(&format!("CAR-{:02}", n)), "G-MAIN")
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for result in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(*result, ParkingError::NoAvailableSpot(VehicleCategory::Car));
    }
    assert_eq!(facility.ledger().active_count().unwrap(), 1);
    assert_eq!(facility.ledger().total_count().unwrap(), 1);
    assert_eq!(facility.currently_parked_vehicles().unwrap().len(), 1);
}

#[test]
fn concurrent_parks_fill_every_spot_once() {
    let facility = Arc::new(uniform_facility(40, SpotCategory::Regular));
    let start = Arc::new(Barrier::new(40));

    let handles: Vec<_> = (0..40)
        .map(|n| {
            let facility = Arc::clone(&facility);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                facility
                    .park(&car(&format!("CAR-{:02}", n)), "G-MAIN")
                    .map(|ticket| ticket.spot_id().to_string())
            })
        })
        .collect();

    let mut spots = HashSet::new();
    for handle in handles {
        let spot_id = handle.join().unwrap().unwrap();
        assert!(spots.insert(spot_id), "spot handed out twice");
    }
    assert_eq!(spots.len(), 40);

    let status = facility.status().unwrap();
    assert_eq!(status.occupied_spots, 40);
    assert_eq!(status.available_spots, 0);
    assert_eq!(status.active_tickets, 40);
    assert_eq!(status.gates[0].passages, 40);
    assert_consistent(&facility);
}

#[test]
fn same_plate_at_many_gates_parks_once() {
    let facility = Arc::new(uniform_facility(10, SpotCategory::Regular));
    let start = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let facility = Arc::clone(&facility);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                facility.park(&car("ABC-123"), "G-MAIN")
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(*err, ParkingError::VehicleAlreadyParked("ABC-123".into()));
    }
    assert_eq!(facility.status().unwrap().occupied_spots, 1);
}

#[test]
fn park_unpark_cycles_leave_no_residue() {
    let (facility, _) = facility();
    let facility = Arc::new(facility);

    let handles: Vec<_> = (0..4)
        .map(|n| {
            let facility = Arc::clone(&facility);
            thread::spawn(move || {
                let plate = format!("LOOP-{}", n);
                for _ in 0..25 {
                    facility.park(&car(&plate), "G-IN").unwrap();
                    facility.unpark(&plate, "G-OUT").unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let status = facility.status().unwrap();
    assert_eq!(status.occupied_spots, 0);
    assert_eq!(status.active_tickets, 0);
    assert_eq!(status.completed_tickets, 100);
    assert_eq!(facility.gate("G-IN").unwrap().unwrap().passages, 100);
    assert_eq!(facility.gate("G-OUT").unwrap().unwrap().passages, 100);
    assert_consistent(&facility);
}

#[test]
fn readers_run_alongside_traffic() {
    let (facility, _) = facility();
    let facility = Arc::new(facility);

    let writer = {
        let facility = Arc::clone(&facility);
        thread::spawn(move || {
            for n in 0..50 {
                let plate = format!("W-{}", n);
                facility.park(&car(&plate), "G-MAIN").unwrap();
                facility.unpark(&plate, "G-MAIN").unwrap();
            }
        })
    };
    let reader = {
        let facility = Arc::clone(&facility);
        thread::spawn(move || {
            for _ in 0..50 {
                let status = facility.status().unwrap();
                assert!(status.occupied_spots <= status.total_capacity);
                facility.available_spots_by_type().unwrap();
                facility.currently_parked_vehicles().unwrap();
            }
        })
    };
    writer.join().unwrap();
    reader.join().unwrap();

    assert_eq!(facility.ledger().completed_count().unwrap(), 50);
}
