use chrono::Duration;
use parking_facility::{ErrorKind, FacilityEvent, ParkingError};
use rust_decimal_macros::dec;

use crate::support::{car, facility, opening_time};

#[test]
fn underpayment_is_rejected_and_leaves_ticket_unpaid() {
    let (facility, clock) = facility();
    let ticket = facility.park(&car("ABC-123"), "G-IN").unwrap();
    clock.advance(Duration::minutes(65));
    facility.unpark("ABC-123", "G-OUT").unwrap();

    assert!(!facility.process_payment(ticket.id(), dec!(11.99)).unwrap());
    let stored = facility.ticket(ticket.id()).unwrap().unwrap();
    assert!(!stored.is_paid());
    assert_eq!(stored.amount_paid(), None);

    assert!(facility.process_payment(ticket.id(), dec!(12.00)).unwrap());
    let stored = facility.ticket(ticket.id()).unwrap().unwrap();
    assert!(stored.is_paid());
    assert_eq!(stored.amount_paid(), Some(dec!(12.00)));

    let events = facility.journal().events().unwrap();
    assert!(matches!(
        events[events.len() - 2],
        FacilityEvent::PaymentRejected { .. }
    ));
    assert!(matches!(
        events[events.len() - 1],
        FacilityEvent::PaymentAccepted { .. }
    ));
}

#[test]
fn paying_twice_is_idempotent() {
    let (facility, clock) = facility();
    let ticket = facility.park(&car("ABC-123"), "G-IN").unwrap();
    clock.advance(Duration::minutes(30));
    facility.unpark("ABC-123", "G-OUT").unwrap();

    assert!(facility.process_payment(ticket.id(), dec!(10.00)).unwrap());
    assert!(facility.process_payment(ticket.id(), dec!(1.00)).unwrap());
    assert_eq!(
        facility.ticket(ticket.id()).unwrap().unwrap().amount_paid(),
        Some(dec!(10.00))
    );
}

#[test]
fn prepayment_does_not_cover_a_stay_that_kept_growing() {
    let (facility, clock) = facility();
    let ticket = facility.park(&car("ABC-123"), "G-IN").unwrap();
    clock.advance(Duration::minutes(20));
    assert!(facility.process_payment(ticket.id(), dec!(6.00)).unwrap());

    clock.advance(Duration::hours(5));
    assert_eq!(facility.quote_for_vehicle("ABC-123").unwrap().total, dec!(36.00));
    assert!(!facility.process_payment(ticket.id(), dec!(0)).unwrap());
    assert!(matches!(
        facility.journal().events().unwrap().last(),
        Some(FacilityEvent::PaymentRejected { .. })
    ));

    let unpaid = facility.unpaid_tickets().unwrap();
    assert_eq!(unpaid.len(), 1);
    assert_eq!(unpaid[0].id(), ticket.id());
    assert_eq!(unpaid[0].amount_paid(), Some(dec!(6.00)));

    assert!(facility.process_payment(ticket.id(), dec!(36.00)).unwrap());
    assert!(facility.unpaid_tickets().unwrap().is_empty());
}

#[test]
fn payment_rejects_bad_input() {
    let (facility, _) = facility();
    let ticket = facility.park(&car("ABC-123"), "G-IN").unwrap();

    let err = facility
        .process_payment("TKT-20240301-9999", dec!(5.00))
        .unwrap_err();
    assert_eq!(err, ParkingError::TicketNotFound("TKT-20240301-9999".into()));
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = facility.process_payment(ticket.id(), dec!(-1.00)).unwrap_err();
    assert!(matches!(err, ParkingError::InvalidAmount(_)));
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn payment_before_exit_is_independent_of_release() {
    let (facility, clock) = facility();
    let ticket = facility.park(&car("ABC-123"), "G-IN").unwrap();
    clock.advance(Duration::minutes(40));

    // prepaid at the kiosk for the first hour
    assert!(facility.process_payment(ticket.id(), dec!(6.00)).unwrap());
    let active = facility.active_ticket_for("ABC-123").unwrap().unwrap();
    assert!(active.is_paid());
    assert!(active.is_active());

    clock.advance(Duration::minutes(10));
    assert_eq!(facility.unpark("ABC-123", "G-OUT").unwrap(), dec!(6.00));
    assert!(facility.ticket(ticket.id()).unwrap().unwrap().is_paid());
}

#[test]
fn prepayment_that_no_longer_covers_exit_reopens_balance() {
    let (facility, clock) = facility();
    let ticket = facility.park(&car("ABC-123"), "G-IN").unwrap();
    clock.advance(Duration::minutes(30));
    assert!(facility.process_payment(ticket.id(), dec!(6.00)).unwrap());

    clock.advance(Duration::hours(2));
    assert_eq!(facility.unpark("ABC-123", "G-OUT").unwrap(), dec!(18.00));

    let completed = facility.ticket(ticket.id()).unwrap().unwrap();
    assert!(!completed.is_paid());
    assert_eq!(completed.amount_paid(), Some(dec!(6.00)));
    assert!(facility
        .unpaid_tickets()
        .unwrap()
        .iter()
        .any(|t| t.id() == ticket.id()));
}

#[test]
fn completing_twice_keeps_frozen_exit_and_total() {
    let (facility, clock) = facility();
    let ticket = facility.park(&car("ABC-123"), "G-IN").unwrap();
    clock.advance(Duration::minutes(65));
    facility.unpark("ABC-123", "G-OUT").unwrap();
    let frozen = facility.ticket(ticket.id()).unwrap().unwrap();

    clock.advance(Duration::hours(5));
    let err = facility
        .ledger()
        .complete_parking(ticket.id(), "G-MAIN", facility.now())
        .unwrap_err();
    assert_eq!(err, ParkingError::TicketAlreadyCompleted(ticket.id().into()));

    let after = facility.ticket(ticket.id()).unwrap().unwrap();
    assert_eq!(after.exit_time(), frozen.exit_time());
    assert_eq!(after.exit_time(), Some(opening_time() + Duration::minutes(65)));
    assert_eq!(after.total_amount(), dec!(12.00));
    assert_eq!(after.exit_gate_id(), Some("G-OUT"));
}

#[test]
fn revenue_splits_parking_and_ev_charging() {
    let (facility, clock) = facility();
    let regular = facility.park(&car("REG-1"), "G-IN").unwrap();
    let electric = facility.park_at_spot(&car("EV-1"), "G-IN", 0, "E1").unwrap();
    let unpaid = facility.park(&car("DEBT-1"), "G-IN").unwrap();

    clock.advance(Duration::minutes(65));
    facility.unpark("REG-1", "G-OUT").unwrap();
    facility.unpark("EV-1", "G-OUT").unwrap();
    facility.unpark("DEBT-1", "G-OUT").unwrap();
    facility.process_payment(regular.id(), dec!(12.00)).unwrap();
    facility.process_payment(electric.id(), dec!(20.00)).unwrap();

    let revenue = facility.status().unwrap().revenue;
    // EV-1: 2h x 6.00 parking + 2h x 2.00 charging
    assert_eq!(revenue.total_revenue, dec!(28.00));
    assert_eq!(revenue.ev_charging_revenue, dec!(4.00));
    assert_eq!(revenue.parking_revenue, dec!(24.00));
    assert_eq!(revenue.outstanding, dec!(12.00));

    let unpaid_ids: Vec<String> = facility
        .unpaid_tickets()
        .unwrap()
        .iter()
        .map(|t| t.id().to_string())
        .collect();
    assert_eq!(unpaid_ids, vec![unpaid.id().to_string()]);
}

#[test]
fn unpaid_and_overdue_track_time_parked() {
    let (facility, clock) = facility();
    facility.park(&car("ABC-123"), "G-IN").unwrap();

    clock.advance(Duration::minutes(59));
    assert!(facility.unpaid_tickets().unwrap().is_empty());

    clock.advance(Duration::minutes(1));
    assert_eq!(facility.unpaid_tickets().unwrap().len(), 1);

    clock.advance(Duration::hours(23));
    assert!(facility.overdue_tickets().unwrap().is_empty());

    clock.advance(Duration::minutes(1));
    let overdue = facility.overdue_tickets().unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].plate(), "ABC-123");
}
