mod stats;

pub use stats::RevenueStats;

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::error::ParkingError;
use crate::spot::Spot;
use crate::ticket::{FeeBreakdown, PricingPolicy, Ticket};
use crate::vehicle::{Vehicle, VehicleCategory};

#[derive(Default)]
struct LedgerState {
    active: HashMap<String, Ticket>,
    completed: HashMap<String, Ticket>,
    // plate -> active ticket id
    active_by_plate: HashMap<String, String>,
}

/// Registry of active and completed tickets.
///
/// A ticket id lives in exactly one of the two maps. Writers take the write
/// lock; statistics only ever take the read lock and never mutate.
pub struct TicketLedger {
    state: RwLock<LedgerState>,
    sequence: AtomicU64,
    pricing: PricingPolicy,
    overdue_after: Duration,
}

impl TicketLedger {
    pub fn new(pricing: PricingPolicy) -> Self {
        TicketLedger {
            state: RwLock::new(LedgerState::default()),
            sequence: AtomicU64::new(1),
            pricing,
            overdue_after: Duration::hours(24),
        }
    }

    pub fn with_overdue_after(mut self, overdue_after: Duration) -> Self {
        self.overdue_after = overdue_after;
        self
    }

    pub fn pricing(&self) -> &PricingPolicy {
        &self.pricing
    }

    pub fn overdue_after(&self) -> Duration {
        self.overdue_after
    }

    /// Opens a session for a vehicle that has just claimed `spot`.
    ///
    /// Fails if the plate already has an active ticket.
    pub fn issue_ticket(
        &self,
        vehicle: &Vehicle,
        spot: &Spot,
        entry_gate_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Ticket, ParkingError> {
        let mut state = self.write("issue")?;
        if state.active_by_plate.contains_key(vehicle.plate()) {
            return Err(ParkingError::VehicleAlreadyParked(
                vehicle.plate().to_string(),
            ));
        }

        let ticket = Ticket::new(self.next_id(at), vehicle, spot, entry_gate_id, at);
        state
            .active_by_plate
            .insert(vehicle.plate().to_string(), ticket.id().to_string());
        state
            .active
            .insert(ticket.id().to_string(), ticket.clone());
        Ok(ticket)
    }

    /// The active ticket for a plate, if any. Completed sessions are not
    /// considered.
    pub fn find_by_vehicle(&self, plate: &str) -> Result<Option<Ticket>, ParkingError> {
        let state = self.read("find by vehicle")?;
        Ok(state
            .active_by_plate
            .get(plate)
            .and_then(|id| state.active.get(id))
            .cloned())
    }

    pub fn get(&self, ticket_id: &str) -> Result<Option<Ticket>, ParkingError> {
        let state = self.read("get")?;
        Ok(state
            .active
            .get(ticket_id)
            .or_else(|| state.completed.get(ticket_id))
            .cloned())
    }

    /// Moves an active ticket to completed and freezes its fee.
    pub fn complete_parking(
        &self,
        ticket_id: &str,
        exit_gate_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Ticket, ParkingError> {
        let mut state = self.write("complete")?;
        if state.completed.contains_key(ticket_id) {
            return Err(ParkingError::TicketAlreadyCompleted(ticket_id.to_string()));
        }
        let mut ticket = state
            .active
            .remove(ticket_id)
            .ok_or_else(|| ParkingError::TicketNotFound(ticket_id.to_string()))?;

        let outcome = ticket
            .complete(exit_gate_id, at, &self.pricing)
            .map(|_| ());
        if let Err(err) = outcome {
            state.active.insert(ticket_id.to_string(), ticket);
            return Err(err);
        }
        state.active_by_plate.remove(ticket.plate());
        state
            .completed
            .insert(ticket_id.to_string(), ticket.clone());
        Ok(ticket)
    }

    /// Accepts a payment if it covers the ticket's current total.
    ///
    /// Active tickets are quoted as of `at`, completed ones at their frozen
    /// exit. Payment does not move the ticket between maps. A ticket whose
    /// amount on record still covers the current total accepts any further
    /// payment unchanged; a stay that outgrew its prepayment is reopened and
    /// must be paid again in full.
    pub fn record_payment(
        &self,
        ticket_id: &str,
        amount_paid: Decimal,
        at: DateTime<Utc>,
    ) -> Result<bool, ParkingError> {
        if amount_paid.is_sign_negative() {
            return Err(ParkingError::InvalidAmount(amount_paid.to_string()));
        }

        let mut state = self.write("payment")?;
        let LedgerState {
            active, completed, ..
        } = &mut *state;
        let ticket = active
            .get_mut(ticket_id)
            .or_else(|| completed.get_mut(ticket_id))
            .ok_or_else(|| ParkingError::TicketNotFound(ticket_id.to_string()))?;

        let due = ticket.quote(&self.pricing, at);
        if ticket.is_paid() && ticket.covers(&due) {
            return Ok(true);
        }
        if amount_paid < due.total {
            ticket.reopen();
            return Ok(false);
        }
        ticket.mark_paid(amount_paid, due);
        Ok(true)
    }

    pub fn quote(&self, ticket_id: &str, at: DateTime<Utc>) -> Result<FeeBreakdown, ParkingError> {
        self.get(ticket_id)?
            .map(|ticket| ticket.quote(&self.pricing, at))
            .ok_or_else(|| ParkingError::TicketNotFound(ticket_id.to_string()))
    }

    pub fn active_tickets(&self) -> Result<Vec<Ticket>, ParkingError> {
        let state = self.read("active tickets")?;
        Ok(sorted(state.active.values().cloned().collect()))
    }

    pub fn completed_tickets(&self) -> Result<Vec<Ticket>, ParkingError> {
        let state = self.read("completed tickets")?;
        Ok(sorted(state.completed.values().cloned().collect()))
    }

    pub fn tickets_by_vehicle_category(
        &self,
        category: VehicleCategory,
    ) -> Result<Vec<Ticket>, ParkingError> {
        let state = self.read("tickets by category")?;
        Ok(sorted(
            state
                .active
                .values()
                .chain(state.completed.values())
                .filter(|ticket| ticket.vehicle().category() == category)
                .cloned()
                .collect(),
        ))
    }

    pub fn revenue_stats(&self) -> Result<RevenueStats, ParkingError> {
        let state = self.read("revenue stats")?;
        let mut stats = RevenueStats::default();
        for ticket in state.completed.values() {
            let Some(fee) = ticket.fee() else {
                continue;
            };
            if ticket.is_paid() {
                stats.total_revenue += fee.total;
                stats.ev_charging_revenue += fee.ev_charging;
            } else {
                stats.outstanding += fee.total;
            }
        }
        stats.parking_revenue = stats.total_revenue - stats.ev_charging_revenue;
        Ok(stats)
    }

    /// Active sessions per vehicle category. Every category is present.
    pub fn vehicle_type_stats(&self) -> Result<BTreeMap<VehicleCategory, usize>, ParkingError> {
        let state = self.read("vehicle type stats")?;
        let mut stats: BTreeMap<VehicleCategory, usize> =
            VehicleCategory::ALL.iter().map(|category| (*category, 0)).collect();
        for ticket in state.active.values() {
            *stats.entry(ticket.vehicle().category()).or_default() += 1;
        }
        Ok(stats)
    }

    /// Tickets awaiting payment: completed unpaid sessions, and active
    /// sessions that have run at least one whole hour and whose amount on
    /// record does not cover the quote as of `at`.
    pub fn unpaid_tickets(&self, at: DateTime<Utc>) -> Result<Vec<Ticket>, ParkingError> {
        let state = self.read("unpaid tickets")?;
        Ok(sorted(
            state
                .active
                .values()
                .filter(|ticket| {
                    ticket.duration(at) >= Duration::hours(1)
                        && !ticket.is_settled(&self.pricing, at)
                })
                .chain(state.completed.values().filter(|ticket| !ticket.is_paid()))
                .cloned()
                .collect(),
        ))
    }

    pub fn overdue_tickets(&self, at: DateTime<Utc>) -> Result<Vec<Ticket>, ParkingError> {
        let state = self.read("overdue tickets")?;
        Ok(sorted(
            state
                .active
                .values()
                .filter(|ticket| ticket.duration(at) > self.overdue_after)
                .cloned()
                .collect(),
        ))
    }

    pub fn active_count(&self) -> Result<usize, ParkingError> {
        Ok(self.read("active count")?.active.len())
    }

    pub fn completed_count(&self) -> Result<usize, ParkingError> {
        Ok(self.read("completed count")?.completed.len())
    }

    pub fn total_count(&self) -> Result<usize, ParkingError> {
        let state = self.read("total count")?;
        Ok(state.active.len() + state.completed.len())
    }

    fn next_id(&self, at: DateTime<Utc>) -> String {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("TKT-{}-{:04}", at.format("%Y%m%d"), sequence)
    }

    fn read(&self, operation: &'static str) -> Result<RwLockReadGuard<'_, LedgerState>, ParkingError> {
        self.state
            .read()
            .map_err(|_| ParkingError::LockPoisoned(operation))
    }

    fn write(
        &self,
        operation: &'static str,
    ) -> Result<RwLockWriteGuard<'_, LedgerState>, ParkingError> {
        self.state
            .write()
            .map_err(|_| ParkingError::LockPoisoned(operation))
    }
}

impl Default for TicketLedger {
    fn default() -> Self {
        Self::new(PricingPolicy::default())
    }
}

fn sorted(mut tickets: Vec<Ticket>) -> Vec<Ticket> {
    tickets.sort_by(|a, b| {
        a.entry_time()
            .cmp(&b.entry_time())
            .then_with(|| a.id().cmp(b.id()))
    });
    tickets
}
