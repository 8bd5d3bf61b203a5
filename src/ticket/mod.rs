mod pricing;

pub use pricing::{FeeBreakdown, PricingPolicy};

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ParkingError;
use crate::spot::{Spot, SpotCategory};
use crate::vehicle::Vehicle;

/// One parking session, from the entry gate to the exit gate.
///
/// Tickets are owned by the ledger. Callers receive clones and cannot change
/// the ledger's copy.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ticket {
    id: String,
    vehicle: Vehicle,
    spot_id: String,
    floor: u32,
    spot_category: SpotCategory,
    entry_time: DateTime<Utc>,
    entry_gate_id: String,
    exit_time: Option<DateTime<Utc>>,
    exit_gate_id: Option<String>,
    fee: Option<FeeBreakdown>,
    paid: bool,
    amount_paid: Option<Decimal>,
    ev_charging: bool,
}

impl Ticket {
    pub(crate) fn new(
        id: String,
        vehicle: &Vehicle,
        spot: &Spot,
        entry_gate_id: &str,
        entry_time: DateTime<Utc>,
    ) -> Self {
        Ticket {
            id,
            vehicle: vehicle.clone(),
            spot_id: spot.id().to_string(),
            floor: spot.floor(),
            spot_category: spot.category(),
            entry_time,
            entry_gate_id: entry_gate_id.to_string(),
            exit_time: None,
            exit_gate_id: None,
            fee: None,
            paid: false,
            amount_paid: None,
            ev_charging: spot.category().has_ev_charging(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn vehicle(&self) -> &Vehicle {
        &self.vehicle
    }

    pub fn plate(&self) -> &str {
        self.vehicle.plate()
    }

    pub fn spot_id(&self) -> &str {
        &self.spot_id
    }

    pub fn floor(&self) -> u32 {
        self.floor
    }

    pub fn spot_category(&self) -> SpotCategory {
        self.spot_category
    }

    pub fn entry_time(&self) -> DateTime<Utc> {
        self.entry_time
    }

    pub fn entry_gate_id(&self) -> &str {
        &self.entry_gate_id
    }

    pub fn exit_time(&self) -> Option<DateTime<Utc>> {
        self.exit_time
    }

    pub fn exit_gate_id(&self) -> Option<&str> {
        self.exit_gate_id.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.exit_time.is_none()
    }

    pub fn is_paid(&self) -> bool {
        self.paid
    }

    pub fn amount_paid(&self) -> Option<Decimal> {
        self.amount_paid
    }

    pub fn has_ev_charging(&self) -> bool {
        self.ev_charging
    }

    /// Last fee charged against this ticket: the final fee once completed,
    /// or the quote a payment was checked against while still active.
    pub fn fee(&self) -> Option<&FeeBreakdown> {
        self.fee.as_ref()
    }

    pub fn total_amount(&self) -> Decimal {
        self.fee.as_ref().map_or(Decimal::ZERO, |fee| fee.total)
    }

    /// Time parked up to `at`, or up to the exit once completed.
    pub fn duration(&self, at: DateTime<Utc>) -> Duration {
        self.exit_time.unwrap_or(at) - self.entry_time
    }

    /// Fee as of `at`. Completed tickets ignore `at` and price the frozen
    /// exit time, so repeated quotes agree.
    pub fn quote(&self, pricing: &PricingPolicy, at: DateTime<Utc>) -> FeeBreakdown {
        pricing.fee(
            self.vehicle.category(),
            self.spot_category,
            self.duration(at),
        )
    }

    /// Freezes the exit and the final fee. A ticket completes exactly once.
    ///
    /// A payment taken before exit that no longer covers the final fee is
    /// kept on record but the ticket goes back to unpaid.
    pub(crate) fn complete(
        &mut self,
        exit_gate_id: &str,
        at: DateTime<Utc>,
        pricing: &PricingPolicy,
    ) -> Result<&FeeBreakdown, ParkingError> {
        if self.exit_time.is_some() {
            return Err(ParkingError::TicketAlreadyCompleted(self.id.clone()));
        }
        self.exit_time = Some(at);
        self.exit_gate_id = Some(exit_gate_id.to_string());
        let fee = self.quote(pricing, at);
        if self.paid && !self.covers(&fee) {
            self.paid = false;
        }
        Ok(self.fee.insert(fee))
    }

    /// Whether the amount on record pays for `due`.
    pub fn covers(&self, due: &FeeBreakdown) -> bool {
        self.amount_paid.is_some_and(|paid| paid >= due.total)
    }

    /// Whether the amount on record still pays for the stay as of `at`.
    /// A prepaid active ticket stops being settled once its quote outgrows
    /// the prepayment.
    pub fn is_settled(&self, pricing: &PricingPolicy, at: DateTime<Utc>) -> bool {
        self.covers(&self.quote(pricing, at))
    }

    pub(crate) fn reopen(&mut self) {
        self.paid = false;
    }

    pub(crate) fn mark_paid(&mut self, amount_paid: Decimal, charged: FeeBreakdown) {
        self.paid = true;
        self.amount_paid = Some(amount_paid);
        self.fee = Some(charged);
    }
}
