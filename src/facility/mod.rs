//! The facility orchestrator: gates, floors and the ticket ledger bound
//! into atomic park / unpark operations.

mod status;

pub use status::FacilityStatus;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::ParkingError;
use crate::floor::Floor;
use crate::gate::{Gate, GateDirection, GateSnapshot};
use crate::journal::{EventJournal, FacilityEvent};
use crate::ledger::TicketLedger;
use crate::lock::KeyedLocks;
use crate::spot::{Spot, SpotCategory, SpotSnapshot};
use crate::ticket::{FeeBreakdown, PricingPolicy, Ticket};
use crate::vehicle::{CompatibilityRegistry, Vehicle};

pub const DEFAULT_MAX_CLAIM_ATTEMPTS: u32 = 8;

/// Outcome of one search-and-claim pass over the floors.
enum ClaimOutcome {
    Claimed(Arc<Spot>),
    /// Every candidate seen was taken between search and claim.
    Lost(usize),
    Full,
}

/// A multi-floor parking facility.
///
/// All operations take `&self`; share the facility between gate threads with
/// an `Arc`. Spot claims are atomic per spot, so concurrent `park` calls can
/// never bind two vehicles to one spot, and park/unpark of the same plate are
/// serialised by a per-plate session lock.
pub struct ParkingFacility {
    id: String,
    name: String,
    address: String,
    floors: Vec<RwLock<Floor>>,
    gates: RwLock<Vec<Arc<Gate>>>,
    registry: CompatibilityRegistry,
    ledger: TicketLedger,
    sessions: KeyedLocks,
    journal: EventJournal,
    clock: Arc<dyn Clock>,
    max_claim_attempts: u32,
    // serialises spot provisioning so facility-wide id uniqueness holds
    provisioning: Mutex<()>,
}

impl ParkingFacility {
    /// Creates an empty facility with floors `0..floor_count`, default
    /// pricing and compatibility rules, and the system clock.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        address: impl Into<String>,
        floor_count: u32,
    ) -> Self {
        ParkingFacility {
            id: id.into(),
            name: name.into(),
            address: address.into(),
            floors: (0..floor_count).map(|n| RwLock::new(Floor::new(n))).collect(),
            gates: RwLock::new(Vec::new()),
            registry: CompatibilityRegistry::default(),
            ledger: TicketLedger::default(),
            sessions: KeyedLocks::new(),
            journal: EventJournal::new(),
            clock: Arc::new(SystemClock),
            max_claim_attempts: DEFAULT_MAX_CLAIM_ATTEMPTS,
            provisioning: Mutex::new(()),
        }
    }

    /// Replaces the compatibility rules. Every vehicle category must have a
    /// rule.
    pub fn with_registry(mut self, registry: CompatibilityRegistry) -> Result<Self, ParkingError> {
        registry.ensure_complete()?;
        self.registry = registry;
        Ok(self)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the pricing policy. Intended for set-up, before any ticket
    /// is issued: the ledger is rebuilt.
    pub fn with_pricing(mut self, pricing: PricingPolicy) -> Self {
        let overdue_after = self.ledger.overdue_after();
        self.ledger = TicketLedger::new(pricing).with_overdue_after(overdue_after);
        self
    }

    pub fn with_overdue_after(mut self, overdue_after: Duration) -> Self {
        self.ledger = self.ledger.with_overdue_after(overdue_after);
        self
    }

    /// Bound on search-and-claim passes per `park` before it gives up with
    /// `NoAvailableSpot`.
    pub fn with_max_claim_attempts(mut self, attempts: u32) -> Self {
        self.max_claim_attempts = attempts.max(1);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn floor_count(&self) -> u32 {
        self.floors.len() as u32
    }

    pub fn registry(&self) -> &CompatibilityRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &TicketLedger {
        &self.ledger
    }

    pub fn journal(&self) -> &EventJournal {
        &self.journal
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ------------------------------------------------------------------
    // Traffic
    // ------------------------------------------------------------------

    /// Admits `vehicle` through `entry_gate_id` into the first compatible
    /// available spot, searching floors from 0 upward.
    pub fn park(&self, vehicle: &Vehicle, entry_gate_id: &str) -> Result<Ticket, ParkingError> {
        validate_id("plate", vehicle.plate())?;
        validate_id("gate id", entry_gate_id)?;
        let gate = self.entry_gate(entry_gate_id)?;
        self.registry.compatible_spots(vehicle.category())?;

        let _session = self.sessions.acquire(vehicle.plate())?;
        self.ensure_not_parked(vehicle.plate())?;

        let at = self.clock.now();
        let spot = self.claim_first_fit(vehicle, at)?;
        self.admit(vehicle, spot, &gate, at)
    }

    /// Admits `vehicle` into a specific spot chosen by an attendant.
    ///
    /// Fails with `IncompatibleSpot` if the registry forbids the spot's
    /// category for this vehicle, and with `SpotStateConflict` if the spot is
    /// not available.
    pub fn park_at_spot(
        &self,
        vehicle: &Vehicle,
        entry_gate_id: &str,
        floor: u32,
        spot_id: &str,
    ) -> Result<Ticket, ParkingError> {
        validate_id("plate", vehicle.plate())?;
        validate_id("gate id", entry_gate_id)?;
        validate_id("spot id", spot_id)?;
        let gate = self.entry_gate(entry_gate_id)?;
        self.registry.compatible_spots(vehicle.category())?;

        let _session = self.sessions.acquire(vehicle.plate())?;
        self.ensure_not_parked(vehicle.plate())?;

        let at = self.clock.now();
        let spot = {
            let floor = self.read_floor(floor)?;
            let spot = floor
                .spot(spot_id)
                .ok_or_else(|| ParkingError::UnknownSpot(spot_id.to_string()))?;
            if !self.registry.allows(vehicle.category(), spot.category()) {
                return Err(ParkingError::IncompatibleSpot {
                    vehicle: vehicle.category(),
                    spot: spot.category(),
                });
            }
            if !spot.claim(vehicle, at) {
                return Err(ParkingError::SpotStateConflict {
                    spot_id: spot_id.to_string(),
                    status: spot.status(),
                });
            }
            spot
        };
        self.admit(vehicle, spot, &gate, at)
    }

    /// Releases the vehicle's spot, closes its ticket and returns the amount
    /// due.
    pub fn unpark(&self, plate: &str, exit_gate_id: &str) -> Result<Decimal, ParkingError> {
        validate_id("plate", plate)?;
        validate_id("gate id", exit_gate_id)?;
        let gate = self.exit_gate(exit_gate_id)?;

        let _session = self.sessions.acquire(plate)?;
        let ticket = self
            .ledger
            .find_by_vehicle(plate)?
            .ok_or_else(|| ParkingError::NoActiveSession(plate.to_string()))?;

        let spot = self.spot(ticket.floor(), ticket.spot_id())?;
        let vehicle = spot.release(plate).map_err(|err| {
            warn!(plate, ticket_id = ticket.id(), spot_id = spot.id(), error = %err, "spot does not hold the ticketed vehicle");
            err
        })?;

        let at = self.clock.now();
        let completed = match self.ledger.complete_parking(ticket.id(), gate.id(), at) {
            Ok(completed) => completed,
            Err(err) => return Err(restore_after_failed_exit(&spot, &vehicle, &ticket, err)),
        };

        gate.record_passage(at);
        let amount_due = completed.total_amount();
        self.record(FacilityEvent::VehicleExited {
            ticket_id: completed.id().to_string(),
            plate: plate.to_string(),
            spot_id: completed.spot_id().to_string(),
            gate_id: gate.id().to_string(),
            amount_due,
            at,
        });
        info!(plate, ticket_id = completed.id(), spot_id = completed.spot_id(), gate_id = gate.id(), amount = %amount_due, "vehicle exited");
        Ok(amount_due)
    }

    /// Accepts `amount_paid` for a ticket if it covers the current total.
    /// Independent of exit: a ticket may be paid while still active.
    pub fn process_payment(&self, ticket_id: &str, amount_paid: Decimal) -> Result<bool, ParkingError> {
        validate_id("ticket id", ticket_id)?;
        let at = self.clock.now();
        let accepted = self.ledger.record_payment(ticket_id, amount_paid, at)?;

        let event = if accepted {
            info!(ticket_id, amount = %amount_paid, "payment accepted");
            FacilityEvent::PaymentAccepted {
                ticket_id: ticket_id.to_string(),
                amount_paid,
                at,
            }
        } else {
            info!(ticket_id, amount = %amount_paid, "payment rejected");
            FacilityEvent::PaymentRejected {
                ticket_id: ticket_id.to_string(),
                amount_paid,
                at,
            }
        };
        self.record(event);
        Ok(accepted)
    }

    fn ensure_not_parked(&self, plate: &str) -> Result<(), ParkingError> {
        if self.ledger.find_by_vehicle(plate)?.is_some() {
            return Err(ParkingError::VehicleAlreadyParked(plate.to_string()));
        }
        Ok(())
    }

    fn claim_first_fit(&self, vehicle: &Vehicle, at: DateTime<Utc>) -> Result<Arc<Spot>, ParkingError> {
        for attempt in 1..=self.max_claim_attempts {
            match self.try_claim_first_fit(vehicle, at)? {
                ClaimOutcome::Claimed(spot) => return Ok(spot),
                ClaimOutcome::Full => {
                    return Err(ParkingError::NoAvailableSpot(vehicle.category()))
                }
                ClaimOutcome::Lost(lost) => {
                    debug!(plate = vehicle.plate(), lost, attempt, "every candidate was taken, searching again");
                }
            }
        }
        warn!(plate = vehicle.plate(), attempts = self.max_claim_attempts, "spot claim retries exhausted");
        Err(ParkingError::NoAvailableSpot(vehicle.category()))
    }

    // One pass walks every available candidate of every floor, so a pass
    // only comes back empty-handed if rivals took all of them. Claims happen
    // under the floor's read lock so a spot cannot be removed between search
    // and claim.
    fn try_claim_first_fit(&self, vehicle: &Vehicle, at: DateTime<Utc>) -> Result<ClaimOutcome, ParkingError> {
        let mut lost = 0;
        for floor in &self.floors {
            let floor = floor
                .read()
                .map_err(|_| ParkingError::LockPoisoned("floor search"))?;
            let candidates = floor.available_candidates(vehicle, &self.registry)?;
            let (claimed, lost_here) = claim_first_available(candidates, vehicle, at);
            if let Some(spot) = claimed {
                return Ok(ClaimOutcome::Claimed(spot));
            }
            lost += lost_here;
        }
        if lost > 0 {
            Ok(ClaimOutcome::Lost(lost))
        } else {
            Ok(ClaimOutcome::Full)
        }
    }

    /// Issues the ticket for a claimed spot; releases the spot if that fails.
    fn admit(
        &self,
        vehicle: &Vehicle,
        spot: Arc<Spot>,
        gate: &Gate,
        at: DateTime<Utc>,
    ) -> Result<Ticket, ParkingError> {
        let ticket = match self.ledger.issue_ticket(vehicle, &spot, gate.id(), at) {
            Ok(ticket) => ticket,
            Err(err) => {
                if let Err(release_err) = spot.release(vehicle.plate()) {
                    warn!(plate = vehicle.plate(), spot_id = spot.id(), error = %release_err, "could not roll back spot claim");
                }
                return Err(err);
            }
        };

        gate.record_passage(at);
        self.record(FacilityEvent::VehicleParked {
            ticket_id: ticket.id().to_string(),
            plate: vehicle.plate().to_string(),
            vehicle_category: vehicle.category(),
            floor: spot.floor(),
            spot_id: spot.id().to_string(),
            spot_category: spot.category(),
            gate_id: gate.id().to_string(),
            at,
        });
        info!(plate = vehicle.plate(), ticket_id = ticket.id(), spot_id = spot.id(), floor = spot.floor(), gate_id = gate.id(), "vehicle parked");
        Ok(ticket)
    }

    fn record(&self, event: FacilityEvent) {
        if let Err(err) = self.journal.append(&event) {
            warn!(event_type = event.event_type(), error = %err, "could not journal facility event");
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn status(&self) -> Result<FacilityStatus, ParkingError> {
        let mut floors = Vec::with_capacity(self.floors.len());
        for number in 0..self.floor_count() {
            floors.push(self.read_floor(number)?.status());
        }
        let total_capacity: usize = floors.iter().map(|f| f.capacity).sum();
        let occupied_spots: usize = floors.iter().map(|f| f.occupied).sum();
        let available_spots: usize = floors.iter().map(|f| f.available).sum();

        Ok(FacilityStatus {
            id: self.id.clone(),
            name: self.name.clone(),
            address: self.address.clone(),
            total_floors: self.floor_count(),
            total_capacity,
            occupied_spots,
            available_spots,
            occupancy_rate: if total_capacity == 0 {
                0.0
            } else {
                occupied_spots as f64 / total_capacity as f64
            },
            floors,
            gates: self.gates()?,
            active_tickets: self.ledger.active_count()?,
            completed_tickets: self.ledger.completed_count()?,
            vehicle_type_stats: self.ledger.vehicle_type_stats()?,
            revenue: self.ledger.revenue_stats()?,
        })
    }

    /// Available spots per category across all floors, zero-filled.
    pub fn available_spots_by_type(&self) -> Result<BTreeMap<SpotCategory, usize>, ParkingError> {
        let mut totals: BTreeMap<SpotCategory, usize> =
            SpotCategory::ALL.iter().map(|c| (*c, 0)).collect();
        for number in 0..self.floor_count() {
            for (category, count) in self.read_floor(number)?.available_by_category() {
                *totals.entry(category).or_default() += count;
            }
        }
        Ok(totals)
    }

    /// Where a vehicle with an active session is parked.
    pub fn find_vehicle_location(&self, plate: &str) -> Result<Option<SpotSnapshot>, ParkingError> {
        let Some(ticket) = self.ledger.find_by_vehicle(plate)? else {
            return Ok(None);
        };
        let floor = self.read_floor(ticket.floor())?;
        Ok(floor
            .spot(ticket.spot_id())
            .filter(|spot| spot.holds(plate))
            .map(|spot| spot.snapshot()))
    }

    /// Vehicles currently occupying a spot, floor by floor.
    pub fn currently_parked_vehicles(&self) -> Result<Vec<Vehicle>, ParkingError> {
        let mut vehicles = Vec::new();
        for number in 0..self.floor_count() {
            let floor = self.read_floor(number)?;
            vehicles.extend(
                floor
                    .occupied_spots()
                    .iter()
                    .filter_map(|spot| spot.parked_vehicle()),
            );
        }
        Ok(vehicles)
    }

    pub fn ticket(&self, ticket_id: &str) -> Result<Option<Ticket>, ParkingError> {
        self.ledger.get(ticket_id)
    }

    pub fn active_ticket_for(&self, plate: &str) -> Result<Option<Ticket>, ParkingError> {
        self.ledger.find_by_vehicle(plate)
    }

    /// What the vehicle would owe if it left now.
    pub fn quote_for_vehicle(&self, plate: &str) -> Result<FeeBreakdown, ParkingError> {
        let ticket = self
            .ledger
            .find_by_vehicle(plate)?
            .ok_or_else(|| ParkingError::NoActiveSession(plate.to_string()))?;
        Ok(ticket.quote(self.ledger.pricing(), self.clock.now()))
    }

    pub fn unpaid_tickets(&self) -> Result<Vec<Ticket>, ParkingError> {
        self.ledger.unpaid_tickets(self.clock.now())
    }

    pub fn overdue_tickets(&self) -> Result<Vec<Ticket>, ParkingError> {
        self.ledger.overdue_tickets(self.clock.now())
    }

    pub fn gates(&self) -> Result<Vec<GateSnapshot>, ParkingError> {
        Ok(self
            .read_gates()?
            .iter()
            .map(|gate| gate.snapshot())
            .collect())
    }

    pub fn gate(&self, gate_id: &str) -> Result<Option<GateSnapshot>, ParkingError> {
        Ok(self.find_gate(gate_id)?.map(|gate| gate.snapshot()))
    }

    pub fn spot_snapshot(&self, floor: u32, spot_id: &str) -> Result<SpotSnapshot, ParkingError> {
        Ok(self.spot(floor, spot_id)?.snapshot())
    }

    /// Every provisioned spot, floor by floor and by category within a floor.
    pub fn spot_snapshots(&self) -> Result<Vec<SpotSnapshot>, ParkingError> {
        let mut snapshots = Vec::new();
        for number in 0..self.floor_count() {
            let floor = self.read_floor(number)?;
            snapshots.extend(floor.spots().iter().map(|spot| spot.snapshot()));
        }
        Ok(snapshots)
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    pub fn add_gate(&self, gate_id: &str, direction: GateDirection) -> Result<(), ParkingError> {
        validate_id("gate id", gate_id)?;
        let mut gates = self
            .gates
            .write()
            .map_err(|_| ParkingError::LockPoisoned("add gate"))?;
        if gates.iter().any(|gate| gate.id() == gate_id) {
            return Err(ParkingError::DuplicateGate(gate_id.to_string()));
        }
        gates.push(Arc::new(Gate::new(gate_id, direction)));
        Ok(())
    }

    /// Provisions a new available spot. Spot ids are unique across the
    /// whole facility.
    pub fn add_spot(
        &self,
        floor: u32,
        spot_id: &str,
        category: SpotCategory,
    ) -> Result<(), ParkingError> {
        self.install_spot(floor, Spot::new(spot_id, category, floor))
    }

    /// Adds a pre-built spot to `floor`. The spot's own floor number must
    /// match.
    pub fn install_spot(&self, floor: u32, spot: Spot) -> Result<(), ParkingError> {
        validate_id("spot id", spot.id())?;
        let _provisioning = self
            .provisioning
            .lock()
            .map_err(|_| ParkingError::LockPoisoned("provisioning"))?;
        self.floor(floor)?;
        for number in 0..self.floor_count() {
            if self.read_floor(number)?.contains(spot.id()) {
                return Err(ParkingError::DuplicateSpot(spot.id().to_string()));
            }
        }
        self.write_floor(floor)?.add_spot(spot)?;
        Ok(())
    }

    /// Removes a spot that does not hold a vehicle.
    pub fn remove_spot(&self, floor: u32, spot_id: &str) -> Result<SpotSnapshot, ParkingError> {
        let _provisioning = self
            .provisioning
            .lock()
            .map_err(|_| ParkingError::LockPoisoned("provisioning"))?;
        let removed = self.write_floor(floor)?.remove_spot(spot_id)?;
        Ok(removed.snapshot())
    }

    pub fn reserve_spot(&self, floor: u32, spot_id: &str) -> Result<(), ParkingError> {
        self.spot(floor, spot_id)?.reserve()
    }

    pub fn mark_spot_out_of_order(&self, floor: u32, spot_id: &str) -> Result<(), ParkingError> {
        self.spot(floor, spot_id)?.mark_out_of_order()
    }

    pub fn mark_spot_available(&self, floor: u32, spot_id: &str) -> Result<(), ParkingError> {
        self.spot(floor, spot_id)?.mark_available()
    }

    pub fn set_gate_operational(&self, gate_id: &str, operational: bool) -> Result<(), ParkingError> {
        self.gate_by_id(gate_id)?.set_operational(operational);
        info!(gate_id, operational, "gate availability changed");
        Ok(())
    }

    pub fn reset_gate_counter(&self, gate_id: &str) -> Result<(), ParkingError> {
        self.gate_by_id(gate_id)?.reset_counter();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    fn floor(&self, number: u32) -> Result<&RwLock<Floor>, ParkingError> {
        self.floors
            .get(number as usize)
            .ok_or(ParkingError::UnknownFloor(number))
    }

    fn read_floor(&self, number: u32) -> Result<RwLockReadGuard<'_, Floor>, ParkingError> {
        self.floor(number)?
            .read()
            .map_err(|_| ParkingError::LockPoisoned("floor read"))
    }

    fn write_floor(&self, number: u32) -> Result<RwLockWriteGuard<'_, Floor>, ParkingError> {
        self.floor(number)?
            .write()
            .map_err(|_| ParkingError::LockPoisoned("floor write"))
    }

    fn spot(&self, floor: u32, spot_id: &str) -> Result<Arc<Spot>, ParkingError> {
        self.read_floor(floor)?
            .spot(spot_id)
            .ok_or_else(|| ParkingError::UnknownSpot(spot_id.to_string()))
    }

    fn read_gates(&self) -> Result<RwLockReadGuard<'_, Vec<Arc<Gate>>>, ParkingError> {
        self.gates
            .read()
            .map_err(|_| ParkingError::LockPoisoned("gates read"))
    }

    fn find_gate(&self, gate_id: &str) -> Result<Option<Arc<Gate>>, ParkingError> {
        Ok(self
            .read_gates()?
            .iter()
            .find(|gate| gate.id() == gate_id)
            .cloned())
    }

    fn gate_by_id(&self, gate_id: &str) -> Result<Arc<Gate>, ParkingError> {
        self.find_gate(gate_id)?
            .ok_or_else(|| ParkingError::UnknownGate(gate_id.to_string()))
    }

    fn entry_gate(&self, gate_id: &str) -> Result<Arc<Gate>, ParkingError> {
        let gate = self.gate_by_id(gate_id)?;
        if !gate.can_admit() {
            return Err(ParkingError::GateCannotAdmit(gate_id.to_string()));
        }
        Ok(gate)
    }

    fn exit_gate(&self, gate_id: &str) -> Result<Arc<Gate>, ParkingError> {
        let gate = self.gate_by_id(gate_id)?;
        if !gate.can_release() {
            return Err(ParkingError::GateCannotRelease(gate_id.to_string()));
        }
        Ok(gate)
    }
}

/// Claims the first candidate still available, moving past any a rival gate
/// took after the search. Returns the claimed spot and how many claims were
/// lost on the way.
fn claim_first_available(
    candidates: Vec<Arc<Spot>>,
    vehicle: &Vehicle,
    at: DateTime<Utc>,
) -> (Option<Arc<Spot>>, usize) {
    let mut lost = 0;
    for spot in candidates {
        if spot.claim(vehicle, at) {
            return (Some(spot), lost);
        }
        debug!(plate = vehicle.plate(), spot_id = spot.id(), "lost spot claim, trying next candidate");
        lost += 1;
    }
    (None, lost)
}

/// Puts the vehicle back into the spot it was released from after the
/// ledger refused to close its ticket. If the spot was taken in the
/// meantime the ticket and the spot disagree, and the caller gets an
/// internal error naming both failures.
fn restore_after_failed_exit(
    spot: &Spot,
    vehicle: &Vehicle,
    ticket: &Ticket,
    cause: ParkingError,
) -> ParkingError {
    if spot.claim(vehicle, ticket.entry_time()) {
        return cause;
    }
    warn!(plate = vehicle.plate(), ticket_id = ticket.id(), spot_id = spot.id(), error = %cause, "could not restore spot after failed exit");
    ParkingError::ExitRollbackFailed {
        ticket_id: ticket.id().to_string(),
        spot_id: spot.id().to_string(),
        cause: Box::new(cause),
    }
}

fn validate_id(what: &'static str, value: &str) -> Result<(), ParkingError> {
    if value.trim().is_empty() {
        return Err(ParkingError::MalformedId(what));
    }
    Ok(())
}
