use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::floor::FloorStatus;
use crate::gate::GateSnapshot;
use crate::ledger::RevenueStats;
use crate::vehicle::VehicleCategory;

/// Point-in-time summary of a facility.
///
/// Each floor is read under its own lock, so under concurrent traffic the
/// totals are only eventually consistent with one another.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FacilityStatus {
    pub id: String,
    pub name: String,
    pub address: String,
    pub total_floors: u32,
    pub total_capacity: usize,
    pub occupied_spots: usize,
    pub available_spots: usize,
    pub occupancy_rate: f64,
    pub floors: Vec<FloorStatus>,
    pub gates: Vec<GateSnapshot>,
    pub active_tickets: usize,
    pub completed_tickets: usize,
    pub vehicle_type_stats: BTreeMap<VehicleCategory, usize>,
    pub revenue: RevenueStats,
}
