use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ParkingError;
use crate::spot::{Spot, SpotCategory, SpotStatus};
use crate::vehicle::{CompatibilityRegistry, Vehicle};

/// One level of the facility and the spots on it.
///
/// Spots are indexed twice: by id for lookups and by category, in insertion
/// order, for the first-fit search. Both indexes change together.
#[derive(Debug)]
pub struct Floor {
    number: u32,
    spots: HashMap<String, Arc<Spot>>,
    by_category: HashMap<SpotCategory, Vec<Arc<Spot>>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FloorStatus {
    pub floor: u32,
    pub capacity: usize,
    pub occupied: usize,
    pub available: usize,
    pub occupancy_rate: f64,
}

impl Floor {
    pub fn new(number: u32) -> Self {
        Floor {
            number,
            spots: HashMap::new(),
            by_category: SpotCategory::ALL
                .iter()
                .map(|category| (*category, Vec::new()))
                .collect(),
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn add_spot(&mut self, spot: Spot) -> Result<Arc<Spot>, ParkingError> {
        if spot.floor() != self.number {
            return Err(ParkingError::FloorMismatch {
                spot_id: spot.id().to_string(),
                spot_floor: spot.floor(),
                floor: self.number,
            });
        }
        if self.spots.contains_key(spot.id()) {
            return Err(ParkingError::DuplicateSpot(spot.id().to_string()));
        }

        let spot = Arc::new(spot);
        self.spots.insert(spot.id().to_string(), Arc::clone(&spot));
        self.by_category
            .entry(spot.category())
            .or_default()
            .push(Arc::clone(&spot));
        Ok(spot)
    }

    /// Removes a spot that is not currently holding a vehicle.
    pub fn remove_spot(&mut self, spot_id: &str) -> Result<Arc<Spot>, ParkingError> {
        let spot = self
            .spots
            .get(spot_id)
            .ok_or_else(|| ParkingError::UnknownSpot(spot_id.to_string()))?;
        let status = spot.status();
        if status == SpotStatus::Occupied {
            return Err(ParkingError::SpotStateConflict {
                spot_id: spot_id.to_string(),
                status,
            });
        }

        let spot = self
            .spots
            .remove(spot_id)
            .ok_or_else(|| ParkingError::UnknownSpot(spot_id.to_string()))?;
        if let Some(bucket) = self.by_category.get_mut(&spot.category()) {
            bucket.retain(|candidate| candidate.id() != spot_id);
        }
        Ok(spot)
    }

    /// First available spot the vehicle may use, searching categories in
    /// preference order and each category in insertion order.
    ///
    /// The result is only a candidate; the caller still has to win
    /// [`Spot::claim`].
    pub fn find_available_spot(
        &self,
        vehicle: &Vehicle,
        registry: &CompatibilityRegistry,
    ) -> Result<Option<Arc<Spot>>, ParkingError> {
        let order = registry.preference_order(vehicle.category())?;
        let found = self
            .in_preference_order(&order)
            .find(|spot| spot.is_available())
            .cloned();
        Ok(found)
    }

    /// Every spot available right now that the vehicle may use, in the same
    /// order [`Floor::find_available_spot`] would pick them.
    pub fn available_candidates(
        &self,
        vehicle: &Vehicle,
        registry: &CompatibilityRegistry,
    ) -> Result<Vec<Arc<Spot>>, ParkingError> {
        let order = registry.preference_order(vehicle.category())?;
        let candidates = self
            .in_preference_order(&order)
            .filter(|spot| spot.is_available())
            .cloned()
            .collect();
        Ok(candidates)
    }

    fn in_preference_order<'a>(
        &'a self,
        order: &'a [SpotCategory],
    ) -> impl Iterator<Item = &'a Arc<Spot>> + 'a {
        order
            .iter()
            .filter_map(|category| self.by_category.get(category))
            .flatten()
    }

    pub fn spot(&self, spot_id: &str) -> Option<Arc<Spot>> {
        self.spots.get(spot_id).cloned()
    }

    pub fn contains(&self, spot_id: &str) -> bool {
        self.spots.contains_key(spot_id)
    }

    /// All spots, grouped by category in declaration order.
    pub fn spots(&self) -> Vec<Arc<Spot>> {
        SpotCategory::ALL
            .iter()
            .filter_map(|category| self.by_category.get(category))
            .flatten()
            .cloned()
            .collect()
    }

    pub fn spot_of_vehicle(&self, plate: &str) -> Option<Arc<Spot>> {
        self.spots.values().find(|spot| spot.holds(plate)).cloned()
    }

    pub fn occupied_spots(&self) -> Vec<Arc<Spot>> {
        self.spots()
            .into_iter()
            .filter(|spot| spot.status() == SpotStatus::Occupied)
            .collect()
    }

    pub fn capacity(&self) -> usize {
        self.spots.len()
    }

    pub fn available_count(&self) -> usize {
        self.spots.values().filter(|spot| spot.is_available()).count()
    }

    pub fn occupied_count(&self) -> usize {
        self.spots
            .values()
            .filter(|spot| spot.status() == SpotStatus::Occupied)
            .count()
    }

    pub fn occupancy_rate(&self) -> f64 {
        if self.spots.is_empty() {
            return 0.0;
        }
        self.occupied_count() as f64 / self.spots.len() as f64
    }

    pub fn available_by_category(&self) -> BTreeMap<SpotCategory, usize> {
        SpotCategory::ALL
            .iter()
            .map(|category| {
                let count = self
                    .by_category
                    .get(category)
                    .map(|bucket| bucket.iter().filter(|spot| spot.is_available()).count())
                    .unwrap_or(0);
                (*category, count)
            })
            .collect()
    }

    pub fn status(&self) -> FloorStatus {
        let capacity = self.capacity();
        let occupied = self.occupied_count();
        FloorStatus {
            floor: self.number,
            capacity,
            occupied,
            available: self.available_count(),
            occupancy_rate: if capacity == 0 {
                0.0
            } else {
                occupied as f64 / capacity as f64
            },
        }
    }
}
