use std::collections::{BTreeSet, HashMap};

use super::VehicleCategory;
use crate::error::ParkingError;
use crate::spot::SpotCategory;

/// Which spot categories each vehicle category may occupy.
///
/// Built once at start-up and handed to the facility. `register` replaces
/// the rule for a category (last write wins) and is meant for set-up only.
#[derive(Debug, Clone)]
pub struct CompatibilityRegistry {
    rules: HashMap<VehicleCategory, BTreeSet<SpotCategory>>,
}

impl CompatibilityRegistry {
    /// A registry with no rules at all. Every lookup fails until categories
    /// are registered.
    pub fn empty() -> Self {
        CompatibilityRegistry {
            rules: HashMap::new(),
        }
    }

    pub fn register(
        &mut self,
        vehicle: VehicleCategory,
        spots: impl IntoIterator<Item = SpotCategory>,
    ) -> &mut Self {
        self.rules.insert(vehicle, spots.into_iter().collect());
        self
    }

    pub fn compatible_spots(
        &self,
        vehicle: VehicleCategory,
    ) -> Result<&BTreeSet<SpotCategory>, ParkingError> {
        self.rules
            .get(&vehicle)
            .ok_or(ParkingError::UnregisteredVehicleCategory(vehicle))
    }

    pub fn allows(&self, vehicle: VehicleCategory, spot: SpotCategory) -> bool {
        self.rules
            .get(&vehicle)
            .is_some_and(|spots| spots.contains(&spot))
    }

    /// Spot categories to search, best first.
    ///
    /// The fixed priority table comes first; anything else the registry
    /// allows is appended in declaration order. Categories the registry does
    /// not allow are dropped.
    pub fn preference_order(
        &self,
        vehicle: VehicleCategory,
    ) -> Result<Vec<SpotCategory>, ParkingError> {
        let allowed = self.compatible_spots(vehicle)?;
        let mut order: Vec<SpotCategory> = preferred_spot_categories(vehicle)
            .iter()
            .copied()
            .filter(|category| allowed.contains(category))
            .collect();
        for category in SpotCategory::ALL {
            if allowed.contains(&category) && !order.contains(&category) {
                order.push(category);
            }
        }
        Ok(order)
    }

    /// Fails on the first vehicle category without a rule.
    pub fn ensure_complete(&self) -> Result<(), ParkingError> {
        for vehicle in VehicleCategory::ALL {
            self.compatible_spots(vehicle)?;
        }
        Ok(())
    }
}

impl Default for CompatibilityRegistry {
    fn default() -> Self {
        let mut registry = CompatibilityRegistry::empty();
        registry
            .register(VehicleCategory::Motorcycle, SpotCategory::ALL)
            .register(
                VehicleCategory::Car,
                [
                    SpotCategory::Regular,
                    SpotCategory::Large,
                    SpotCategory::Handicapped,
                    SpotCategory::Electric,
                ],
            )
            .register(
                VehicleCategory::Van,
                [SpotCategory::Large, SpotCategory::Regular],
            )
            .register(VehicleCategory::Truck, [SpotCategory::Large]);
        registry
    }
}

fn preferred_spot_categories(vehicle: VehicleCategory) -> &'static [SpotCategory] {
    match vehicle {
        VehicleCategory::Motorcycle => &[
            SpotCategory::Compact,
            SpotCategory::Regular,
            SpotCategory::Electric,
            SpotCategory::Handicapped,
            SpotCategory::Large,
        ],
        VehicleCategory::Car => &[
            SpotCategory::Regular,
            SpotCategory::Electric,
            SpotCategory::Handicapped,
            SpotCategory::Large,
        ],
        VehicleCategory::Van => &[SpotCategory::Large, SpotCategory::Regular],
        VehicleCategory::Truck => &[SpotCategory::Large],
    }
}
