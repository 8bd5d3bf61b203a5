mod compatibility;

pub use compatibility::CompatibilityRegistry;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VehicleCategory {
    Motorcycle,
    Car,
    Van,
    Truck,
}

impl VehicleCategory {
    pub const ALL: [VehicleCategory; 4] = [
        VehicleCategory::Motorcycle,
        VehicleCategory::Car,
        VehicleCategory::Van,
        VehicleCategory::Truck,
    ];

    /// Multiplier applied to the hourly base rate.
    pub fn size_multiplier(self) -> Decimal {
        match self {
            VehicleCategory::Motorcycle => Decimal::new(5, 1),
            VehicleCategory::Car => Decimal::ONE,
            VehicleCategory::Van => Decimal::new(15, 1),
            VehicleCategory::Truck => Decimal::TWO,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            VehicleCategory::Motorcycle => "Motorcycle",
            VehicleCategory::Car => "Car",
            VehicleCategory::Van => "Van",
            VehicleCategory::Truck => "Truck",
        }
    }
}

/// A vehicle presented at a gate.
///
/// Identity is the license plate. Two `Vehicle` values with the same plate
/// are the same vehicle regardless of color or owner, so there is no
/// structural `PartialEq`; compare with [`Vehicle::same_vehicle`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Vehicle {
    plate: String,
    category: VehicleCategory,
    color: String,
    owner: String,
}

impl Vehicle {
    pub fn new(
        plate: impl Into<String>,
        category: VehicleCategory,
        color: impl Into<String>,
        owner: impl Into<String>,
    ) -> Self {
        Vehicle {
            plate: plate.into(),
            category,
            color: color.into(),
            owner: owner.into(),
        }
    }

    pub fn plate(&self) -> &str {
        &self.plate
    }

    pub fn category(&self) -> VehicleCategory {
        self.category
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn same_vehicle(&self, other: &Vehicle) -> bool {
        self.plate == other.plate
    }
}
