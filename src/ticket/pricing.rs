use chrono::Duration;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::spot::SpotCategory;
use crate::vehicle::VehicleCategory;

const MILLIS_PER_HOUR: i64 = 60 * 60 * 1000;

/// Rates used for every fee the facility computes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PricingPolicy {
    #[serde(default = "default_hourly_base_rate")]
    pub hourly_base_rate: Decimal,
    #[serde(default = "default_ev_hourly_rate")]
    pub ev_hourly_rate: Decimal,
}

fn default_hourly_base_rate() -> Decimal {
    Decimal::new(500, 2)
}

fn default_ev_hourly_rate() -> Decimal {
    Decimal::new(200, 2)
}

impl Default for PricingPolicy {
    fn default() -> Self {
        PricingPolicy {
            hourly_base_rate: default_hourly_base_rate(),
            ev_hourly_rate: default_ev_hourly_rate(),
        }
    }
}

/// How a fee was put together.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub hours: i64,
    pub parking: Decimal,
    pub ev_charging: Decimal,
    pub total: Decimal,
}

impl PricingPolicy {
    pub fn new(hourly_base_rate: Decimal, ev_hourly_rate: Decimal) -> Self {
        PricingPolicy {
            hourly_base_rate,
            ev_hourly_rate,
        }
    }

    /// Whole hours to bill: any started hour counts, and every stay bills at
    /// least one hour, including zero-length and clock-skewed ones.
    pub fn billable_hours(duration: Duration) -> i64 {
        let millis = duration.num_milliseconds();
        if millis <= 0 {
            return 1;
        }
        let hours = millis / MILLIS_PER_HOUR;
        let hours = if millis % MILLIS_PER_HOUR == 0 {
            hours
        } else {
            hours + 1
        };
        hours.max(1)
    }

    pub fn fee(
        &self,
        vehicle: VehicleCategory,
        spot: SpotCategory,
        duration: Duration,
    ) -> FeeBreakdown {
        let hours = Self::billable_hours(duration);
        let billed = Decimal::from(hours);

        let parking = round_cents(
            self.hourly_base_rate * billed * vehicle.size_multiplier() * spot.price_multiplier(),
        );
        let ev_charging = if spot.has_ev_charging() {
            round_cents(billed * self.ev_hourly_rate)
        } else {
            Decimal::ZERO
        };

        FeeBreakdown {
            hours,
            parking,
            ev_charging,
            total: parking + ev_charging,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.hourly_base_rate.is_sign_negative() {
            return Err(format!(
                "hourly_base_rate must not be negative, got {}",
                self.hourly_base_rate
            ));
        }
        if self.ev_hourly_rate.is_sign_negative() {
            return Err(format!(
                "ev_hourly_rate must not be negative, got {}",
                self.ev_hourly_rate
            ));
        }
        Ok(())
    }
}

fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
