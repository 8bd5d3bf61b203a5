use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Revenue over completed sessions.
///
/// `total_revenue` only counts paid tickets; completed but unpaid totals are
/// reported separately as `outstanding`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueStats {
    pub total_revenue: Decimal,
    pub ev_charging_revenue: Decimal,
    pub parking_revenue: Decimal,
    pub outstanding: Decimal,
}
