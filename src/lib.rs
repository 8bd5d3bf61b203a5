mod clock;
mod config;
mod error;
mod facility;
mod floor;
mod gate;
mod journal;
mod ledger;
mod lock;
mod spot;
mod ticket;
mod vehicle;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{FacilityConfig, GateConfig, SpotConfig};
pub use error::{ErrorKind, ParkingError};
pub use facility::{FacilityStatus, ParkingFacility, DEFAULT_MAX_CLAIM_ATTEMPTS};
pub use floor::{Floor, FloorStatus};
pub use gate::{Gate, GateDirection, GateSnapshot};
pub use journal::{
    DrainResult, EventFeed, EventJournal, EventPublisher, FacilityEvent, JournalError,
    JournalRecord, JournalRelay, JournalStatus, PublishError, TracingPublisher,
};
pub use ledger::{RevenueStats, TicketLedger};
pub use spot::{Spot, SpotCategory, SpotSnapshot, SpotStatus};
pub use ticket::{FeeBreakdown, PricingPolicy, Ticket};
pub use vehicle::{CompatibilityRegistry, Vehicle, VehicleCategory};

#[cfg(feature = "emitter")]
pub use journal::EmitterPublisher;

// Re-export the EventEmitter so listeners can be wired without a direct dependency
#[cfg(feature = "emitter")]
pub use event_emitter_rs::EventEmitter;
