use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateDirection {
    EntryOnly,
    ExitOnly,
    Both,
}

impl GateDirection {
    pub fn display_name(self) -> &'static str {
        match self {
            GateDirection::EntryOnly => "Entry Gate",
            GateDirection::ExitOnly => "Exit Gate",
            GateDirection::Both => "Entry/Exit Gate",
        }
    }

    fn admits(self) -> bool {
        matches!(self, GateDirection::EntryOnly | GateDirection::Both)
    }

    fn releases(self) -> bool {
        matches!(self, GateDirection::ExitOnly | GateDirection::Both)
    }
}

/// Entry/exit checkpoint.
///
/// Counters are per gate and updated with plain atomics; there is no
/// ordering between gates.
#[derive(Debug)]
pub struct Gate {
    id: String,
    direction: GateDirection,
    operational: AtomicBool,
    passages: AtomicU64,
    last_used: Mutex<Option<DateTime<Utc>>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateSnapshot {
    pub gate_id: String,
    pub direction: GateDirection,
    pub operational: bool,
    pub passages: u64,
    pub last_used: Option<DateTime<Utc>>,
}

impl Gate {
    pub fn new(id: impl Into<String>, direction: GateDirection) -> Self {
        Gate {
            id: id.into(),
            direction,
            operational: AtomicBool::new(true),
            passages: AtomicU64::new(0),
            last_used: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn direction(&self) -> GateDirection {
        self.direction
    }

    pub fn is_operational(&self) -> bool {
        self.operational.load(Ordering::Acquire)
    }

    pub fn can_admit(&self) -> bool {
        self.is_operational() && self.direction.admits()
    }

    pub fn can_release(&self) -> bool {
        self.is_operational() && self.direction.releases()
    }

    /// Counts a vehicle through the gate. A gate that is down does not
    /// register traffic, so this is silently ignored then.
    pub fn record_passage(&self, at: DateTime<Utc>) {
        if !self.is_operational() {
            return;
        }
        self.passages.fetch_add(1, Ordering::AcqRel);
        let mut last_used = self.last_used.lock().unwrap_or_else(PoisonError::into_inner);
        if last_used.map_or(true, |previous| previous < at) {
            *last_used = Some(at);
        }
    }

    pub fn set_operational(&self, operational: bool) {
        self.operational.store(operational, Ordering::Release);
    }

    /// Zeroes the passage counter, typically at the start of a reporting period.
    pub fn reset_counter(&self) {
        self.passages.store(0, Ordering::Release);
    }

    pub fn passages(&self) -> u64 {
        self.passages.load(Ordering::Acquire)
    }

    pub fn last_used(&self) -> Option<DateTime<Utc>> {
        *self.last_used.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> GateSnapshot {
        GateSnapshot {
            gate_id: self.id.clone(),
            direction: self.direction,
            operational: self.is_operational(),
            passages: self.passages(),
            last_used: self.last_used(),
        }
    }
}
