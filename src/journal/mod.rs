//! Facility events queued for at-least-once publication.
//!
//! The facility appends a [`FacilityEvent`] after each committed park, exit
//! or payment. A [`JournalRelay`] drains pending records to an
//! [`EventPublisher`] later, outside the traffic path, and the journal drops
//! each record once it is published.

mod event;
mod publisher;
mod record;
mod relay;

pub use event::FacilityEvent;
#[cfg(feature = "emitter")]
pub use publisher::EmitterPublisher;
pub use publisher::{EventFeed, EventPublisher, PublishError, TracingPublisher};
pub use record::{JournalRecord, JournalStatus};
pub use relay::{DrainResult, JournalRelay};

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalError {
    Poisoned,
    Serialize(String),
}

impl fmt::Display for JournalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JournalError::Poisoned => write!(f, "journal lock poisoned"),
            JournalError::Serialize(msg) => write!(f, "event serialization failed: {}", msg),
        }
    }
}

impl std::error::Error for JournalError {}

#[derive(Default)]
struct JournalState {
    // append order, oldest first
    pending: VecDeque<JournalRecord>,
    failed: Vec<JournalRecord>,
    published: u64,
}

/// Facility events awaiting publication.
///
/// Only unpublished records are retained: a record leaves the journal as
/// soon as a publisher accepts it, and records that ran out of attempts sit
/// in a separate failed list until an operator takes or requeues them.
pub struct EventJournal {
    state: Mutex<JournalState>,
    next_id: AtomicU64,
}

impl Default for EventJournal {
    fn default() -> Self {
        Self::new()
    }
}

impl EventJournal {
    pub fn new() -> Self {
        EventJournal {
            state: Mutex::new(JournalState::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Append an event as a pending record and return its id.
    pub fn append(&self, event: &FacilityEvent) -> Result<u64, JournalError> {
        let payload =
            serde_json::to_string(event).map_err(|e| JournalError::Serialize(e.to_string()))?;
        let mut state = self.lock()?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        state.pending.push_back(JournalRecord {
            id,
            event_type: event.event_type().to_string(),
            payload,
            occurred_at: event.at(),
            status: JournalStatus::Pending,
            attempts: 0,
            last_error: None,
        });
        Ok(id)
    }

    /// Every retained record, pending or failed, in append order.
    pub fn records(&self) -> Result<Vec<JournalRecord>, JournalError> {
        let state = self.lock()?;
        let mut records: Vec<JournalRecord> = state
            .pending
            .iter()
            .chain(state.failed.iter())
            .cloned()
            .collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    pub fn pending(&self) -> Result<Vec<JournalRecord>, JournalError> {
        Ok(self.lock()?.pending.iter().cloned().collect())
    }

    pub fn failed(&self) -> Result<Vec<JournalRecord>, JournalError> {
        Ok(self.lock()?.failed.clone())
    }

    /// Decode every retained record back into events, in append order.
    pub fn events(&self) -> Result<Vec<FacilityEvent>, JournalError> {
        self.records()?
            .iter()
            .map(|r| r.decode().map_err(|e| JournalError::Serialize(e.to_string())))
            .collect()
    }

    /// Number of records published and dropped since the journal was created.
    pub fn published_count(&self) -> Result<u64, JournalError> {
        Ok(self.lock()?.published)
    }

    /// Retained records, pending and failed.
    pub fn len(&self) -> Result<usize, JournalError> {
        let state = self.lock()?;
        Ok(state.pending.len() + state.failed.len())
    }

    pub fn is_empty(&self) -> Result<bool, JournalError> {
        Ok(self.len()? == 0)
    }

    /// Remove and return the failed records.
    pub fn take_failed(&self) -> Result<Vec<JournalRecord>, JournalError> {
        Ok(std::mem::take(&mut self.lock()?.failed))
    }

    /// Give failed records a fresh set of attempts. They go back in front of
    /// the queue, oldest first. Returns how many were requeued.
    pub fn requeue_failed(&self) -> Result<usize, JournalError> {
        let mut state = self.lock()?;
        let mut failed = std::mem::take(&mut state.failed);
        let count = failed.len();
        failed.sort_by_key(|r| r.id);
        for mut record in failed.into_iter().rev() {
            record.status = JournalStatus::Pending;
            record.attempts = 0;
            state.pending.push_front(record);
        }
        Ok(count)
    }

    /// Oldest pending records, at most `limit`.
    pub(crate) fn claim_batch(&self, limit: usize) -> Result<Vec<JournalRecord>, JournalError> {
        Ok(self.lock()?.pending.iter().take(limit).cloned().collect())
    }

    pub(crate) fn mark_published(&self, id: u64) -> Result<(), JournalError> {
        let mut state = self.lock()?;
        if let Some(index) = state.position(id) {
            state.pending.remove(index);
            state.published += 1;
        }
        Ok(())
    }

    pub(crate) fn mark_attempt_failed(
        &self,
        id: u64,
        error: String,
        max_attempts: u32,
    ) -> Result<Option<JournalStatus>, JournalError> {
        let mut state = self.lock()?;
        let Some(index) = state.position(id) else {
            return Ok(None);
        };
        let status = state.pending[index].retry_or_fail(error, max_attempts);
        if status == JournalStatus::Failed {
            if let Some(record) = state.pending.remove(index) {
                state.failed.push(record);
            }
        }
        Ok(Some(status))
    }

    fn lock(&self) -> Result<MutexGuard<'_, JournalState>, JournalError> {
        self.state.lock().map_err(|_| JournalError::Poisoned)
    }
}

impl JournalState {
    // Batches are claimed from the front, so the record is almost always
    // the first one.
    fn position(&self, id: u64) -> Option<usize> {
        match self.pending.front() {
            Some(first) if first.id == id => Some(0),
            _ => self.pending.iter().position(|r| r.id == id),
        }
    }
}
