use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::FacilityEvent;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum JournalStatus {
    Pending,
    Failed,
}

/// A journaled [`FacilityEvent`] that has not been published yet.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct JournalRecord {
    pub id: u64,
    pub event_type: String,
    /// The event as tagged JSON.
    pub payload: String,
    pub occurred_at: DateTime<Utc>,
    pub status: JournalStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl JournalRecord {
    pub fn is_pending(&self) -> bool {
        self.status == JournalStatus::Pending
    }

    pub fn decode(&self) -> Result<FacilityEvent, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }

    /// Records a failed attempt; gives up once `max_attempts` is reached.
    pub(crate) fn retry_or_fail(&mut self, error: String, max_attempts: u32) -> JournalStatus {
        self.attempts += 1;
        self.last_error = Some(error);
        if self.attempts >= max_attempts {
            self.status = JournalStatus::Failed;
        }
        self.status
    }
}
