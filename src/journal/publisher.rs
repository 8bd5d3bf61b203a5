use std::convert::Infallible;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{FacilityEvent, JournalRecord};

/// Delivers journal records somewhere outside the facility.
///
/// An error leaves the record pending; the relay retries it on a later
/// drain until it runs out of attempts.
pub trait EventPublisher {
    type Error: fmt::Display;

    fn publish(&mut self, record: &JournalRecord) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The payload does not decode to a [`FacilityEvent`].
    Undecodable { record: u64, reason: String },
    /// A listener panicked while handling the record.
    ListenerPanicked { record: u64, event_type: String },
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::Undecodable { record, reason } => {
                write!(f, "journal record {} is not a facility event: {}", record, reason)
            }
            PublishError::ListenerPanicked { record, event_type } => write!(
                f,
                "listener for {} panicked on journal record {}",
                event_type, record
            ),
        }
    }
}

impl std::error::Error for PublishError {}

/// Logs each record as a structured `tracing` event under the
/// `parking_facility::events` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPublisher;

impl EventPublisher for TracingPublisher {
    type Error = Infallible;

    fn publish(&mut self, record: &JournalRecord) -> Result<(), Self::Error> {
        tracing::info!(
            target: "parking_facility::events",
            journal_id = record.id,
            event_type = %record.event_type,
            occurred_at = %record.occurred_at,
            payload = %record.payload,
            "facility event"
        );
        Ok(())
    }
}

/// Decoded facility events collected for in-process readers such as an
/// occupancy display. Clones share the same feed.
#[derive(Debug, Default, Clone)]
pub struct EventFeed {
    events: Arc<Mutex<Vec<FacilityEvent>>>,
}

impl EventFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far, in publication order.
    pub fn snapshot(&self) -> Vec<FacilityEvent> {
        self.events().clone()
    }

    /// Removes and returns the events received so far.
    pub fn take(&self) -> Vec<FacilityEvent> {
        std::mem::take(&mut *self.events())
    }

    pub fn len(&self) -> usize {
        self.events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events().is_empty()
    }

    fn events(&self) -> MutexGuard<'_, Vec<FacilityEvent>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EventPublisher for EventFeed {
    type Error = PublishError;

    fn publish(&mut self, record: &JournalRecord) -> Result<(), Self::Error> {
        let event = record.decode().map_err(|err| PublishError::Undecodable {
            record: record.id,
            reason: err.to_string(),
        })?;
        self.events().push(event);
        Ok(())
    }
}

/// Hands each record to in-process listeners registered per event type.
///
/// Listeners run on the emitter's threads; `publish` waits for them, so a
/// record counts as published only once every listener has seen it.
#[cfg(feature = "emitter")]
pub struct EmitterPublisher {
    emitter: event_emitter_rs::EventEmitter,
}

#[cfg(feature = "emitter")]
impl EmitterPublisher {
    pub fn new(emitter: event_emitter_rs::EventEmitter) -> Self {
        EmitterPublisher { emitter }
    }

    /// Calls `listener` with the decoded event for every record of
    /// `event_type`. Returns the listener id.
    pub fn on_event<F>(&mut self, event_type: &str, listener: F) -> String
    where
        F: Fn(FacilityEvent) + Send + Sync + 'static,
    {
        self.emitter.on(event_type, move |payload: String| {
            match serde_json::from_str::<FacilityEvent>(&payload) {
                Ok(event) => listener(event),
                Err(err) => tracing::warn!(error = %err, "dropping undecodable facility event"),
            }
        })
    }

    pub fn remove_listener(&mut self, listener_id: &str) -> bool {
        self.emitter.remove_listener(listener_id).is_some()
    }
}

#[cfg(feature = "emitter")]
impl EventPublisher for EmitterPublisher {
    type Error = PublishError;

    fn publish(&mut self, record: &JournalRecord) -> Result<(), Self::Error> {
        let handles = self
            .emitter
            .emit(&record.event_type, record.payload.clone());
        let mut panicked = false;
        for handle in handles {
            panicked |= handle.join().is_err();
        }
        if panicked {
            return Err(PublishError::ListenerPanicked {
                record: record.id,
                event_type: record.event_type.clone(),
            });
        }
        Ok(())
    }
}
