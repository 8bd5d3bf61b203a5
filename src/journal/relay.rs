use super::publisher::EventPublisher;
use super::record::JournalStatus;
use super::{EventJournal, JournalError};

/// Outcome of one [`JournalRelay::drain`] pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainResult {
    pub attempted: usize,
    pub published: usize,
    pub retried: usize,
    pub failed: usize,
}

/// Moves pending journal records to a publisher.
///
/// Records stay pending until the publisher accepts them, so a record can
/// be delivered more than once if a drain is interrupted. Accepted records
/// are dropped from the journal.
pub struct JournalRelay<P> {
    publisher: P,
    batch_size: usize,
    max_attempts: u32,
}

impl<P> JournalRelay<P> {
    pub fn new(publisher: P) -> Self {
        Self {
            publisher,
            batch_size: 10,
            max_attempts: 3,
        }
    }

    /// Max records to publish per drain.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Attempts before a record is marked failed.
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max.max(1);
        self
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn publisher_mut(&mut self) -> &mut P {
        &mut self.publisher
    }
}

impl<P: EventPublisher> JournalRelay<P> {
    /// Publish up to `batch_size` pending records, oldest first.
    ///
    /// The journal lock is not held while the publisher runs.
    pub fn drain(&mut self, journal: &EventJournal) -> Result<DrainResult, JournalError> {
        let batch = journal.claim_batch(self.batch_size)?;
        let mut result = DrainResult::default();

        for record in batch {
            result.attempted += 1;
            match self.publisher.publish(&record) {
                Ok(()) => {
                    journal.mark_published(record.id)?;
                    result.published += 1;
                }
                Err(err) => {
                    let error = err.to_string();
                    tracing::warn!(record = record.id, event_type = %record.event_type, %error, "journal publish failed");
                    match journal.mark_attempt_failed(record.id, error, self.max_attempts)? {
                        Some(JournalStatus::Failed) => result.failed += 1,
                        _ => result.retried += 1,
                    }
                }
            }
        }

        Ok(result)
    }
}
