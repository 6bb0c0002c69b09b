use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use portcullis_core::{
    Error, EventType, SecurityEvent, SubjectKey,
    error::StorageError,
    repositories::AuditRepository,
};

/// Default number of events retained before the oldest are evicted.
pub const DEFAULT_AUDIT_CAPACITY: usize = 1000;

/// Bounded in-memory event log with ring-buffer semantics.
///
/// Events append in arrival order; when the buffer is full the oldest event
/// is evicted. Eviction is driven purely by capacity, never by age.
pub struct MemoryAuditRepository {
    capacity: usize,
    events: Mutex<VecDeque<SecurityEvent>>,
}

impl MemoryAuditRepository {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn buffer(&self) -> Result<std::sync::MutexGuard<'_, VecDeque<SecurityEvent>>, Error> {
        self.events
            .lock()
            .map_err(|_| StorageError::Corrupt("audit buffer poisoned".to_string()).into())
    }
}

impl Default for MemoryAuditRepository {
    fn default() -> Self {
        Self::new(DEFAULT_AUDIT_CAPACITY)
    }
}

#[async_trait]
impl AuditRepository for MemoryAuditRepository {
    async fn append(&self, event: SecurityEvent) -> Result<(), Error> {
        let mut events = self.buffer()?;
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event);
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<SecurityEvent>, Error> {
        let events = self.buffer()?;
        Ok(events.iter().rev().take(limit).cloned().collect())
    }

    async fn events_since(&self, since: DateTime<Utc>) -> Result<Vec<SecurityEvent>, Error> {
        let events = self.buffer()?;
        Ok(events
            .iter()
            .filter(|e| e.timestamp >= since)
            .cloned()
            .collect())
    }

    async fn by_type(
        &self,
        event_type: &EventType,
        limit: usize,
    ) -> Result<Vec<SecurityEvent>, Error> {
        let events = self.buffer()?;
        Ok(events
            .iter()
            .rev()
            .filter(|e| &e.event_type == event_type)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn failed_attempts(
        &self,
        subject: Option<&SubjectKey>,
        event_type: Option<&EventType>,
    ) -> Result<Vec<SecurityEvent>, Error> {
        let events = self.buffer()?;
        Ok(events
            .iter()
            .filter(|e| !e.success)
            .filter(|e| subject.is_none_or(|s| e.subject.as_ref() == Some(s)))
            .filter(|e| event_type.is_none_or(|t| &e.event_type == t))
            .cloned()
            .collect())
    }
}
