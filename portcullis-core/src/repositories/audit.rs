//! Repository trait for the security audit log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error,
    attempt::SubjectKey,
    event::{EventType, SecurityEvent},
};

/// Append-only, bounded storage for security events.
///
/// The store keeps a fixed number of recent events and evicts oldest-first
/// when it overflows; eviction is driven by capacity, never by time. Appends
/// may be best-effort under contention: the audit log is diagnostic and is
/// never authoritative for blocking decisions.
#[async_trait]
pub trait AuditRepository: Send + Sync + 'static {
    /// Append an event, evicting the oldest if the store is at capacity.
    async fn append(&self, event: SecurityEvent) -> Result<(), Error>;

    /// The most recent events, newest first, at most `limit`.
    async fn recent(&self, limit: usize) -> Result<Vec<SecurityEvent>, Error>;

    /// All retained events at or after `since`, in chronological order.
    async fn events_since(&self, since: DateTime<Utc>) -> Result<Vec<SecurityEvent>, Error>;

    /// The most recent events of one type, newest first, at most `limit`.
    async fn by_type(
        &self,
        event_type: &EventType,
        limit: usize,
    ) -> Result<Vec<SecurityEvent>, Error>;

    /// Retained failure events, optionally narrowed to a subject and/or an
    /// event type, in chronological order.
    async fn failed_attempts(
        &self,
        subject: Option<&SubjectKey>,
        event_type: Option<&EventType>,
    ) -> Result<Vec<SecurityEvent>, Error>;
}
