//! Best-effort security audit logging.
//!
//! Audit logging must never block or fail the action it is auditing: append
//! errors are swallowed, counted, and reported through tracing only. Reads
//! return errors normally since nothing user-facing depends on them.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

use crate::{
    Error,
    attempt::SubjectKey,
    event::{EventType, SecurityEvent},
    repositories::AuditRepository,
};

/// Service wrapping the audit repository with fire-and-forget append
/// semantics and read-only queries.
pub struct AuditService<A: AuditRepository> {
    repository: Arc<A>,
    dropped_events: AtomicU64,
}

impl<A: AuditRepository> AuditService<A> {
    pub fn new(repository: Arc<A>) -> Self {
        Self {
            repository,
            dropped_events: AtomicU64::new(0),
        }
    }

    /// Append an event. Infallible to the caller: a failing store costs the
    /// event, not the guarded action.
    pub async fn log(&self, event: SecurityEvent) {
        if let Err(e) = self.repository.append(event).await {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(error = %e, "Failed to append security event to audit log");
        }
    }

    /// Number of events lost to append failures since startup.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    pub async fn recent(&self, limit: usize) -> Result<Vec<SecurityEvent>, Error> {
        self.repository.recent(limit).await
    }

    pub async fn events_since(&self, since: DateTime<Utc>) -> Result<Vec<SecurityEvent>, Error> {
        self.repository.events_since(since).await
    }

    pub async fn by_type(
        &self,
        event_type: &EventType,
        limit: usize,
    ) -> Result<Vec<SecurityEvent>, Error> {
        self.repository.by_type(event_type, limit).await
    }

    pub async fn failed_attempts(
        &self,
        subject: Option<&SubjectKey>,
        event_type: Option<&EventType>,
    ) -> Result<Vec<SecurityEvent>, Error> {
        self.repository.failed_attempts(subject, event_type).await
    }
}
