use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error,
    attempt::{AttemptKey, AttemptRecord, SubjectKey},
    event::{EventType, SecurityEvent},
    repositories::{AttemptRepository, AuditRepository, RepositoryProvider},
};

/// Adapter that wraps a RepositoryProvider and implements the attempt
/// repository trait, so services can stay generic over a single provider type.
pub struct AttemptRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> AttemptRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> AttemptRepository for AttemptRepositoryAdapter<R> {
    async fn load(&self, key: &AttemptKey) -> Result<Option<AttemptRecord>, Error> {
        self.provider.attempts().load(key).await
    }

    async fn save(&self, key: &AttemptKey, record: &AttemptRecord) -> Result<(), Error> {
        self.provider.attempts().save(key, record).await
    }

    async fn delete(&self, key: &AttemptKey) -> Result<(), Error> {
        self.provider.attempts().delete(key).await
    }

    async fn prune_idle(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        self.provider.attempts().prune_idle(before).await
    }
}

/// Adapter that wraps a RepositoryProvider and implements the audit
/// repository trait.
pub struct AuditRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> AuditRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> AuditRepository for AuditRepositoryAdapter<R> {
    async fn append(&self, event: SecurityEvent) -> Result<(), Error> {
        self.provider.audit().append(event).await
    }

    async fn recent(&self, limit: usize) -> Result<Vec<SecurityEvent>, Error> {
        self.provider.audit().recent(limit).await
    }

    async fn events_since(&self, since: DateTime<Utc>) -> Result<Vec<SecurityEvent>, Error> {
        self.provider.audit().events_since(since).await
    }

    async fn by_type(
        &self,
        event_type: &EventType,
        limit: usize,
    ) -> Result<Vec<SecurityEvent>, Error> {
        self.provider.audit().by_type(event_type, limit).await
    }

    async fn failed_attempts(
        &self,
        subject: Option<&SubjectKey>,
        event_type: Option<&EventType>,
    ) -> Result<Vec<SecurityEvent>, Error> {
        self.provider
            .audit()
            .failed_attempts(subject, event_type)
            .await
    }
}
