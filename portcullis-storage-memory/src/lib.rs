//! In-memory storage backend for the portcullis engine
//!
//! This crate provides [`MemoryRepositoryProvider`], an in-process backend
//! holding attempt records in a concurrent map and audit events in a bounded
//! ring buffer. It is the default backend for single-node deployments and the
//! backend tests inject.
//!
//! State lives and dies with the process; deployments that need durability
//! across restarts implement the `portcullis-core` repository traits against
//! their own store instead.

mod attempt;
mod audit;

pub use attempt::MemoryAttemptRepository;
pub use audit::{DEFAULT_AUDIT_CAPACITY, MemoryAuditRepository};

use async_trait::async_trait;
use portcullis_core::{
    Error,
    repositories::{AttemptRepositoryProvider, AuditRepositoryProvider, RepositoryProvider},
};

/// Repository provider backed entirely by process memory.
pub struct MemoryRepositoryProvider {
    attempts: MemoryAttemptRepository,
    audit: MemoryAuditRepository,
}

impl MemoryRepositoryProvider {
    /// Provider with the default audit capacity.
    pub fn new() -> Self {
        Self::with_audit_capacity(DEFAULT_AUDIT_CAPACITY)
    }

    /// Provider retaining at most `capacity` audit events.
    pub fn with_audit_capacity(capacity: usize) -> Self {
        Self {
            attempts: MemoryAttemptRepository::new(),
            audit: MemoryAuditRepository::new(capacity),
        }
    }
}

impl Default for MemoryRepositoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AttemptRepositoryProvider for MemoryRepositoryProvider {
    type AttemptRepo = MemoryAttemptRepository;

    fn attempts(&self) -> &Self::AttemptRepo {
        &self.attempts
    }
}

impl AuditRepositoryProvider for MemoryRepositoryProvider {
    type AuditRepo = MemoryAuditRepository;

    fn audit(&self) -> &Self::AuditRepo {
        &self.audit
    }
}

#[async_trait]
impl RepositoryProvider for MemoryRepositoryProvider {
    async fn health_check(&self) -> Result<(), Error> {
        Ok(())
    }
}
