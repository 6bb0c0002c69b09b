//! Repository traits for the storage layer
//!
//! Services interact with storage exclusively through these traits, so the
//! engine carries no hidden process-wide state: one provider instance is
//! injected per deployment and tests inject in-memory fakes.
//!
//! The layout follows a composable hierarchy:
//!
//! - Individual `*Repository` traits define the operations for each data domain
//! - Individual `*RepositoryProvider` traits provide access to each repository type
//! - [`RepositoryProvider`] is a supertrait combining all provider traits plus
//!   lifecycle methods

pub mod adapter;
pub mod attempt;
pub mod audit;

pub use adapter::{AttemptRepositoryAdapter, AuditRepositoryAdapter};
pub use attempt::AttemptRepository;
pub use audit::AuditRepository;

use async_trait::async_trait;

use crate::Error;

/// Provider trait for attempt record storage.
pub trait AttemptRepositoryProvider: Send + Sync + 'static {
    /// The attempt repository implementation type
    type AttemptRepo: AttemptRepository;

    /// Get the attempt repository
    fn attempts(&self) -> &Self::AttemptRepo;
}

/// Provider trait for audit log storage.
pub trait AuditRepositoryProvider: Send + Sync + 'static {
    /// The audit repository implementation type
    type AuditRepo: AuditRepository;

    /// Get the audit repository
    fn audit(&self) -> &Self::AuditRepo;
}

/// Provider trait storage backends implement to supply every repository the
/// engine needs, plus lifecycle methods.
#[async_trait]
pub trait RepositoryProvider: AttemptRepositoryProvider + AuditRepositoryProvider {
    /// Health check for all repositories
    async fn health_check(&self) -> Result<(), Error>;
}
