//! Builder pattern for constructing Portcullis instances
//!
//! This module provides a type-safe builder with compile-time validation of
//! storage configuration: storage must be chosen before `build()` exists, and
//! `build()` refuses to produce an engine with an empty or malformed limiter
//! registry.

use std::sync::Arc;

use portcullis_core::{
    ActionKind, Error, LimiterConfig, LimiterRegistry, repositories::RepositoryProvider,
};

use crate::Portcullis;

#[cfg(feature = "memory")]
use portcullis_storage_memory::MemoryRepositoryProvider;

/// Marker type indicating no storage has been configured yet.
///
/// This is the initial state of [`PortcullisBuilder`].
pub struct NoStorage;

/// Marker type indicating storage has been configured.
pub struct WithStorage<R: RepositoryProvider> {
    repositories: Arc<R>,
}

/// A type-safe builder for constructing [`Portcullis`] instances.
///
/// # Example
///
/// ```rust,no_run
/// use portcullis::{ActionKind, LimiterConfig, PortcullisBuilder};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = PortcullisBuilder::new()
///     .with_memory()
///     .with_limit(ActionKind::new("api_token"), LimiterConfig::login())
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct PortcullisBuilder<Storage> {
    storage: Storage,
    registry: LimiterRegistry,
}

impl Default for PortcullisBuilder<NoStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl PortcullisBuilder<NoStorage> {
    /// Create a new builder carrying the built-in limit presets.
    pub fn new() -> Self {
        Self {
            storage: NoStorage,
            registry: LimiterRegistry::builtin(),
        }
    }

    /// Use a custom repository provider.
    pub fn with_repositories<R: RepositoryProvider>(
        self,
        repositories: Arc<R>,
    ) -> PortcullisBuilder<WithStorage<R>> {
        PortcullisBuilder {
            storage: WithStorage { repositories },
            registry: self.registry,
        }
    }

    /// Use the in-memory backend with its default audit capacity.
    #[cfg(feature = "memory")]
    pub fn with_memory(self) -> PortcullisBuilder<WithStorage<MemoryRepositoryProvider>> {
        self.with_repositories(Arc::new(MemoryRepositoryProvider::new()))
    }

    /// Use the in-memory backend, retaining at most `audit_capacity` events.
    #[cfg(feature = "memory")]
    pub fn with_memory_capacity(
        self,
        audit_capacity: usize,
    ) -> PortcullisBuilder<WithStorage<MemoryRepositoryProvider>> {
        self.with_repositories(Arc::new(MemoryRepositoryProvider::with_audit_capacity(
            audit_capacity,
        )))
    }
}

impl<Storage> PortcullisBuilder<Storage> {
    /// Replace the whole limiter registry.
    pub fn with_limits(mut self, registry: LimiterRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Register or override the limits for one action kind.
    pub fn with_limit(mut self, kind: ActionKind, config: LimiterConfig) -> Self {
        self.registry.insert(kind, config);
        self
    }
}

impl<R: RepositoryProvider> PortcullisBuilder<WithStorage<R>> {
    /// Build the engine.
    ///
    /// Fails when the limiter registry is empty or carries an invalid config;
    /// the engine refuses to start rather than run with undefined limits.
    pub fn build(self) -> Result<Portcullis<R>, Error> {
        self.registry.validate()?;
        Ok(Portcullis::with_limits(
            self.storage.repositories,
            self.registry,
        ))
    }
}
