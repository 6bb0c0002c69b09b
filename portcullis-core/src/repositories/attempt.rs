//! Repository trait for attempt records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error,
    attempt::{AttemptKey, AttemptRecord},
};

/// Keyed storage for attempt records, one record per `(action, subject)` pair.
///
/// Implementations provide plain load/save/delete semantics; the rate limiter
/// service serializes read-modify-write sequences per key on top of this
/// trait, so a backend does not need its own compare-and-swap support. Keys
/// are independent of each other and may be sharded freely.
#[async_trait]
pub trait AttemptRepository: Send + Sync + 'static {
    /// Load the record for a key. `None` means the key was never attempted
    /// (or its record was garbage-collected, which is equivalent).
    async fn load(&self, key: &AttemptKey) -> Result<Option<AttemptRecord>, Error>;

    /// Persist the record for a key, creating or replacing it.
    async fn save(&self, key: &AttemptKey, record: &AttemptRecord) -> Result<(), Error>;

    /// Remove the record for a key entirely. Removing an absent key is not an
    /// error.
    async fn delete(&self, key: &AttemptKey) -> Result<(), Error>;

    /// Remove idle records (zero count, no lockout) whose last attempt is
    /// older than `before`. Storage reclamation only; expiry of windows and
    /// lockouts is evaluated lazily on access and never depends on this.
    ///
    /// Returns the number of records removed. Locked records must be skipped.
    async fn prune_idle(&self, before: DateTime<Utc>) -> Result<u64, Error>;
}
