use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use portcullis_core::{
    AttemptKey, AttemptRecord, Error,
    repositories::AttemptRepository,
};

/// Attempt records held in a concurrent map, sharded by key.
///
/// DashMap gives per-entry atomicity for the individual load/save/delete
/// calls; the rate limiter service serializes whole read-modify-write
/// sequences on top of this.
#[derive(Default)]
pub struct MemoryAttemptRepository {
    records: DashMap<AttemptKey, AttemptRecord>,
}

impl MemoryAttemptRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl AttemptRepository for MemoryAttemptRepository {
    async fn load(&self, key: &AttemptKey) -> Result<Option<AttemptRecord>, Error> {
        Ok(self.records.get(key).map(|entry| entry.clone()))
    }

    async fn save(&self, key: &AttemptKey, record: &AttemptRecord) -> Result<(), Error> {
        self.records.insert(key.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, key: &AttemptKey) -> Result<(), Error> {
        self.records.remove(key);
        Ok(())
    }

    async fn prune_idle(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        let before_len = self.records.len();
        self.records
            .retain(|_, record| !(record.is_idle() && record.last_attempt < before));
        Ok((before_len - self.records.len()) as u64)
    }
}
