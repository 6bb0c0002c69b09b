//! Adaptive rate limiting for guarded actions.
//!
//! This module implements per-key attempt tracking with exponential backoff,
//! idle decay, and hard lockout. Limits are keyed by `(action kind, subject)`;
//! each action kind carries its own configuration from the [`LimiterRegistry`].
//!
//! # Decision order
//!
//! A check applies decay first, then the active-lockout test, then the
//! fresh-window reset, then the lockout trigger. Decay-before-reset matters:
//! a long-idle key is only ever bumped back to a fresh window, never left in
//! a partially-decayed state with a stale lockout expiry.
//!
//! # Thread safety
//!
//! The service serializes read-modify-write sequences with one async mutex per
//! key, so two concurrent requests for the same key cannot both pass a check
//! and race past the attempt limit. Keys never coordinate with each other.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::Rng;
use tokio::sync::Mutex;

use crate::{
    Error,
    attempt::{AttemptKey, AttemptRecord, AttemptSnapshot, LimitStatus},
    config::{LimiterConfig, LimiterRegistry},
    metrics::RiskLevel,
    repositories::AttemptRepository,
};

/// Base delay for the first backoff step.
const BACKOFF_BASE_MS: f64 = 1000.0;

/// Jitter bounds applied to every backoff delay, to avoid synchronized retry
/// storms across clients.
const BACKOFF_JITTER_MIN: f64 = 0.85;
const BACKOFF_JITTER_MAX: f64 = 1.15;

/// Fraction of `max_attempts` above which a key counts as a repeat offender.
const REPEAT_OFFENDER_RATIO: f64 = 0.8;

/// Service deciding whether guarded-action attempts are currently allowed.
///
/// Holds the per-action-kind limit registry and a repository of attempt
/// records. All state transitions are evaluated lazily against wall-clock
/// timestamps on access; nothing here sleeps or runs background timers.
pub struct RateLimiterService<R: AttemptRepository> {
    repository: Arc<R>,
    registry: LimiterRegistry,
    locks: DashMap<AttemptKey, Arc<Mutex<()>>>,
}

impl<R: AttemptRepository> RateLimiterService<R> {
    pub fn new(repository: Arc<R>, registry: LimiterRegistry) -> Self {
        Self {
            repository,
            registry,
            locks: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &LimiterRegistry {
        &self.registry
    }

    fn key_lock(&self, key: &AttemptKey) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Decide whether an attempt for `key` is currently allowed.
    ///
    /// Applies decay, lazily expires windows and lockouts, and triggers a new
    /// lockout when the key has exhausted its allowance. State changes are
    /// persisted before the decision is returned.
    pub async fn check(&self, key: &AttemptKey) -> Result<LimitStatus, Error> {
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;
        self.check_at(key, Utc::now()).await
    }

    /// Record the outcome of an attempt for `key`.
    ///
    /// A success forgives exactly one prior failure and never clears an active
    /// lockout. A failure increments the window counter, starting a new window
    /// if the previous one expired. The record is created lazily, so recording
    /// an outcome for a never-checked key is well-defined.
    pub async fn record_attempt(
        &self,
        key: &AttemptKey,
        success: bool,
    ) -> Result<AttemptRecord, Error> {
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;
        self.record_attempt_at(key, success, Utc::now()).await
    }

    /// Delay the caller should wait before retrying `key`.
    ///
    /// Zero when the key has no recent failures; otherwise exponential in the
    /// failure count, jittered, and capped at the configured maximum. The
    /// engine itself never sleeps; the duration is advisory for the caller.
    pub async fn backoff_delay(&self, key: &AttemptKey) -> Result<Duration, Error> {
        let config = self.registry.get(key.action())?;
        let count = self
            .repository
            .load(key)
            .await?
            .map(|record| record.count)
            .unwrap_or(0);
        Ok(backoff_for_count(count, config))
    }

    /// Read-only diagnostic view over one key's attempt history.
    pub async fn snapshot(&self, key: &AttemptKey) -> Result<AttemptSnapshot, Error> {
        self.snapshot_at(key, Utc::now()).await
    }

    /// Clear the record for `key` entirely. Administrative escape hatch.
    pub async fn reset(&self, key: &AttemptKey) -> Result<(), Error> {
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;
        self.repository.delete(key).await
    }

    async fn check_at(&self, key: &AttemptKey, now: DateTime<Utc>) -> Result<LimitStatus, Error> {
        let config = self.registry.get(key.action())?;

        let Some(mut record) = self.repository.load(key).await? else {
            return Ok(LimitStatus::open(config.max_attempts, RiskLevel::Low));
        };

        // Decay before anything else, so sporadic failures age out without a
        // hard reset.
        let mut dirty = false;
        let idle = now - record.last_attempt;
        if record.count > 0 && idle > config.window / 2 {
            let decayed = decayed_count(record.count, config, idle);
            if decayed != record.count {
                record.count = decayed;
                dirty = true;
            }
        }

        // An active lockout is authoritative regardless of the counter.
        if let Some(until) = record.locked_until {
            if until > now {
                if dirty {
                    self.repository.save(key, &record).await?;
                }
                return Ok(LimitStatus::blocked(until - now));
            }
        }

        // Window fully expired, no active lock: start fresh. Lifetime success
        // stats survive the reset.
        if now - record.first_attempt > config.window {
            record.count = 0;
            record.first_attempt = now;
            record.last_attempt = now;
            record.locked_until = None;
            self.repository.save(key, &record).await?;
            return Ok(LimitStatus::open(config.max_attempts, RiskLevel::Low));
        }

        // Allowance exhausted: trigger the lockout now.
        if record.count >= config.max_attempts {
            record.locked_until = Some(now + config.lockout);
            self.repository.save(key, &record).await?;
            return Ok(LimitStatus::blocked(config.lockout));
        }

        let remaining = config.max_attempts - record.count;
        let risk_level = risk_for_remaining(remaining);
        if dirty {
            self.repository.save(key, &record).await?;
        }
        Ok(LimitStatus::open(remaining, risk_level))
    }

    async fn record_attempt_at(
        &self,
        key: &AttemptKey,
        success: bool,
        now: DateTime<Utc>,
    ) -> Result<AttemptRecord, Error> {
        let config = self.registry.get(key.action())?;

        let mut record = self
            .repository
            .load(key)
            .await?
            .unwrap_or_else(|| AttemptRecord::new(now));

        if success {
            // Partial forgiveness: one success pays down one failure. An
            // active lockout stays in force until it expires.
            record.count = record.count.saturating_sub(1);
            record.successful_attempts += 1;
            record.last_successful_attempt = Some(now);
        } else if now - record.first_attempt > config.window {
            record.count = 1;
            record.first_attempt = now;
            record.last_attempt = now;
        } else {
            record.count += 1;
            record.last_attempt = now;
        }

        self.repository.save(key, &record).await?;
        Ok(record)
    }

    async fn snapshot_at(
        &self,
        key: &AttemptKey,
        now: DateTime<Utc>,
    ) -> Result<AttemptSnapshot, Error> {
        let config = self.registry.get(key.action())?;
        let record = self
            .repository
            .load(key)
            .await?
            .unwrap_or_else(|| AttemptRecord::new(now));

        let total_attempts = record.count as u64 + record.successful_attempts;
        let success_rate = if total_attempts == 0 {
            1.0
        } else {
            record.successful_attempts as f64 / total_attempts as f64
        };

        Ok(AttemptSnapshot {
            total_attempts,
            success_rate,
            is_repeat_offender: record.count as f64
                > REPEAT_OFFENDER_RATIO * config.max_attempts as f64,
            time_since_last_success: record.last_successful_attempt.map(|t| now - t),
        })
    }
}

fn risk_for_remaining(remaining: u32) -> RiskLevel {
    if remaining <= 1 {
        RiskLevel::High
    } else if remaining <= 2 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// `count * e^(-decay_rate * idle/window)`, floored.
fn decayed_count(count: u32, config: &LimiterConfig, idle: Duration) -> u32 {
    let ratio = idle.num_milliseconds() as f64 / config.window.num_milliseconds() as f64;
    (count as f64 * (-config.decay_rate * ratio).exp()).floor() as u32
}

fn backoff_for_count(count: u32, config: &LimiterConfig) -> Duration {
    if count == 0 {
        return Duration::zero();
    }
    let jitter = rand::rng().random_range(BACKOFF_JITTER_MIN..=BACKOFF_JITTER_MAX);
    let ideal_ms = BACKOFF_BASE_MS * config.backoff_multiplier.powi((count - 1) as i32) * jitter;
    let capped_ms = ideal_ms.min(config.max_backoff.num_milliseconds() as f64);
    Duration::milliseconds(capped_ms.round() as i64)
}
