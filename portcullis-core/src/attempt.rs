//! Attempt tracking model
//!
//! This module contains the key and record types the rate limiter operates on.
//! Each guarded action kind tracks one [`AttemptRecord`] per subject; the record
//! carries the failure counter for the current window, the window bounds, and
//! the lockout expiry when one is in effect.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::RiskLevel;

/// A named guarded operation with its own limiter configuration.
///
/// Action kinds are lowercase snake_case strings. The well-known kinds have
/// dedicated constructors; arbitrary kinds can be registered alongside them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct ActionKind(String);

impl ActionKind {
    pub fn new(kind: &str) -> Self {
        ActionKind(kind.to_string())
    }

    pub fn login() -> Self {
        ActionKind("login".to_string())
    }

    pub fn password_reset() -> Self {
        ActionKind("password_reset".to_string())
    }

    pub fn magic_link() -> Self {
        ActionKind("magic_link".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<String> for ActionKind {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ActionKind {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The identity a limiter decision is scoped to, typically an email or account
/// id. Never a raw network address; origins are masked separately before they
/// reach the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct SubjectKey(String);

impl SubjectKey {
    pub fn new(subject: &str) -> Self {
        SubjectKey(subject.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<String> for SubjectKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SubjectKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Composite key for one tracked `(action kind, subject)` pair.
///
/// Keys are fully independent of each other; stores may shard by key freely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct AttemptKey {
    action: ActionKind,
    subject: SubjectKey,
}

impl AttemptKey {
    pub fn new(action: ActionKind, subject: SubjectKey) -> Self {
        Self { action, subject }
    }

    pub fn action(&self) -> &ActionKind {
        &self.action
    }

    pub fn subject(&self) -> &SubjectKey {
        &self.subject
    }
}

impl std::fmt::Display for AttemptKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.action, self.subject)
    }
}

/// Per-key attempt state.
///
/// Created lazily on the first recorded attempt and updated in place. A record
/// with `count == 0` and no lockout is indistinguishable from "never attempted"
/// and is eligible for garbage collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Failed attempts within the current window. Decays with idle time and
    /// resets when the window expires.
    pub count: u32,

    /// Start of the current window.
    pub first_attempt: DateTime<Utc>,

    /// Most recent failed attempt; anchors decay.
    pub last_attempt: DateTime<Utc>,

    /// Hard block expiry. While in the future the key is blocked regardless of
    /// `count`.
    pub locked_until: Option<DateTime<Utc>>,

    /// Lifetime counter of successful outcomes, not windowed.
    pub successful_attempts: u64,

    /// Most recent successful outcome.
    pub last_successful_attempt: Option<DateTime<Utc>>,
}

impl AttemptRecord {
    /// Zero-value record anchored at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            first_attempt: now,
            last_attempt: now,
            locked_until: None,
            successful_attempts: 0,
            last_successful_attempt: None,
        }
    }

    /// Whether a lockout is in effect at `now`.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }

    /// Whether the record carries no limiter state and may be garbage-collected.
    pub fn is_idle(&self) -> bool {
        self.count == 0 && self.locked_until.is_none()
    }
}

/// Outcome of a limiter check for one key.
#[derive(Debug, Clone, PartialEq)]
pub struct LimitStatus {
    pub blocked: bool,

    /// Time until the block lifts. Present only when `blocked`.
    pub retry_after: Option<Duration>,

    /// Attempts left before lockout. Present only when not blocked.
    pub attempts_remaining: Option<u32>,

    pub risk_level: RiskLevel,
}

impl LimitStatus {
    pub fn blocked(retry_after: Duration) -> Self {
        Self {
            blocked: true,
            retry_after: Some(retry_after),
            attempts_remaining: None,
            risk_level: RiskLevel::High,
        }
    }

    pub fn open(attempts_remaining: u32, risk_level: RiskLevel) -> Self {
        Self {
            blocked: false,
            retry_after: None,
            attempts_remaining: Some(attempts_remaining),
            risk_level,
        }
    }
}

/// Read-only diagnostic view over one key's attempt history.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptSnapshot {
    /// Current window failures plus lifetime successes.
    pub total_attempts: u64,

    /// Lifetime successes over `total_attempts`; 1.0 when nothing was attempted.
    pub success_rate: f64,

    /// Set when the failure counter sits above 80% of the configured maximum.
    pub is_repeat_offender: bool,

    pub time_since_last_success: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_kind_constructors() {
        assert_eq!(ActionKind::login().as_str(), "login");
        assert_eq!(ActionKind::password_reset().as_str(), "password_reset");
        assert_eq!(ActionKind::magic_link().as_str(), "magic_link");
        assert_eq!(ActionKind::new("sms_otp").as_str(), "sms_otp");
    }

    #[test]
    fn test_attempt_key_display() {
        let key = AttemptKey::new(ActionKind::login(), SubjectKey::new("a@x.com"));
        assert_eq!(key.to_string(), "login:a@x.com");
        assert_eq!(key.action(), &ActionKind::login());
        assert_eq!(key.subject().as_str(), "a@x.com");
    }

    #[test]
    fn test_new_record_is_idle() {
        let record = AttemptRecord::new(Utc::now());
        assert!(record.is_idle());
        assert_eq!(record.count, 0);
        assert_eq!(record.successful_attempts, 0);
        assert!(!record.is_locked(Utc::now()));
    }

    #[test]
    fn test_record_lock_expiry() {
        let now = Utc::now();
        let mut record = AttemptRecord::new(now);
        record.locked_until = Some(now + Duration::minutes(30));

        assert!(record.is_locked(now));
        assert!(record.is_locked(now + Duration::minutes(29)));
        assert!(!record.is_locked(now + Duration::minutes(31)));
        assert!(!record.is_idle());
    }

    #[test]
    fn test_limit_status_constructors() {
        let blocked = LimitStatus::blocked(Duration::minutes(30));
        assert!(blocked.blocked);
        assert_eq!(blocked.retry_after, Some(Duration::minutes(30)));
        assert_eq!(blocked.attempts_remaining, None);
        assert_eq!(blocked.risk_level, RiskLevel::High);

        let open = LimitStatus::open(5, RiskLevel::Low);
        assert!(!open.blocked);
        assert_eq!(open.attempts_remaining, Some(5));
        assert_eq!(open.retry_after, None);
    }
}
