//! # Portcullis
//!
//! Portcullis protects authentication-sensitive actions (login, password
//! reset, magic-link issuance) with adaptive per-subject rate limiting and a
//! security audit trail. Callers wrap each guarded action in an
//! [`Portcullis::evaluate`] / [`Portcullis::complete`] pair; the engine tracks
//! failures per `(action, subject)` key, applies exponential backoff with
//! idle decay, hard-locks exhausted keys, and records every outcome for
//! anomaly analysis.
//!
//! The engine decides, it never performs: identity verification itself
//! (password hashing, token issuance) belongs to the caller, and the engine
//! never sleeps on the caller's behalf; backoff delays are returned as data.
//!
//! ## Example
//!
//! ```rust,no_run
//! use portcullis::{ActionKind, AttemptOutcome, PortcullisBuilder, SubjectKey};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = PortcullisBuilder::new().with_memory().build()?;
//!
//!     let action = ActionKind::login();
//!     let subject = SubjectKey::new("user@example.com");
//!
//!     let verdict = engine.evaluate(&action, &subject).await?;
//!     if verdict.allow {
//!         // Run the real authentication step, then report how it went.
//!         engine
//!             .complete(&action, &subject, AttemptOutcome::failed("invalid credentials"))
//!             .await?;
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};

use portcullis_core::{
    repositories::{AttemptRepositoryAdapter, AuditRepositoryAdapter, RepositoryProvider},
    services::{AnomalyService, AuditService, RateLimiterService},
    validation,
};

mod builder;

pub use builder::{NoStorage, PortcullisBuilder, WithStorage};

/// Re-export core types from portcullis_core
///
/// These types are commonly used when working with the Portcullis API.
pub use portcullis_core::{
    ActionKind, AttemptKey, AttemptRecord, AttemptSnapshot, Error, Event, EventBus, EventHandler,
    EventId, EventType, LimitStatus, LimiterConfig, LimiterRegistry, PatternFlag, PatternFlags,
    RiskDistribution, RiskLevel, SecurityDashboard, SecurityEvent, SecurityMetrics, SubjectKey,
    UnlockReason, mask_origin,
};

/// Re-export storage backends
#[cfg(feature = "memory")]
pub use portcullis_storage_memory::MemoryRepositoryProvider;

/// Default reporting window for [`Portcullis::dashboard`].
const DEFAULT_DASHBOARD_WINDOW_HOURS: i64 = 24;

/// Default window for [`Portcullis::detect`].
const DEFAULT_DETECTION_WINDOW_HOURS: i64 = 1;

/// Window over which recent failures raise the risk level attached to new
/// audit events, and the thresholds for medium and high.
const FAILURE_DENSITY_WINDOW_MINUTES: i64 = 15;
const FAILURE_DENSITY_MEDIUM: usize = 5;
const FAILURE_DENSITY_HIGH: usize = 10;

/// Decision returned by [`Portcullis::evaluate`].
///
/// When `allow` is false the caller must not attempt the guarded action and
/// should surface `retry_after` to the user. When `allow` is true the caller
/// should wait `delay` before attempting, and must report the outcome via
/// [`Portcullis::complete`].
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub allow: bool,

    /// Advisory backoff before attempting; zero for a clean key.
    pub delay: Duration,

    /// Attempts left before lockout.
    pub remaining: u32,

    pub risk_level: RiskLevel,

    /// Time until an active block lifts. Present only when `allow` is false.
    pub retry_after: Option<Duration>,
}

impl Verdict {
    fn fail_open(max_attempts: u32) -> Self {
        Self {
            allow: true,
            delay: Duration::zero(),
            remaining: max_attempts,
            risk_level: RiskLevel::Low,
            retry_after: None,
        }
    }
}

/// Outcome of a guarded action, reported via [`Portcullis::complete`].
#[derive(Debug, Clone, Default)]
pub struct AttemptOutcome {
    pub success: bool,
    pub error_detail: Option<String>,

    /// Raw client origin; masked before it reaches the audit log.
    pub origin: Option<String>,

    pub user_agent: Option<String>,
    pub session_id: Option<String>,
    pub metadata: Map<String, Value>,
}

impl AttemptOutcome {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            error_detail: Some(detail.into()),
            ..Self::default()
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// The gateway callers wrap guarded actions with.
///
/// `Portcullis` coordinates the rate limiter, the audit log, and the anomaly
/// analyzer behind a single interface. Per key the machine is cyclic: open,
/// throttled once failures accrue, locked once the allowance is exhausted,
/// and open again when the window or lockout expires. Expiry is evaluated
/// lazily on access; nothing here runs timers.
///
/// Storage failures fail open for limiter decisions: a false "not blocked" on
/// an infrastructure blip beats locking every user out. The failure itself is
/// reported through tracing, never to the end user.
pub struct Portcullis<R: RepositoryProvider> {
    repositories: Arc<R>,
    limiter: RateLimiterService<AttemptRepositoryAdapter<R>>,
    audit: AuditService<AuditRepositoryAdapter<R>>,
    anomaly: AnomalyService<AuditRepositoryAdapter<R>>,
    events: EventBus,
}

impl<R: RepositoryProvider> Portcullis<R> {
    /// Engine over the given repositories with the built-in limit presets.
    ///
    /// Use [`PortcullisBuilder`] for custom limits or storage.
    pub fn new(repositories: Arc<R>) -> Self {
        Self::with_limits(repositories, LimiterRegistry::builtin())
    }

    pub(crate) fn with_limits(repositories: Arc<R>, registry: LimiterRegistry) -> Self {
        let attempt_repository = Arc::new(AttemptRepositoryAdapter::new(repositories.clone()));
        let audit_repository = Arc::new(AuditRepositoryAdapter::new(repositories.clone()));
        Self {
            repositories,
            limiter: RateLimiterService::new(attempt_repository, registry),
            audit: AuditService::new(audit_repository.clone()),
            anomaly: AnomalyService::new(audit_repository),
            events: EventBus::new(),
        }
    }

    /// Decide whether an attempt at `action` for `subject` is allowed right
    /// now.
    ///
    /// Returns a [`Verdict`]; an unknown action kind is a configuration error
    /// since the registry is sealed at startup. If the attempt store is
    /// unreachable the verdict fails open with a full allowance.
    pub async fn evaluate(&self, action: &ActionKind, subject: &SubjectKey) -> Result<Verdict, Error> {
        validation::validate_action_kind(action.as_str())?;
        validation::validate_subject_key(subject.as_str())?;

        let config = self.limiter.registry().get(action)?.clone();
        let key = AttemptKey::new(action.clone(), subject.clone());

        let status = match self.limiter.check(&key).await {
            Ok(status) => status,
            Err(e) if e.is_storage_error() => {
                tracing::warn!(key = %key, error = %e, "Attempt store unavailable, failing open");
                return Ok(Verdict::fail_open(config.max_attempts));
            }
            Err(e) => return Err(e),
        };

        if status.blocked {
            return Ok(Verdict {
                allow: false,
                delay: Duration::zero(),
                remaining: 0,
                risk_level: status.risk_level,
                retry_after: status.retry_after,
            });
        }

        let delay = match self.limiter.backoff_delay(&key).await {
            Ok(delay) => delay,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Backoff lookup failed, skipping delay");
                Duration::zero()
            }
        };

        Ok(Verdict {
            allow: true,
            delay,
            remaining: status.attempts_remaining.unwrap_or(config.max_attempts),
            risk_level: status.risk_level,
            retry_after: None,
        })
    }

    /// Report the outcome of a guarded action.
    ///
    /// Records the attempt, writes an audit event (best-effort), and emits a
    /// transition event when the failure pushed the key into lockout. Calling
    /// this without a prior [`Portcullis::evaluate`] is tolerated; the record
    /// is created on the fly. Anomaly analysis never runs here.
    pub async fn complete(
        &self,
        action: &ActionKind,
        subject: &SubjectKey,
        outcome: AttemptOutcome,
    ) -> Result<(), Error> {
        validation::validate_action_kind(action.as_str())?;
        validation::validate_subject_key(subject.as_str())?;

        let config = self.limiter.registry().get(action)?.clone();
        let key = AttemptKey::new(action.clone(), subject.clone());
        let now = Utc::now();

        let record = match self.limiter.record_attempt(&key, outcome.success).await {
            Ok(record) => Some(record),
            Err(e) if e.is_storage_error() => {
                tracing::warn!(key = %key, error = %e, "Attempt store unavailable, outcome not recorded");
                None
            }
            Err(e) => return Err(e),
        };

        let event_type = EventType::for_action(action);
        let risk_level = self.recent_failure_risk(&event_type, now).await;
        match SecurityEvent::builder()
            .event_type(event_type)
            .subject(subject.clone())
            .origin(outcome.origin.as_deref())
            .user_agent(outcome.user_agent)
            .success(outcome.success)
            .error_message(outcome.error_detail)
            .risk_level(risk_level)
            .metadata(outcome.metadata)
            .session_id(outcome.session_id)
            .build()
        {
            Ok(event) => self.audit.log(event).await,
            Err(e) => tracing::warn!(key = %key, error = %e, "Failed to build security event"),
        }

        if !outcome.success {
            if let Some(record) = record {
                if record.count >= config.max_attempts {
                    self.emit(Event::SubjectLocked {
                        key,
                        failed_attempts: record.count,
                        locked_until: record.locked_until.unwrap_or(now + config.lockout),
                        timestamp: now,
                    })
                    .await;
                } else {
                    self.emit(Event::AttemptFailed {
                        key,
                        failed_attempts: record.count,
                        timestamp: now,
                    })
                    .await;
                }
            }
        }

        Ok(())
    }

    /// Operator-facing aggregation over recent audit events. Defaults to a
    /// 24 hour window.
    pub async fn dashboard(&self, window: Option<Duration>) -> Result<SecurityDashboard, Error> {
        let window = window.unwrap_or_else(|| Duration::hours(DEFAULT_DASHBOARD_WINDOW_HOURS));
        self.anomaly.dashboard(window).await
    }

    /// Run anomaly detection over recent audit events. Defaults to a 1 hour
    /// window.
    pub async fn detect(&self, window: Option<Duration>) -> Result<SecurityMetrics, Error> {
        let window = window.unwrap_or_else(|| Duration::hours(DEFAULT_DETECTION_WINDOW_HOURS));
        self.anomaly.detect_suspicious_patterns(window).await
    }

    /// Administrative override: clear all limiter state for one key.
    pub async fn reset(&self, action: &ActionKind, subject: &SubjectKey) -> Result<(), Error> {
        let key = AttemptKey::new(action.clone(), subject.clone());
        self.limiter.reset(&key).await?;
        self.emit(Event::SubjectUnlocked {
            key,
            reason: UnlockReason::AdminAction,
            timestamp: Utc::now(),
        })
        .await;
        Ok(())
    }

    /// Read-only diagnostic view over one key.
    pub async fn snapshot(
        &self,
        action: &ActionKind,
        subject: &SubjectKey,
    ) -> Result<AttemptSnapshot, Error> {
        let key = AttemptKey::new(action.clone(), subject.clone());
        self.limiter.snapshot(&key).await
    }

    /// The most recent audit events, newest first.
    pub async fn recent_events(&self, limit: usize) -> Result<Vec<SecurityEvent>, Error> {
        self.audit.recent(limit).await
    }

    /// Number of audit events lost to append failures since startup.
    pub fn dropped_events(&self) -> u64 {
        self.audit.dropped_events()
    }

    /// Register a handler for limiter transition events.
    pub async fn on_event(&self, handler: Arc<dyn EventHandler>) {
        self.events.register(handler).await;
    }

    /// Health check across the underlying repositories.
    pub async fn health_check(&self) -> Result<(), Error> {
        self.repositories.health_check().await
    }

    /// Risk level for a new event, from the density of recent failures of the
    /// same type. Best-effort: an unreadable audit log yields low.
    async fn recent_failure_risk(&self, event_type: &EventType, now: DateTime<Utc>) -> RiskLevel {
        let since = now - Duration::minutes(FAILURE_DENSITY_WINDOW_MINUTES);
        match self.audit.events_since(since).await {
            Ok(events) => {
                let failures = events
                    .iter()
                    .filter(|e| !e.success && &e.event_type == event_type)
                    .count();
                if failures >= FAILURE_DENSITY_HIGH {
                    RiskLevel::High
                } else if failures >= FAILURE_DENSITY_MEDIUM {
                    RiskLevel::Medium
                } else {
                    RiskLevel::Low
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Audit log unreadable, defaulting event risk to low");
                RiskLevel::Low
            }
        }
    }

    /// Handler failures are diagnostics; they never reach the guarded action.
    async fn emit(&self, event: Event) {
        if let Err(e) = self.events.emit(&event).await {
            tracing::warn!(error = %e, "Event handler failed");
        }
    }
}
