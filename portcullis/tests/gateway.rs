use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use portcullis::{
    ActionKind, AttemptKey, AttemptOutcome, AttemptRecord, Error, Event, EventHandler, Portcullis,
    PortcullisBuilder, RiskLevel, SubjectKey, UnlockReason,
};
use portcullis_core::error::{EventError, StorageError};
use portcullis_core::repositories::{
    AttemptRepository, AttemptRepositoryProvider, AuditRepositoryProvider, RepositoryProvider,
};
use portcullis_storage_memory::{MemoryAuditRepository, MemoryRepositoryProvider};

fn engine() -> Portcullis<MemoryRepositoryProvider> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    PortcullisBuilder::new().with_memory().build().unwrap()
}

async fn fail_n(
    engine: &Portcullis<MemoryRepositoryProvider>,
    action: &ActionKind,
    subject: &SubjectKey,
    n: usize,
) {
    for _ in 0..n {
        engine
            .complete(action, subject, AttemptOutcome::failed("invalid credentials"))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_first_evaluate_has_full_allowance() {
    let engine = engine();
    let verdict = engine
        .evaluate(&ActionKind::login(), &SubjectKey::new("a@x.com"))
        .await
        .unwrap();

    assert!(verdict.allow);
    assert_eq!(verdict.delay, Duration::zero());
    assert_eq!(verdict.remaining, 5);
    assert_eq!(verdict.risk_level, RiskLevel::Low);
    assert_eq!(verdict.retry_after, None);
}

#[tokio::test]
async fn test_failures_throttle_before_locking() {
    let engine = engine();
    let action = ActionKind::login();
    let subject = SubjectKey::new("a@x.com");

    fail_n(&engine, &action, &subject, 2).await;

    let verdict = engine.evaluate(&action, &subject).await.unwrap();
    assert!(verdict.allow);
    assert!(verdict.delay > Duration::zero(), "expected a backoff delay");
    assert!(verdict.delay <= Duration::seconds(30));
    assert_eq!(verdict.remaining, 3);
}

#[tokio::test]
async fn test_lockout_after_exhausting_allowance() {
    let engine = engine();
    let action = ActionKind::login();
    let subject = SubjectKey::new("a@x.com");

    fail_n(&engine, &action, &subject, 4).await;

    let verdict = engine.evaluate(&action, &subject).await.unwrap();
    assert!(verdict.allow);
    assert_eq!(verdict.remaining, 1);
    assert_eq!(verdict.risk_level, RiskLevel::High);

    engine
        .complete(&action, &subject, AttemptOutcome::failed("invalid credentials"))
        .await
        .unwrap();

    let verdict = engine.evaluate(&action, &subject).await.unwrap();
    assert!(!verdict.allow);
    assert_eq!(verdict.remaining, 0);
    assert_eq!(verdict.risk_level, RiskLevel::High);

    let retry_after = verdict.retry_after.expect("blocked verdict carries retry_after");
    assert!(retry_after > Duration::minutes(29));
    assert!(retry_after <= Duration::minutes(30));

    // Still blocked on a later evaluate; the lockout runs to completion.
    let verdict = engine.evaluate(&action, &subject).await.unwrap();
    assert!(!verdict.allow);
}

#[tokio::test]
async fn test_success_partially_forgives_failures() {
    let engine = engine();
    let action = ActionKind::magic_link();
    let subject = SubjectKey::new("a@x.com");

    fail_n(&engine, &action, &subject, 2).await;
    engine
        .complete(&action, &subject, AttemptOutcome::succeeded())
        .await
        .unwrap();

    let verdict = engine.evaluate(&action, &subject).await.unwrap();
    assert!(verdict.allow);
    assert_eq!(verdict.remaining, 2);
}

#[tokio::test]
async fn test_complete_without_evaluate_is_tolerated() {
    let engine = engine();
    let action = ActionKind::password_reset();
    let subject = SubjectKey::new("a@x.com");

    engine
        .complete(&action, &subject, AttemptOutcome::failed("expired token"))
        .await
        .unwrap();

    let snapshot = engine.snapshot(&action, &subject).await.unwrap();
    assert_eq!(snapshot.total_attempts, 1);
}

#[tokio::test]
async fn test_invalid_inputs_are_rejected() {
    let engine = engine();

    let result = engine
        .evaluate(&ActionKind::login(), &SubjectKey::new("user @x.com"))
        .await;
    assert!(matches!(result, Err(ref e) if e.is_validation_error()));

    let result = engine
        .evaluate(&ActionKind::new("Not Snake"), &SubjectKey::new("a@x.com"))
        .await;
    assert!(matches!(result, Err(ref e) if e.is_validation_error()));
}

#[tokio::test]
async fn test_audit_events_written_per_outcome() {
    let engine = engine();
    let action = ActionKind::login();
    let subject = SubjectKey::new("a@x.com");

    engine
        .complete(
            &action,
            &subject,
            AttemptOutcome::failed("invalid credentials")
                .with_origin("203.0.113.7")
                .with_user_agent("integration-test/1.0")
                .with_session_id("ssn_1"),
        )
        .await
        .unwrap();
    engine
        .complete(&action, &subject, AttemptOutcome::succeeded())
        .await
        .unwrap();

    let events = engine.recent_events(10).await.unwrap();
    assert_eq!(events.len(), 2);
    assert!(events[0].success, "newest event first");
    assert!(!events[1].success);

    let failure = &events[1];
    assert_eq!(failure.subject, Some(subject.clone()));
    assert_eq!(failure.error_message.as_deref(), Some("invalid credentials"));
    assert_eq!(failure.user_agent.as_deref(), Some("integration-test/1.0"));
    assert_eq!(failure.session_id.as_deref(), Some("ssn_1"));

    let origin = failure.origin.as_deref().expect("origin recorded");
    assert!(origin.starts_with("org_"));
    assert!(!origin.contains("203.0.113.7"));
}

#[tokio::test]
async fn test_event_risk_rises_with_failure_density() {
    let engine = engine();
    let action = ActionKind::login();
    let subject = SubjectKey::new("a@x.com");

    fail_n(&engine, &action, &subject, 6).await;

    let events = engine.recent_events(10).await.unwrap();
    assert_eq!(events[0].risk_level, RiskLevel::Medium);
    assert_eq!(events[5].risk_level, RiskLevel::Low);
}

struct RecordingHandler {
    seen: Mutex<Vec<Event>>,
}

impl RecordingHandler {
    fn new() -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn handle_event(&self, event: &Event) -> Result<(), EventError> {
        self.seen.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[tokio::test]
async fn test_lockout_transition_emits_event() {
    let engine = engine();
    let handler = Arc::new(RecordingHandler::new());
    engine.on_event(handler.clone()).await;

    let action = ActionKind::login();
    let subject = SubjectKey::new("a@x.com");
    fail_n(&engine, &action, &subject, 5).await;

    let seen = handler.seen.lock().unwrap();
    let locked: Vec<_> = seen
        .iter()
        .filter(|e| matches!(e, Event::SubjectLocked { .. }))
        .collect();
    assert_eq!(locked.len(), 1);

    if let Event::SubjectLocked {
        key,
        failed_attempts,
        locked_until,
        timestamp,
    } = locked[0]
    {
        assert_eq!(key.subject().as_str(), "a@x.com");
        assert_eq!(*failed_attempts, 5);
        assert!(*locked_until > *timestamp);
    }

    let failed = seen
        .iter()
        .filter(|e| matches!(e, Event::AttemptFailed { .. }))
        .count();
    assert_eq!(failed, 4);
}

#[tokio::test]
async fn test_reset_unlocks_and_emits_event() {
    let engine = engine();
    let handler = Arc::new(RecordingHandler::new());
    engine.on_event(handler.clone()).await;

    let action = ActionKind::login();
    let subject = SubjectKey::new("a@x.com");
    fail_n(&engine, &action, &subject, 5).await;
    assert!(!engine.evaluate(&action, &subject).await.unwrap().allow);

    engine.reset(&action, &subject).await.unwrap();

    let verdict = engine.evaluate(&action, &subject).await.unwrap();
    assert!(verdict.allow);
    assert_eq!(verdict.remaining, 5);

    let seen = handler.seen.lock().unwrap();
    assert!(seen.iter().any(|e| matches!(
        e,
        Event::SubjectUnlocked {
            reason: UnlockReason::AdminAction,
            ..
        }
    )));
}

/// Provider whose attempt store is down but whose audit log still works.
struct OutageProvider {
    attempts: DownAttemptRepository,
    audit: MemoryAuditRepository,
}

struct DownAttemptRepository;

#[async_trait]
impl AttemptRepository for DownAttemptRepository {
    async fn load(&self, _key: &AttemptKey) -> Result<Option<AttemptRecord>, Error> {
        Err(StorageError::Unavailable("attempt store down".to_string()).into())
    }

    async fn save(&self, _key: &AttemptKey, _record: &AttemptRecord) -> Result<(), Error> {
        Err(StorageError::Unavailable("attempt store down".to_string()).into())
    }

    async fn delete(&self, _key: &AttemptKey) -> Result<(), Error> {
        Err(StorageError::Unavailable("attempt store down".to_string()).into())
    }

    async fn prune_idle(&self, _before: DateTime<Utc>) -> Result<u64, Error> {
        Err(StorageError::Unavailable("attempt store down".to_string()).into())
    }
}

impl AttemptRepositoryProvider for OutageProvider {
    type AttemptRepo = DownAttemptRepository;

    fn attempts(&self) -> &Self::AttemptRepo {
        &self.attempts
    }
}

impl AuditRepositoryProvider for OutageProvider {
    type AuditRepo = MemoryAuditRepository;

    fn audit(&self) -> &Self::AuditRepo {
        &self.audit
    }
}

#[async_trait]
impl RepositoryProvider for OutageProvider {
    async fn health_check(&self) -> Result<(), Error> {
        Err(StorageError::Unavailable("attempt store down".to_string()).into())
    }
}

#[tokio::test]
async fn test_storage_outage_fails_open() {
    let engine = PortcullisBuilder::new()
        .with_repositories(Arc::new(OutageProvider {
            attempts: DownAttemptRepository,
            audit: MemoryAuditRepository::default(),
        }))
        .build()
        .unwrap();

    let action = ActionKind::login();
    let subject = SubjectKey::new("a@x.com");

    // A false "not blocked" beats locking every user out on an outage.
    let verdict = engine.evaluate(&action, &subject).await.unwrap();
    assert!(verdict.allow);
    assert_eq!(verdict.remaining, 5);
    assert_eq!(verdict.risk_level, RiskLevel::Low);

    // Completing still audits the outcome even though nothing was recorded.
    engine
        .complete(&action, &subject, AttemptOutcome::failed("invalid credentials"))
        .await
        .unwrap();
    assert_eq!(engine.recent_events(10).await.unwrap().len(), 1);
    assert_eq!(engine.dropped_events(), 0);
}

#[tokio::test]
async fn test_snapshot_through_gateway() {
    let engine = engine();
    let action = ActionKind::login();
    let subject = SubjectKey::new("a@x.com");

    fail_n(&engine, &action, &subject, 5).await;
    engine
        .complete(&action, &subject, AttemptOutcome::succeeded())
        .await
        .unwrap();

    let snapshot = engine.snapshot(&action, &subject).await.unwrap();
    assert_eq!(snapshot.total_attempts, 5);
    assert_eq!(snapshot.success_rate, 0.2);
    assert!(!snapshot.is_repeat_offender);
    assert!(snapshot.time_since_last_success.is_some());
}
