use portcullis::{ActionKind, AttemptOutcome, PatternFlag, PortcullisBuilder, SubjectKey};

#[tokio::test]
async fn test_consecutive_failures_are_detected() {
    let engine = PortcullisBuilder::new().with_memory().build().unwrap();
    let action = ActionKind::login();
    let subject = SubjectKey::new("a@x.com");

    for _ in 0..6 {
        engine
            .complete(&action, &subject, AttemptOutcome::failed("invalid credentials"))
            .await
            .unwrap();
    }

    let metrics = engine.detect(None).await.unwrap();
    assert!(metrics
        .pattern_flags
        .contains(PatternFlag::ConsecutiveFailures));
    assert!(metrics.suspicious_activity);
    assert!(metrics.risk_score >= 30.0);
}

#[tokio::test]
async fn test_detection_stays_quiet_on_mixed_outcomes() {
    let engine = PortcullisBuilder::new().with_memory().build().unwrap();
    let action = ActionKind::login();
    let subject = SubjectKey::new("a@x.com");

    for _ in 0..3 {
        engine
            .complete(&action, &subject, AttemptOutcome::failed("invalid credentials"))
            .await
            .unwrap();
        engine
            .complete(&action, &subject, AttemptOutcome::succeeded())
            .await
            .unwrap();
    }

    let metrics = engine.detect(None).await.unwrap();
    assert!(!metrics
        .pattern_flags
        .contains(PatternFlag::ConsecutiveFailures));
    assert!(!metrics.pattern_flags.contains(PatternFlag::MultipleOrigins));
}

#[tokio::test]
async fn test_dashboard_aggregates_recent_activity() {
    let engine = PortcullisBuilder::new().with_memory().build().unwrap();
    let action = ActionKind::login();
    let subject = SubjectKey::new("a@x.com");

    for _ in 0..6 {
        engine
            .complete(&action, &subject, AttemptOutcome::failed("invalid credentials"))
            .await
            .unwrap();
    }

    let dashboard = engine.dashboard(None).await.unwrap();
    assert_eq!(dashboard.total_events, 6);
    assert_eq!(dashboard.risk_distribution.total(), 6);
    assert!(dashboard.recent_suspicious_activity);
    assert!(dashboard.security_score < 70.0);
    assert!(dashboard
        .recommendations
        .iter()
        .any(|r| r.contains("CAPTCHA")));
}

#[tokio::test]
async fn test_dashboard_over_quiet_engine() {
    let engine = PortcullisBuilder::new().with_memory().build().unwrap();

    let dashboard = engine.dashboard(None).await.unwrap();
    assert_eq!(dashboard.total_events, 0);
    assert_eq!(dashboard.risk_distribution.total(), 0);
    assert!(!dashboard.recent_suspicious_activity);
    assert!(dashboard.security_score >= 90.0);
}
