//! Anomaly detection over the audit log.
//!
//! Read-only analysis with no side effects: every pass filters recent events
//! and scores them against a small set of pattern rules. Nothing here runs on
//! the hot path; callers invoke it on demand, typically for an operator
//! dashboard.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Local, Timelike, Utc};

use crate::{
    Error,
    metrics::{PatternFlag, PatternFlags, RiskDistribution, SecurityDashboard, SecurityMetrics},
    repositories::AuditRepository,
};

/// How many of the most recent events the trailing-streak rule inspects.
const STREAK_SAMPLE: usize = 10;
/// Trailing failures needed to raise [`PatternFlag::ConsecutiveFailures`].
const STREAK_THRESHOLD: usize = 5;
const STREAK_WEIGHT: f64 = 30.0;

/// Distinct origins tolerated before [`PatternFlag::MultipleOrigins`] fires.
const ORIGIN_THRESHOLD: usize = 3;
const ORIGIN_WEIGHT: f64 = 20.0;

const BURST_WINDOW_SECS: i64 = 60;
/// Events inside the burst window tolerated before
/// [`PatternFlag::HighFrequency`] fires.
const BURST_THRESHOLD: usize = 10;
const BURST_WEIGHT: f64 = 25.0;

/// Local hours considered dead-of-night, inclusive.
const UNUSUAL_HOURS: std::ops::RangeInclusive<u32> = 2..=5;
const UNUSUAL_HOURS_WEIGHT: f64 = 10.0;

/// Risk score above which a window counts as suspicious. A consecutive-failure
/// streak is suspicious on its own, below this bar or not.
const SUSPICION_THRESHOLD: f64 = 40.0;

/// Security score below which the dashboard recommends a review.
const DEGRADED_SCORE: f64 = 70.0;

/// Window the dashboard samples for its recent-activity verdict.
fn recent_window() -> Duration {
    Duration::hours(1)
}

/// Service computing [`SecurityMetrics`] and the operator dashboard from
/// recent audit events.
pub struct AnomalyService<A: AuditRepository> {
    repository: Arc<A>,
}

impl<A: AuditRepository> AnomalyService<A> {
    pub fn new(repository: Arc<A>) -> Self {
        Self { repository }
    }

    /// Score the events inside `window` against the pattern rules.
    pub async fn detect_suspicious_patterns(
        &self,
        window: Duration,
    ) -> Result<SecurityMetrics, Error> {
        self.detect_at(window, Utc::now()).await
    }

    /// Aggregate the events inside `window` into an operator-facing summary.
    pub async fn dashboard(&self, window: Duration) -> Result<SecurityDashboard, Error> {
        self.dashboard_at(window, Utc::now()).await
    }

    async fn detect_at(
        &self,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<SecurityMetrics, Error> {
        let events = self.repository.events_since(now - window).await?;

        let mut flags = PatternFlags::new();
        let mut risk_score = 0.0;

        // Trailing failure streak among the most recent events.
        let tail = &events[events.len().saturating_sub(STREAK_SAMPLE)..];
        let streak = tail.iter().rev().take_while(|e| !e.success).count();
        if streak >= STREAK_THRESHOLD {
            flags.insert(PatternFlag::ConsecutiveFailures);
            risk_score += STREAK_WEIGHT;
        }

        let origins: HashSet<&str> = events.iter().filter_map(|e| e.origin.as_deref()).collect();
        if origins.len() > ORIGIN_THRESHOLD {
            flags.insert(PatternFlag::MultipleOrigins);
            risk_score += ORIGIN_WEIGHT;
        }

        let burst_cutoff = now - Duration::seconds(BURST_WINDOW_SECS);
        let burst = events.iter().filter(|e| e.timestamp > burst_cutoff).count();
        if burst > BURST_THRESHOLD {
            flags.insert(PatternFlag::HighFrequency);
            risk_score += BURST_WEIGHT;
        }

        let local_hour = now.with_timezone(&Local).hour();
        if UNUSUAL_HOURS.contains(&local_hour) {
            flags.insert(PatternFlag::UnusualHours);
            risk_score += UNUSUAL_HOURS_WEIGHT;
        }

        Ok(SecurityMetrics {
            suspicious_activity: risk_score > SUSPICION_THRESHOLD
                || flags.contains(PatternFlag::ConsecutiveFailures),
            risk_score: risk_score.min(100.0),
            pattern_flags: flags,
        })
    }

    async fn dashboard_at(
        &self,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<SecurityDashboard, Error> {
        let events = self.repository.events_since(now - window).await?;

        let mut risk_distribution = RiskDistribution::default();
        let mut successes = 0usize;
        for event in &events {
            risk_distribution.record(event.risk_level);
            if event.success {
                successes += 1;
            }
        }

        let success_rate = if events.is_empty() {
            1.0
        } else {
            successes as f64 / events.len() as f64
        };

        let metrics = self.detect_at(recent_window(), now).await?;
        let security_score =
            (100.0 - metrics.risk_score - (1.0 - success_rate) * 20.0).max(0.0);

        Ok(SecurityDashboard {
            total_events: events.len(),
            risk_distribution,
            recent_suspicious_activity: metrics.suspicious_activity,
            security_score,
            recommendations: recommendations(&metrics.pattern_flags, security_score),
        })
    }
}

fn recommendations(flags: &PatternFlags, security_score: f64) -> Vec<String> {
    let mut out = Vec::new();

    if flags.contains(PatternFlag::ConsecutiveFailures) {
        out.push(
            "Repeated failed attempts detected; enable CAPTCHA or step-up verification"
                .to_string(),
        );
    }
    if flags.contains(PatternFlag::MultipleOrigins) {
        out.push(
            "Attempts arriving from several origins; review for credential stuffing".to_string(),
        );
    }
    if flags.contains(PatternFlag::HighFrequency) {
        out.push("Request burst exceeds normal thresholds; consider stricter limits".to_string());
    }
    if flags.contains(PatternFlag::UnusualHours) {
        out.push("Off-hours activity observed; consider additional verification".to_string());
    }
    if security_score < DEGRADED_SCORE {
        out.push("Security score is degraded; review recent failed activity".to_string());
    }

    out
}
