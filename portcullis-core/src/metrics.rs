//! Derived risk and anomaly reporting types
//!
//! Everything in this module is computed on demand from the audit log or the
//! attempt store and is never persisted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Qualitative measure of how suspicious recent activity for a key or window is.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named anomaly signal contributing to the risk score.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternFlag {
    /// Trailing streak of failures among the most recent events.
    ConsecutiveFailures,
    /// Events arriving from more distinct origins than one client plausibly has.
    MultipleOrigins,
    /// Burst of events inside the last minute.
    HighFrequency,
    /// Activity during the local dead-of-night hours.
    UnusualHours,
}

/// Set of pattern flags raised by one detection pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PatternFlags(BTreeSet<PatternFlag>);

impl PatternFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, flag: PatternFlag) {
        self.0.insert(flag);
    }

    pub fn contains(&self, flag: PatternFlag) -> bool {
        self.0.contains(&flag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PatternFlag> {
        self.0.iter()
    }
}

impl FromIterator<PatternFlag> for PatternFlags {
    fn from_iter<I: IntoIterator<Item = PatternFlag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Summary produced by one anomaly detection pass over a recent window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityMetrics {
    pub suspicious_activity: bool,

    /// Composite score in `0..=100`.
    pub risk_score: f64,

    pub pattern_flags: PatternFlags,
}

/// Event counts bucketed by risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RiskDistribution {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

impl RiskDistribution {
    pub fn record(&mut self, level: RiskLevel) {
        match level {
            RiskLevel::Low => self.low += 1,
            RiskLevel::Medium => self.medium += 1,
            RiskLevel::High => self.high += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.low + self.medium + self.high
    }
}

/// Operator-facing aggregation over a reporting window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityDashboard {
    pub total_events: usize,
    pub risk_distribution: RiskDistribution,
    pub recent_suspicious_activity: bool,

    /// `max(0, 100 - risk_score - (1 - success_rate) * 20)`.
    pub security_score: f64,

    pub recommendations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert_eq!(RiskLevel::default(), RiskLevel::Low);
    }

    #[test]
    fn test_risk_level_serde() {
        assert_eq!(
            serde_json::to_string(&RiskLevel::Medium).unwrap(),
            "\"medium\""
        );
        let level: RiskLevel = serde_json::from_str("\"high\"").unwrap();
        assert_eq!(level, RiskLevel::High);
    }

    #[test]
    fn test_pattern_flag_serde() {
        assert_eq!(
            serde_json::to_string(&PatternFlag::ConsecutiveFailures).unwrap(),
            "\"CONSECUTIVE_FAILURES\""
        );
        assert_eq!(
            serde_json::to_string(&PatternFlag::HighFrequency).unwrap(),
            "\"HIGH_FREQUENCY\""
        );
    }

    #[test]
    fn test_pattern_flags_set_semantics() {
        let mut flags = PatternFlags::new();
        assert!(flags.is_empty());

        flags.insert(PatternFlag::MultipleOrigins);
        flags.insert(PatternFlag::MultipleOrigins);
        assert_eq!(flags.len(), 1);
        assert!(flags.contains(PatternFlag::MultipleOrigins));
        assert!(!flags.contains(PatternFlag::UnusualHours));
    }

    #[test]
    fn test_risk_distribution_record() {
        let mut distribution = RiskDistribution::default();
        distribution.record(RiskLevel::Low);
        distribution.record(RiskLevel::Low);
        distribution.record(RiskLevel::High);

        assert_eq!(distribution.low, 2);
        assert_eq!(distribution.medium, 0);
        assert_eq!(distribution.high, 1);
        assert_eq!(distribution.total(), 3);
    }
}
