//! Request and response types for the HTTP facade.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use portcullis::{AttemptOutcome, RiskLevel, Verdict};

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub action: String,
    pub subject: String,
}

#[derive(Debug, Serialize)]
pub struct VerdictResponse {
    pub allow: bool,
    pub delay_ms: u64,
    pub remaining: u32,
    pub risk_level: RiskLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl From<Verdict> for VerdictResponse {
    fn from(verdict: Verdict) -> Self {
        Self {
            allow: verdict.allow,
            delay_ms: verdict.delay.num_milliseconds().max(0) as u64,
            remaining: verdict.remaining,
            risk_level: verdict.risk_level,
            retry_after_ms: verdict
                .retry_after
                .map(|d| d.num_milliseconds().max(0) as u64),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub action: String,
    pub subject: String,
    pub success: bool,
    #[serde(default)]
    pub error_detail: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl CompleteRequest {
    pub fn into_outcome(self) -> AttemptOutcome {
        AttemptOutcome {
            success: self.success,
            error_detail: self.error_detail,
            origin: self.origin,
            user_agent: self.user_agent,
            session_id: self.session_id,
            metadata: self.metadata,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub action: String,
    pub subject: String,
}

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    /// Reporting window in hours; the engine default applies when omitted.
    pub hours: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}
