//! Security event model
//!
//! One [`SecurityEvent`] is written per guarded-action outcome. Events are
//! immutable once written; the audit store appends them into a bounded buffer
//! and evicts oldest-first when it overflows.

use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use rand::{TryRngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::attempt::{ActionKind, SubjectKey};
use crate::error::{Error, ValidationError};
use crate::metrics::RiskLevel;

/// A unique, stable identifier for a security event.
///
/// Ids are prefixed (`evt_...`), URL-safe, and carry 96 bits of entropy. Treat
/// the value as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: &str) -> Self {
        EventId(id.to_string())
    }

    pub fn new_random() -> Self {
        let mut bytes = [0u8; 12];
        OsRng
            .try_fill_bytes(&mut bytes)
            .expect("OS entropy source unavailable");
        EventId(format!("evt_{}", BASE64_URL_SAFE_NO_PAD.encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new_random()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Category of a security event.
///
/// The well-known categories map one-to-one onto the built-in action kinds;
/// anything else round-trips through [`EventType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    LoginAttempt,
    PasswordReset,
    MagicLinkRequest,
    SuspiciousActivity,
    Other(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::LoginAttempt => "login_attempt",
            EventType::PasswordReset => "password_reset",
            EventType::MagicLinkRequest => "magic_link_request",
            EventType::SuspiciousActivity => "suspicious_activity",
            EventType::Other(s) => s,
        }
    }

    /// Event category for an outcome of the given guarded action.
    pub fn for_action(action: &ActionKind) -> Self {
        match action.as_str() {
            "login" => EventType::LoginAttempt,
            "password_reset" => EventType::PasswordReset,
            "magic_link" => EventType::MagicLinkRequest,
            other => EventType::Other(other.to_string()),
        }
    }
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "login_attempt" => EventType::LoginAttempt,
            "password_reset" => EventType::PasswordReset,
            "magic_link_request" => EventType::MagicLinkRequest,
            "suspicious_activity" => EventType::SuspiciousActivity,
            _ => EventType::Other(s),
        }
    }
}

impl From<EventType> for String {
    fn from(event_type: EventType) -> Self {
        event_type.as_str().to_string()
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Mask a client network origin before it enters an event.
///
/// The output is a stable one-way digest usable for correlation across events
/// while never exposing the raw address.
pub fn mask_origin(origin: &str) -> String {
    use std::hash::{DefaultHasher, Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    origin.hash(&mut hasher);
    format!("org_{:016x}", hasher.finish())
}

/// One audited guarded-action outcome. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub id: EventId,
    pub event_type: EventType,

    /// Identity hint for the attempt, when the caller knows one.
    pub subject: Option<SubjectKey>,

    /// Masked client origin; never the raw address.
    pub origin: Option<String>,

    pub user_agent: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
    pub risk_level: RiskLevel,

    /// Free-form caller-supplied context.
    pub metadata: Map<String, Value>,

    pub timestamp: DateTime<Utc>,
    pub session_id: Option<String>,
}

impl SecurityEvent {
    pub fn builder() -> SecurityEventBuilder {
        SecurityEventBuilder::default()
    }
}

#[derive(Default)]
pub struct SecurityEventBuilder {
    event_type: Option<EventType>,
    subject: Option<SubjectKey>,
    origin: Option<String>,
    user_agent: Option<String>,
    success: bool,
    error_message: Option<String>,
    risk_level: RiskLevel,
    metadata: Map<String, Value>,
    timestamp: Option<DateTime<Utc>>,
    session_id: Option<String>,
}

impl SecurityEventBuilder {
    pub fn event_type(mut self, event_type: EventType) -> Self {
        self.event_type = Some(event_type);
        self
    }

    pub fn subject(mut self, subject: SubjectKey) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Record the client origin; the value is masked here, raw input never
    /// reaches the event.
    pub fn origin(mut self, origin: Option<&str>) -> Self {
        self.origin = origin.map(mask_origin);
        self
    }

    pub fn user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub fn success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    pub fn error_message(mut self, error_message: Option<String>) -> Self {
        self.error_message = error_message;
        self
    }

    pub fn risk_level(mut self, risk_level: RiskLevel) -> Self {
        self.risk_level = risk_level;
        self
    }

    pub fn metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn session_id(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn build(self) -> Result<SecurityEvent, Error> {
        Ok(SecurityEvent {
            id: EventId::new_random(),
            event_type: self.event_type.ok_or(ValidationError::MissingField(
                "event_type is required".to_string(),
            ))?,
            subject: self.subject,
            origin: self.origin,
            user_agent: self.user_agent,
            success: self.success,
            error_message: self.error_message,
            risk_level: self.risk_level,
            metadata: self.metadata,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            session_id: self.session_id,
        })
    }
}
