//! Core functionality for the portcullis engine
//!
//! This crate contains the data model, repository traits, and services behind
//! the portcullis rate-limiting and security-audit engine. It carries no
//! storage implementation; backends implement the repository traits and are
//! injected through a [`repositories::RepositoryProvider`].
//!
//! Most applications depend on the `portcullis` crate instead, which wires
//! these services into a single gateway.

pub mod attempt;
pub mod bus;
pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod repositories;
pub mod services;
pub mod validation;

pub use attempt::{ActionKind, AttemptKey, AttemptRecord, AttemptSnapshot, LimitStatus, SubjectKey};
pub use bus::{Event, EventBus, EventHandler, UnlockReason};
pub use config::{DEFAULT_DECAY_RATE, LimiterConfig, LimiterRegistry};
pub use error::Error;
pub use event::{EventId, EventType, SecurityEvent, mask_origin};
pub use metrics::{
    PatternFlag, PatternFlags, RiskDistribution, RiskLevel, SecurityDashboard, SecurityMetrics,
};
