//! Notification bus for limiter state transitions
//!
//! Events are emitted when a key crosses a limiter boundary: a failed attempt
//! was recorded, a subject became locked, or a subject was unlocked. Handlers
//! registered with the [`EventBus`] receive every event; the gateway treats
//! handler failures as diagnostics and never lets them reach the guarded
//! action.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::attempt::AttemptKey;
use crate::error::EventError;

/// Reason why a subject key was unlocked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum UnlockReason {
    /// Lockout period expired naturally.
    LockoutExpired,
    /// Administrator manually reset the key.
    AdminAction,
}

/// Limiter state transitions observable by the host application.
///
/// These are notification events, distinct from the audit log: the audit log
/// records every guarded-action outcome, while the bus only fires on limiter
/// boundaries worth alerting on.
#[derive(Debug, Clone)]
pub enum Event {
    /// A failed attempt was recorded for a key that is not yet locked.
    AttemptFailed {
        key: AttemptKey,
        failed_attempts: u32,
        timestamp: DateTime<Utc>,
    },

    /// A key crossed its attempt limit and is now hard-blocked.
    SubjectLocked {
        key: AttemptKey,
        failed_attempts: u32,
        locked_until: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    /// A key left the locked state.
    SubjectUnlocked {
        key: AttemptKey,
        reason: UnlockReason,
        timestamp: DateTime<Utc>,
    },
}

/// A handler for limiter transition events.
///
/// Implementors are registered with the [`EventBus`] and called for each
/// emitted event. Handlers must be cheap or hand off to their own tasks; the
/// bus awaits each handler in turn.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle_event(&self, event: &Event) -> Result<(), EventError>;
}

/// Event bus that emits limiter transitions to registered handlers.
#[derive(Clone)]
pub struct EventBus {
    handlers: Arc<RwLock<Vec<Arc<dyn EventHandler>>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register an event handler. Handlers cannot be removed; the set is
    /// expected to be fixed shortly after startup.
    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        self.handlers.write().await.push(handler);
    }

    /// Emit an event to all registered handlers. The first handler error stops
    /// dispatch and is returned to the caller.
    pub async fn emit(&self, event: &Event) -> Result<(), EventError> {
        for handler in self.handlers.read().await.iter() {
            handler.handle_event(event).await?;
        }

        Ok(())
    }
}
