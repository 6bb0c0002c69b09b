//! Limiter configuration
//!
//! One [`LimiterConfig`] exists per action kind. Configs are immutable after
//! startup; the [`LimiterRegistry`] is sealed when the engine is built and an
//! empty or malformed registry refuses to start rather than run with undefined
//! limits.

use std::collections::HashMap;

use chrono::Duration;

use crate::attempt::ActionKind;
use crate::error::ConfigError;

/// Default decay rate applied to idle failure counters.
pub const DEFAULT_DECAY_RATE: f64 = 0.5;

/// Limits for a single action kind.
#[derive(Debug, Clone, PartialEq)]
pub struct LimiterConfig {
    /// Failed attempts tolerated within one window before lockout.
    pub max_attempts: u32,

    /// Width of the rolling attempt window.
    pub window: Duration,

    /// Hard-block duration once `max_attempts` is reached.
    pub lockout: Duration,

    /// Exponential backoff base, `>= 1.0`.
    pub backoff_multiplier: f64,

    /// Ceiling on the computed backoff delay.
    pub max_backoff: Duration,

    /// Idle decay rate for the failure counter, `>= 0.0`.
    pub decay_rate: f64,
}

impl LimiterConfig {
    /// Login preset: 5 attempts / 15 min window / 30 min lockout / x2 backoff
    /// capped at 30 s.
    pub fn login() -> Self {
        Self {
            max_attempts: 5,
            window: Duration::minutes(15),
            lockout: Duration::minutes(30),
            backoff_multiplier: 2.0,
            max_backoff: Duration::seconds(30),
            decay_rate: DEFAULT_DECAY_RATE,
        }
    }

    /// Password reset preset: 3 attempts / 10 min window / 60 min lockout /
    /// x3 backoff capped at 60 s.
    pub fn password_reset() -> Self {
        Self {
            max_attempts: 3,
            window: Duration::minutes(10),
            lockout: Duration::minutes(60),
            backoff_multiplier: 3.0,
            max_backoff: Duration::seconds(60),
            decay_rate: DEFAULT_DECAY_RATE,
        }
    }

    /// Magic link preset: 3 attempts / 5 min window / 15 min lockout /
    /// x2 backoff capped at 15 s.
    pub fn magic_link() -> Self {
        Self {
            max_attempts: 3,
            window: Duration::minutes(5),
            lockout: Duration::minutes(15),
            backoff_multiplier: 2.0,
            max_backoff: Duration::seconds(15),
            decay_rate: DEFAULT_DECAY_RATE,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_attempts must be greater than zero".to_string(),
            ));
        }
        if self.window <= Duration::zero() {
            return Err(ConfigError::InvalidLimit(
                "window must be a positive duration".to_string(),
            ));
        }
        if self.lockout <= Duration::zero() {
            return Err(ConfigError::InvalidLimit(
                "lockout must be a positive duration".to_string(),
            ));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidLimit(
                "backoff_multiplier must be at least 1.0".to_string(),
            ));
        }
        if self.max_backoff < Duration::zero() {
            return Err(ConfigError::InvalidLimit(
                "max_backoff must not be negative".to_string(),
            ));
        }
        if self.decay_rate < 0.0 {
            return Err(ConfigError::InvalidLimit(
                "decay_rate must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Immutable per-action-kind configuration table, loaded at startup.
#[derive(Debug, Clone, Default)]
pub struct LimiterRegistry {
    configs: HashMap<ActionKind, LimiterConfig>,
}

impl LimiterRegistry {
    /// Registry with no configured action kinds. Must be populated before the
    /// engine will build.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry carrying the built-in presets for login, password reset, and
    /// magic link issuance.
    pub fn builtin() -> Self {
        Self::empty()
            .with(ActionKind::login(), LimiterConfig::login())
            .with(ActionKind::password_reset(), LimiterConfig::password_reset())
            .with(ActionKind::magic_link(), LimiterConfig::magic_link())
    }

    pub fn with(mut self, kind: ActionKind, config: LimiterConfig) -> Self {
        self.configs.insert(kind, config);
        self
    }

    pub fn insert(&mut self, kind: ActionKind, config: LimiterConfig) {
        self.configs.insert(kind, config);
    }

    pub fn get(&self, kind: &ActionKind) -> Result<&LimiterConfig, ConfigError> {
        self.configs
            .get(kind)
            .ok_or_else(|| ConfigError::UnknownActionKind(kind.to_string()))
    }

    pub fn contains(&self, kind: &ActionKind) -> bool {
        self.configs.contains_key(kind)
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn kinds(&self) -> impl Iterator<Item = &ActionKind> {
        self.configs.keys()
    }

    /// Startup validation: a registry must carry at least one well-formed
    /// config, otherwise the engine refuses to start.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.configs.is_empty() {
            return Err(ConfigError::EmptyRegistry);
        }
        for config in self.configs.values() {
            config.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_presets() {
        let registry = LimiterRegistry::builtin();
        assert_eq!(registry.len(), 3);

        let login = registry.get(&ActionKind::login()).unwrap();
        assert_eq!(login.max_attempts, 5);
        assert_eq!(login.window, Duration::minutes(15));
        assert_eq!(login.lockout, Duration::minutes(30));
        assert_eq!(login.max_backoff, Duration::seconds(30));

        let reset = registry.get(&ActionKind::password_reset()).unwrap();
        assert_eq!(reset.max_attempts, 3);
        assert_eq!(reset.backoff_multiplier, 3.0);

        let magic = registry.get(&ActionKind::magic_link()).unwrap();
        assert_eq!(magic.window, Duration::minutes(5));
        assert_eq!(magic.lockout, Duration::minutes(15));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let registry = LimiterRegistry::builtin();
        let result = registry.get(&ActionKind::new("sms_otp"));
        assert!(matches!(result, Err(ConfigError::UnknownActionKind(_))));
    }

    #[test]
    fn test_empty_registry_fails_validation() {
        let registry = LimiterRegistry::empty();
        assert!(matches!(
            registry.validate(),
            Err(ConfigError::EmptyRegistry)
        ));
        assert!(LimiterRegistry::builtin().validate().is_ok());
    }

    #[test]
    fn test_invalid_config_fails_validation() {
        let mut config = LimiterConfig::login();
        config.max_attempts = 0;
        let registry = LimiterRegistry::empty().with(ActionKind::login(), config);
        assert!(matches!(
            registry.validate(),
            Err(ConfigError::InvalidLimit(_))
        ));

        let mut config = LimiterConfig::login();
        config.backoff_multiplier = 0.5;
        assert!(config.validate().is_err());

        let mut config = LimiterConfig::login();
        config.decay_rate = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_custom_kind_registration() {
        let config = LimiterConfig {
            max_attempts: 10,
            window: Duration::minutes(1),
            lockout: Duration::minutes(5),
            backoff_multiplier: 1.5,
            max_backoff: Duration::seconds(10),
            decay_rate: 0.0,
        };
        let registry = LimiterRegistry::builtin().with(ActionKind::new("api_token"), config);
        assert_eq!(registry.len(), 4);
        assert!(registry.contains(&ActionKind::new("api_token")));
        assert!(registry.validate().is_ok());
    }
}
