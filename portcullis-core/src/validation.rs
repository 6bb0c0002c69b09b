//! Input validation for the engine's external surface
//!
//! A single source of truth for validating the strings callers hand to the
//! gateway. Subject keys are usually email addresses; action kinds are the
//! lowercase snake_case names the limiter registry is keyed by.

use crate::error::ValidationError;
use regex::Regex;
use std::sync::LazyLock;

/// Practical subset of RFC 5322, applied when a subject key looks like an
/// email address.
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("Invalid email regex pattern")
});

static ACTION_KIND_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z][a-z0-9_]*$").expect("Invalid action kind regex pattern")
});

/// Validates a subject key.
///
/// Subject keys must be non-empty, printable, and at most 320 characters.
/// Keys containing `@` are additionally held to email shape, since an email
/// address is the expected identity for the built-in action kinds.
pub fn validate_subject_key(subject: &str) -> Result<(), ValidationError> {
    if subject.is_empty() {
        return Err(ValidationError::MissingField(
            "Subject key is required".to_string(),
        ));
    }

    if subject.len() > 320 {
        return Err(ValidationError::InvalidSubjectKey(
            "Subject key is too long".to_string(),
        ));
    }

    if subject.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ValidationError::InvalidSubjectKey(
            "Subject key must not contain whitespace or control characters".to_string(),
        ));
    }

    if subject.contains('@') && !EMAIL_REGEX.is_match(subject) {
        return Err(ValidationError::InvalidSubjectKey(format!(
            "Invalid email format: {subject}"
        )));
    }

    Ok(())
}

/// Validates an action kind name.
///
/// Kinds are lowercase snake_case, at most 64 characters.
pub fn validate_action_kind(kind: &str) -> Result<(), ValidationError> {
    if kind.is_empty() {
        return Err(ValidationError::MissingField(
            "Action kind is required".to_string(),
        ));
    }

    if kind.len() > 64 {
        return Err(ValidationError::InvalidActionKind(
            "Action kind is too long".to_string(),
        ));
    }

    if !ACTION_KIND_REGEX.is_match(kind) {
        return Err(ValidationError::InvalidActionKind(format!(
            "Action kind must be lowercase snake_case: {kind}"
        )));
    }

    Ok(())
}
