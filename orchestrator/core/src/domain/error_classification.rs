// Copyright (c) 2026 flowguard contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Error Classification
//!
//! Maps a phase failure to an [`ErrorCategory`] that drives retry and
//! recovery decisions:
//!
//! | Category | Examples | Treatment |
//! |----------|----------|-----------|
//! | `Permanent` | invalid input, unauthorized, not found, type errors | never retried |
//! | `Transient` | timeouts, connection resets, rate limits, 503s | short backoff |
//! | `Resource` | memory/disk/quota exhaustion | long backoff, prefer checkpoint restore |
//! | `Unknown` | anything else | like `Transient` with a lower ceiling |
//!
//! Classification is pure pattern matching over the lower-cased message and
//! the error kind. Message patterns are checked before the kind, transient
//! patterns first, so a "connection" message is always `Transient`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Transient,
    Permanent,
    Resource,
    Unknown,
}

impl ErrorCategory {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ErrorCategory::Permanent)
    }

    /// Scale applied to the backoff delay for this category.
    pub fn backoff_multiplier(&self) -> f64 {
        match self {
            ErrorCategory::Resource => 2.0,
            ErrorCategory::Transient => 0.8,
            ErrorCategory::Permanent | ErrorCategory::Unknown => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Transient => "transient",
            ErrorCategory::Permanent => "permanent",
            ErrorCategory::Resource => "resource",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ErrorCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "transient" => Ok(ErrorCategory::Transient),
            "permanent" => Ok(ErrorCategory::Permanent),
            "resource" => Ok(ErrorCategory::Resource),
            "unknown" => Ok(ErrorCategory::Unknown),
            other => Err(format!("unknown error category '{}'", other)),
        }
    }
}

/// Failure raised by a phase body or an agent.
///
/// `kind` is the name of the underlying error type (e.g. `TimeoutError`,
/// `io::Error`) and `message` its rendered text. Both feed the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct PhaseError {
    pub kind: String,
    pub message: String,
}

impl PhaseError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Captures any error, using the last path segment of its type name as kind.
    pub fn from_error<E: std::error::Error + 'static>(err: &E) -> Self {
        let type_name = std::any::type_name::<E>();
        let kind = type_name.rsplit("::").next().unwrap_or(type_name);
        Self::new(kind, err.to_string())
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new("TimeoutError", message)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new("ConnectionError", message)
    }

    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::new("ResourceExhausted", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("ValidationError", message)
    }

    pub fn category(&self) -> ErrorCategory {
        classify(self)
    }
}

impl From<anyhow::Error> for PhaseError {
    fn from(err: anyhow::Error) -> Self {
        PhaseError::new("Error", format!("{:#}", err))
    }
}

const TRANSIENT_PATTERNS: &[&str] = &[
    "timeout",
    "timed out",
    "connection",
    "rate limit",
    "rate-limit",
    "ratelimit",
    "too many requests",
    "temporarily unavailable",
    "service unavailable",
    "unavailable",
    "try again",
    "broken pipe",
    "reset by peer",
    "503",
    "429",
];

const PERMANENT_PATTERNS: &[&str] = &[
    "invalid",
    "unauthorized",
    "forbidden",
    "not found",
    "permission denied",
    "malformed",
    "validation",
    "type error",
    "unsupported",
    "authentication failed",
];

const RESOURCE_PATTERNS: &[&str] = &[
    "out of memory",
    "memory",
    "disk full",
    "no space left",
    "disk",
    "quota",
    "resource exhausted",
    "too many open files",
    "capacity",
];

const TRANSIENT_KINDS: &[&str] = &[
    "timeouterror",
    "timeout",
    "elapsed",
    "connectionerror",
    "connectionreseterror",
    "connectionrefusederror",
    "ratelimiterror",
    "serviceunavailable",
];

const PERMANENT_KINDS: &[&str] = &[
    "valueerror",
    "typeerror",
    "keyerror",
    "validationerror",
    "permissionerror",
    "authorizationerror",
    "authenticationerror",
    "notfounderror",
    "notfound",
    "parseerror",
];

const RESOURCE_KINDS: &[&str] = &[
    "memoryerror",
    "resourceexhausted",
    "quotaexceeded",
    "diskfullerror",
    "oserror",
];

/// Classifies a phase failure. Total and side-effect free.
pub fn classify(error: &PhaseError) -> ErrorCategory {
    classify_parts(&error.kind, &error.message)
}

/// Classifies a raw (kind, message) pair.
pub fn classify_parts(kind: &str, message: &str) -> ErrorCategory {
    let message = message.to_lowercase();
    let contains_any = |patterns: &[&str]| patterns.iter().any(|p| message.contains(p));

    if contains_any(TRANSIENT_PATTERNS) {
        return ErrorCategory::Transient;
    }
    if contains_any(PERMANENT_PATTERNS) {
        return ErrorCategory::Permanent;
    }
    if contains_any(RESOURCE_PATTERNS) {
        return ErrorCategory::Resource;
    }

    let kind = kind.to_lowercase();
    if TRANSIENT_KINDS.contains(&kind.as_str()) {
        ErrorCategory::Transient
    } else if PERMANENT_KINDS.contains(&kind.as_str()) {
        ErrorCategory::Permanent
    } else if RESOURCE_KINDS.contains(&kind.as_str()) {
        ErrorCategory::Resource
    } else {
        ErrorCategory::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_messages() {
        for msg in [
            "Request Timeout after 30s",
            "CONNECTION reset",
            "Rate Limit exceeded for tenant",
            "upstream returned 503",
        ] {
            assert_eq!(classify_parts("RuntimeError", msg), ErrorCategory::Transient, "{msg}");
        }
    }

    #[test]
    fn test_permanent_messages() {
        for msg in ["Invalid field mapping", "Unauthorized", "flow Not Found"] {
            assert_eq!(classify_parts("RuntimeError", msg), ErrorCategory::Permanent, "{msg}");
        }
    }

    #[test]
    fn test_resource_messages() {
        for message in ["Out of memory", "storage quota exceeded", "No space left on device"] {
            assert_eq!(classify_parts("RuntimeError", message), ErrorCategory::Resource);
        }
    }

    #[test]
    fn test_transient_wins_over_permanent() {
        assert_eq!(
            classify_parts("ValueError", "invalid response: connection closed"),
            ErrorCategory::Transient
        );
    }

    #[test]
    fn test_kind_fallback() {
        assert_eq!(classify_parts("TypeError", "bad operand"), ErrorCategory::Permanent);
        assert_eq!(classify_parts("MemoryError", ""), ErrorCategory::Resource);
        assert_eq!(classify_parts("TimeoutError", ""), ErrorCategory::Transient);
    }

    #[test]
    fn test_unknown() {
        assert_eq!(classify_parts("RuntimeError", "something odd"), ErrorCategory::Unknown);
        assert_eq!(classify_parts("", ""), ErrorCategory::Unknown);
    }

    #[test]
    fn test_from_error_uses_type_name() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err = PhaseError::from_error(&io);
        assert_eq!(err.kind, "Error");
        assert_eq!(err.category(), ErrorCategory::Resource);
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("Resource".parse::<ErrorCategory>(), Ok(ErrorCategory::Resource));
        assert!("bogus".parse::<ErrorCategory>().is_err());
    }

    #[test]
    fn test_backoff_multipliers() {
        assert_eq!(ErrorCategory::Resource.backoff_multiplier(), 2.0);
        assert_eq!(ErrorCategory::Transient.backoff_multiplier(), 0.8);
        assert_eq!(ErrorCategory::Unknown.backoff_multiplier(), 1.0);
        assert!(!ErrorCategory::Permanent.is_retryable());
    }
}
