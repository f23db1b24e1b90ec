//! Error handling for the almanac pipeline
//!
//! This module provides idiomatic Rust error types using thiserror. The
//! taxonomy separates non-fatal upstream trouble (which degrades to
//! synthetic data or a lower generation tier) from fatal configuration
//! and validation problems that must surface immediately.

use std::fmt;

use thiserror::Error;

/// Main error type for the almanac system
#[derive(Error, Debug)]
pub enum AlmanacError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("{service} unavailable: {message}")]
    UpstreamUnavailable {
        service: UpstreamService,
        message: String,
    },

    #[error("{service} rejected the request (status {status}): {message}")]
    UpstreamRejected {
        service: UpstreamService,
        status: u16,
        message: String,
    },

    #[error("Data integrity error: {message}")]
    DataIntegrity { message: String },

    #[error("Validation failed for '{field}': {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("Unrecognized timezone identifier '{zone}'")]
    InvalidTimezone { zone: String },

    #[error("Record store error: {message}")]
    Store { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// External services the pipeline talks to, used to label upstream errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamService {
    /// The astrological computation service
    Ephemeris,
    /// Primary interpretation producer (session protocol)
    GenerationPrimary,
    /// Secondary interpretation producer (single-shot completion)
    GenerationSecondary,
}

impl fmt::Display for UpstreamService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamService::Ephemeris => write!(f, "Ephemeris service"),
            UpstreamService::GenerationPrimary => write!(f, "Primary generation service"),
            UpstreamService::GenerationSecondary => write!(f, "Secondary generation service"),
        }
    }
}

impl AlmanacError {
    pub fn configuration(message: impl Into<String>) -> Self {
        AlmanacError::Configuration {
            message: message.into(),
        }
    }

    pub fn unavailable(service: UpstreamService, message: impl Into<String>) -> Self {
        AlmanacError::UpstreamUnavailable {
            service,
            message: message.into(),
        }
    }

    pub fn rejected(service: UpstreamService, status: u16, message: impl Into<String>) -> Self {
        AlmanacError::UpstreamRejected {
            service,
            status,
            message: message.into(),
        }
    }

    pub fn data_integrity(message: impl Into<String>) -> Self {
        AlmanacError::DataIntegrity {
            message: message.into(),
        }
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        AlmanacError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        AlmanacError::Store {
            message: message.into(),
        }
    }

    /// Whether a failed generation tier should advance the fallback chain.
    ///
    /// Rate limiting, auth failures, malformed responses, timeouts and
    /// transport errors all advance. Configuration errors do not: they are
    /// fatal and must reach the caller unchanged.
    pub fn advances_fallback(&self) -> bool {
        matches!(
            self,
            AlmanacError::UpstreamUnavailable { .. }
                | AlmanacError::UpstreamRejected { .. }
                | AlmanacError::DataIntegrity { .. }
                | AlmanacError::Serialization(_)
        )
    }

    /// Classify a transport-level reqwest failure against a named service.
    pub(crate) fn from_transport(service: UpstreamService, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AlmanacError::unavailable(service, format!("request timed out: {err}"))
        } else if err.is_connect() {
            AlmanacError::unavailable(service, format!("connection failed: {err}"))
        } else {
            AlmanacError::unavailable(service, err.to_string())
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AlmanacError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_errors_advance_the_fallback_chain() {
        let rate_limited =
            AlmanacError::rejected(UpstreamService::GenerationPrimary, 429, "slow down");
        let timed_out =
            AlmanacError::unavailable(UpstreamService::GenerationPrimary, "request timed out");
        let malformed = AlmanacError::data_integrity("response missing required fields");

        assert!(rate_limited.advances_fallback());
        assert!(timed_out.advances_fallback());
        assert!(malformed.advances_fallback());
    }

    #[test]
    fn configuration_errors_are_fatal() {
        let missing = AlmanacError::configuration("GENERATION_API_KEY is not set");
        assert!(!missing.advances_fallback());
    }

    #[test]
    fn display_names_the_offending_service() {
        let err = AlmanacError::rejected(UpstreamService::Ephemeris, 503, "maintenance");
        let text = err.to_string();
        assert!(text.contains("Ephemeris service"));
        assert!(text.contains("503"));
    }
}
