//! Unified error handling for Mailgate Core
//!
//! Every sender backend reports failures as an [`EmailError`] carrying one
//! [`ErrorReason`]. Provider-native errors never cross the sender boundary
//! unwrapped; they are kept as the error's `source()` for diagnostics.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Boxed provider-native error kept as the cause of an [`EmailError`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Library-wide result type
pub type Result<T> = std::result::Result<T, EmailError>;

/// Closed set of failure categories shared by all providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorReason {
    #[serde(rename = "UNKNOWN_ERROR")]
    Unknown,
    #[serde(rename = "RATE_LIMITED")]
    RateLimited,
    #[serde(rename = "INVALID_EMAIL")]
    InvalidEmail,
    #[serde(rename = "UNVERIFIED_DOMAIN")]
    UnverifiedDomain,
    #[serde(rename = "MESSAGE_REJECTED")]
    MessageRejected,
    #[serde(rename = "SERVICE_ERROR")]
    ServiceError,
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
}

impl ErrorReason {
    pub const ALL: [ErrorReason; 7] = [
        ErrorReason::Unknown,
        ErrorReason::RateLimited,
        ErrorReason::InvalidEmail,
        ErrorReason::UnverifiedDomain,
        ErrorReason::MessageRejected,
        ErrorReason::ServiceError,
        ErrorReason::ValidationError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN_ERROR",
            Self::RateLimited => "RATE_LIMITED",
            Self::InvalidEmail => "INVALID_EMAIL",
            Self::UnverifiedDomain => "UNVERIFIED_DOMAIN",
            Self::MessageRejected => "MESSAGE_REJECTED",
            Self::ServiceError => "SERVICE_ERROR",
            Self::ValidationError => "VALIDATION_ERROR",
        }
    }

    /// Whether a caller-side retry can reasonably succeed.
    ///
    /// Only a hint for callers; nothing in this crate retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::ServiceError)
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by every [`Sender`](crate::email::Sender)
#[derive(Error, Debug)]
#[error("{reason}: {message}.{}", render_cause(.source))]
pub struct EmailError {
    reason: ErrorReason,
    message: String,
    #[source]
    source: Option<BoxError>,
}

fn render_cause(source: &Option<BoxError>) -> String {
    match source {
        Some(cause) => format!(" Cause: {}", cause),
        None => String::new(),
    }
}

impl EmailError {
    pub fn new(reason: ErrorReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
            source: None,
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorReason::Unknown, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorReason::RateLimited, message)
    }

    pub fn invalid_email(message: impl Into<String>) -> Self {
        Self::new(ErrorReason::InvalidEmail, message)
    }

    pub fn unverified_domain(message: impl Into<String>) -> Self {
        Self::new(ErrorReason::UnverifiedDomain, message)
    }

    pub fn message_rejected(message: impl Into<String>) -> Self {
        Self::new(ErrorReason::MessageRejected, message)
    }

    pub fn service(message: impl Into<String>) -> Self {
        Self::new(ErrorReason::ServiceError, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorReason::ValidationError, message)
    }

    /// Attach the underlying cause
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn reason(&self) -> ErrorReason {
        self.reason
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Take ownership of the wrapped cause, if any
    pub fn into_source(self) -> Option<BoxError> {
        self.source
    }
}
