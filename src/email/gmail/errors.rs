//! Gmail API error classification
//!
//! The Gmail API has no stable machine-readable code for every failure
//! class, so classification keys on the HTTP status and then on substrings
//! of the error message. Message matching is case-insensitive. Any change in
//! Google's wording should show up as a failing fixture test below.

use crate::error::{EmailError, ErrorReason};
use std::borrow::Cow;
use thiserror::Error;

/// Error returned by a [`GmailApi`](super::GmailApi) implementation
#[derive(Debug, Error)]
pub enum GmailApiError {
    /// The API answered with an HTTP error status
    #[error("googleapi: Error {code}: {message}")]
    Api { code: u16, message: String },

    /// The request did not complete in time
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The request never produced an API answer
    #[error("{0}")]
    Other(String),
}

/// Classify an API error by HTTP status and message text
pub fn classify_status(status: u16, message: &str) -> (ErrorReason, Cow<'static, str>) {
    let message = message.to_lowercase();
    let has = |needle: &str| message.contains(needle);

    let (reason, text) = match status {
        400 => {
            if has("invalid") && (has("recipient") || has("email") || has("address")) {
                (ErrorReason::InvalidEmail, "invalid email address")
            } else if has("malformed") || has("encoding") {
                (ErrorReason::ValidationError, "invalid message format")
            } else if has("too large") || has("size") {
                (ErrorReason::ValidationError, "message too large")
            } else {
                (ErrorReason::ValidationError, "invalid request parameters")
            }
        }
        401 => (
            ErrorReason::ValidationError,
            "authentication failed - check service account credentials",
        ),
        403 => {
            if has("scope") || has("permission") {
                (
                    ErrorReason::UnverifiedDomain,
                    "insufficient permissions to send email",
                )
            } else if has("domain") {
                (ErrorReason::UnverifiedDomain, "domain policy prevents sending")
            } else if has("blocked") {
                (ErrorReason::MessageRejected, "sender blocked by recipient")
            } else {
                (ErrorReason::UnverifiedDomain, "permission denied")
            }
        }
        429 => {
            if has("quota") {
                (ErrorReason::RateLimited, "Gmail API quota exceeded")
            } else if has("rate") {
                (ErrorReason::RateLimited, "Gmail API rate limit exceeded")
            } else {
                (ErrorReason::RateLimited, "too many requests")
            }
        }
        500 => (ErrorReason::ServiceError, "internal Gmail server error"),
        503 => (
            ErrorReason::ServiceError,
            "Gmail service temporarily unavailable",
        ),
        504 => (ErrorReason::ServiceError, "Gmail API request timeout"),
        other => {
            return (
                ErrorReason::ServiceError,
                Cow::Owned(format!("Gmail API error (HTTP {})", other)),
            )
        }
    };

    (reason, Cow::Borrowed(text))
}

/// Classify an error that carries no HTTP status
pub fn classify_message(message: &str) -> (ErrorReason, &'static str) {
    let message = message.to_lowercase();

    if message.contains("context") && message.contains("deadline") {
        (ErrorReason::ServiceError, "request timeout")
    } else if message.contains("connection") || message.contains("network") {
        (ErrorReason::ServiceError, "network error")
    } else {
        (ErrorReason::Unknown, "Gmail API error")
    }
}

/// Translate a Gmail API failure into an [`EmailError`] that keeps the original as its source
pub fn map_gmail_error(err: GmailApiError) -> EmailError {
    let (reason, message) = match &err {
        GmailApiError::Api { code, message } => classify_status(*code, message),
        GmailApiError::Timeout(_) => (ErrorReason::ServiceError, Cow::Borrowed("request timeout")),
        GmailApiError::Other(message) => {
            let (reason, text) = classify_message(message);
            (reason, Cow::Borrowed(text))
        }
    };

    EmailError::new(reason, message).with_source(err)
}
