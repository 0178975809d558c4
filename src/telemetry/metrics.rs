//! Metric definitions for email sending
//!
//! Only the `metrics` facade is used here. Installing a recorder/exporter is
//! left to the host application; without one these calls are no-ops.

use crate::error::Result;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Duration;

pub const EMAIL_SEND_TOTAL: &str = "mailgate_email_send_total";
pub const EMAIL_SEND_DURATION_SECONDS: &str = "mailgate_email_send_duration_seconds";

/// Register metric descriptions and emit initial zero values so exporters
/// include HELP/TYPE lines before the first send.
pub fn describe_metrics() {
    describe_counter!(
        EMAIL_SEND_TOTAL,
        "Total number of email send attempts by provider and outcome"
    );
    describe_histogram!(
        EMAIL_SEND_DURATION_SECONDS,
        "Provider call duration in seconds"
    );

    for provider in ["ses", "gmail"] {
        counter!(EMAIL_SEND_TOTAL, "provider" => provider, "outcome" => "success").absolute(0);
    }
}

/// Label value for a send result: `success` or the lowercased error reason
pub fn outcome_label(result: &Result<()>) -> String {
    match result {
        Ok(()) => "success".to_string(),
        Err(err) => err.reason().as_str().to_ascii_lowercase(),
    }
}

/// Count one send attempt
pub fn record_send(provider: &'static str, result: &Result<()>) {
    counter!(EMAIL_SEND_TOTAL, "provider" => provider, "outcome" => outcome_label(result))
        .increment(1);
}

/// Record how long the provider call took
pub fn record_send_duration(provider: &'static str, elapsed: Duration) {
    histogram!(EMAIL_SEND_DURATION_SECONDS, "provider" => provider).record(elapsed.as_secs_f64());
}
