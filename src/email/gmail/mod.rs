//! Gmail email sender
//!
//! Sends through the Gmail API as a Workspace user impersonated by a service
//! account (domain-wide delegation). The message is built locally as raw
//! RFC 5322 and handed to `users.messages.send`.

pub mod client;
pub mod errors;
pub mod mime;

use super::provider::Sender;
use super::validation::validate_gmail_email;
use crate::config::GmailSettings;
use crate::domain::Email;
use crate::error::{EmailError, Result};
use crate::telemetry::metrics;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub use client::{CredentialsError, GmailClient, ServiceAccountKey};
pub use errors::{map_gmail_error, GmailApiError};

const PROVIDER_NAME: &str = "gmail";

/// Gmail user id meaning "the authenticated (impersonated) user"
pub const AUTHENTICATED_USER: &str = "me";

/// The single Gmail operation this sender needs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GmailApi: Send + Sync {
    /// Send a URL-safe base64 encoded raw message, returning the Gmail message id
    async fn send(
        &self,
        user_id: &str,
        raw: &str,
    ) -> std::result::Result<String, GmailApiError>;
}

/// Gmail sender
///
/// Addresses are checked with [`parse_mailbox`](super::validation::parse_mailbox),
/// so display-name forms such as `Jane <jane@example.com>` are accepted.
pub struct GmailSender {
    api: Arc<dyn GmailApi>,
    user_id: String,
    timeout: Option<Duration>,
}

impl GmailSender {
    pub fn new(api: Arc<dyn GmailApi>) -> Self {
        Self {
            api,
            user_id: AUTHENTICATED_USER.to_string(),
            timeout: None,
        }
    }

    /// Create a sender backed by [`GmailClient`]
    pub fn from_settings(settings: &GmailSettings) -> std::result::Result<Self, CredentialsError> {
        let client = GmailClient::from_service_account_file(
            &settings.credentials_file,
            settings.impersonate.clone(),
        )?
        .with_base_url(settings.api_base_url.clone());

        Ok(Self::new(Arc::new(client)))
    }

    /// Bound the Gmail call. An elapsed timeout is reported as `SERVICE_ERROR`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    async fn call(&self, raw: &str) -> std::result::Result<String, GmailApiError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.api.send(&self.user_id, raw))
                .await
                .unwrap_or_else(|_| Err(GmailApiError::Timeout(format!("after {:?}", limit)))),
            None => self.api.send(&self.user_id, raw).await,
        }
    }

    async fn send(&self, email: &Email) -> Result<()> {
        if let Err(err) = validate_gmail_email(email) {
            debug!(
                reason = %err.reason(),
                "Gmail email rejected by validation: {}",
                err.message()
            );
            return Err(err);
        }

        let raw = mime::encode_raw_message(email).map_err(|e| {
            EmailError::validation("failed to create message").with_source(e)
        })?;

        debug!(
            from = %email.from_address,
            recipients = email.recipients().count(),
            attachments = email.attachments.len(),
            "Sending email via Gmail"
        );

        let started = Instant::now();
        let result = self.call(&raw).await;
        metrics::record_send_duration(PROVIDER_NAME, started.elapsed());

        match result {
            Ok(message_id) => {
                info!(message_id = %message_id, "Email sent via Gmail");
                Ok(())
            }
            Err(err) => {
                let mapped = map_gmail_error(err);
                warn!(reason = %mapped.reason(), "Gmail send failed: {}", mapped);
                Err(mapped)
            }
        }
    }
}

#[async_trait]
impl Sender for GmailSender {
    async fn send_email(&self, email: &Email) -> Result<()> {
        let result = self.send(email).await;
        metrics::record_send(PROVIDER_NAME, &result);
        result
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}
