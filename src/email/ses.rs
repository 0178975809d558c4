//! AWS SES email sender
//!
//! Maps an [`Email`] field by field onto an SES v2 `SendEmail` request and
//! classifies SES error codes into [`ErrorReason`]s.

use super::provider::Sender;
use super::validation::validate_ses_email;
use crate::config::SesSettings;
use crate::domain::{Attachment, Email};
use crate::error::{EmailError, ErrorReason, Result};
use crate::telemetry::metrics;
use async_trait::async_trait;
use aws_sdk_sesv2::{
    config::Region,
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    primitives::Blob,
    types::{
        Attachment as SesAttachment, AttachmentContentDisposition, Body, Content, Destination,
        EmailContent, Message,
    },
    Client,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

const PROVIDER_NAME: &str = "ses";
const CHARSET: &str = "UTF-8";

/// A fully mapped SES v2 `SendEmail` request
#[derive(Debug, Clone)]
pub struct SesSendRequest {
    pub from_email_address: String,
    pub destination: Destination,
    pub reply_to_addresses: Vec<String>,
    pub content: EmailContent,
    pub configuration_set_name: Option<String>,
}

/// Error returned by an [`SesApi`] implementation
#[derive(Debug, Error)]
pub enum SesApiError {
    /// Structured API error carrying an SES error code
    #[error("api error {code}: {message}")]
    Service { code: String, message: String },

    /// Anything without an error code: dispatch failures, timeouts, bad responses
    #[error("{0}")]
    Transport(String),
}

impl SesApiError {
    fn from_sdk<E, R>(err: SdkError<E, R>) -> Self
    where
        E: ProvideErrorMetadata + std::error::Error + 'static,
        R: std::fmt::Debug,
    {
        let coded = err.as_service_error().and_then(|service_err| {
            service_err.code().map(|code| {
                (
                    code.to_string(),
                    service_err.message().unwrap_or_default().to_string(),
                )
            })
        });

        match coded {
            Some((code, message)) => SesApiError::Service { code, message },
            None => SesApiError::Transport(DisplayErrorContext(&err).to_string()),
        }
    }
}

/// The single SES operation this sender needs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SesApi: Send + Sync {
    /// Send the request, returning the SES message id when one is reported
    async fn send_email(
        &self,
        request: SesSendRequest,
    ) -> std::result::Result<Option<String>, SesApiError>;
}

#[async_trait]
impl SesApi for Client {
    async fn send_email(
        &self,
        request: SesSendRequest,
    ) -> std::result::Result<Option<String>, SesApiError> {
        let reply_to =
            (!request.reply_to_addresses.is_empty()).then_some(request.reply_to_addresses);

        let output = Client::send_email(self)
            .from_email_address(request.from_email_address)
            .destination(request.destination)
            .set_reply_to_addresses(reply_to)
            .content(request.content)
            .set_configuration_set_name(request.configuration_set_name)
            .send()
            .await
            .map_err(SesApiError::from_sdk)?;

        Ok(output.message_id().map(str::to_string))
    }
}

/// Classify an SES error code. `None` means the code is not one we recognise.
pub fn classify_code(code: &str) -> Option<(ErrorReason, &'static str)> {
    let classified = match code {
        "TooManyRequestsException" => (ErrorReason::RateLimited, "sending rate limit exceeded"),
        "MessageRejected" => (ErrorReason::MessageRejected, "message rejected by SES"),
        "MailFromDomainNotVerifiedException" => {
            (ErrorReason::UnverifiedDomain, "sender domain not verified")
        }
        "InvalidParameterValueException" => (ErrorReason::InvalidEmail, "invalid email parameter"),
        "ServiceUnavailableException" | "InternalServiceErrorException" => {
            (ErrorReason::ServiceError, "AWS SES service error")
        }
        _ => return None,
    };
    Some(classified)
}

/// Translate an SES failure into an [`EmailError`] that keeps the original as its source
pub fn map_ses_error(err: SesApiError) -> EmailError {
    let classified = match &err {
        SesApiError::Service { code, .. } => classify_code(code),
        SesApiError::Transport(_) => None,
    };

    let (reason, message) = classified.unwrap_or((ErrorReason::Unknown, "failed to send email"));
    EmailError::new(reason, message).with_source(err)
}

fn utf8_content(data: &str) -> std::result::Result<Content, aws_sdk_sesv2::error::BuildError> {
    Content::builder().data(data).charset(CHARSET).build()
}

fn optional_content(
    data: &str,
) -> std::result::Result<Option<Content>, aws_sdk_sesv2::error::BuildError> {
    if data.is_empty() {
        return Ok(None);
    }
    utf8_content(data).map(Some)
}

fn non_empty(addresses: &[String]) -> Option<Vec<String>> {
    (!addresses.is_empty()).then(|| addresses.to_vec())
}

fn attachment_to_ses(
    attachment: &Attachment,
) -> std::result::Result<SesAttachment, aws_sdk_sesv2::error::BuildError> {
    SesAttachment::builder()
        .file_name(&attachment.file_name)
        .raw_content(Blob::new(attachment.content.clone()))
        .content_type(&attachment.content_type)
        .set_content_description(
            (!attachment.description.is_empty()).then(|| attachment.description.clone()),
        )
        .content_disposition(AttachmentContentDisposition::Attachment)
        .build()
}

/// Map an email onto an SES request. No validation happens here.
pub fn build_request(
    email: &Email,
    configuration_set_name: Option<String>,
) -> std::result::Result<SesSendRequest, aws_sdk_sesv2::error::BuildError> {
    let destination = Destination::builder()
        .set_to_addresses(non_empty(&email.to_addresses))
        .set_cc_addresses(non_empty(&email.cc_addresses))
        .set_bcc_addresses(non_empty(&email.bcc_addresses))
        .build();

    let body = Body::builder()
        .set_html(optional_content(&email.html_body)?)
        .set_text(optional_content(&email.text_body)?)
        .build();

    let attachments = email
        .attachments
        .iter()
        .map(attachment_to_ses)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let message = Message::builder()
        .subject(utf8_content(&email.subject)?)
        .body(body)
        .set_attachments((!attachments.is_empty()).then_some(attachments))
        .build();

    Ok(SesSendRequest {
        from_email_address: email.from_address.clone(),
        destination,
        reply_to_addresses: email.reply_to_addresses.clone(),
        content: EmailContent::builder().simple(message).build(),
        configuration_set_name,
    })
}

/// AWS SES sender
///
/// Addresses are checked with [`is_ses_address`](super::validation::is_ses_address);
/// SES performs the strict checks itself and reports them as
/// `InvalidParameterValue`.
pub struct SesSender {
    api: Arc<dyn SesApi>,
    configuration_set: Option<String>,
    timeout: Option<Duration>,
}

impl SesSender {
    pub fn new(api: Arc<dyn SesApi>) -> Self {
        Self {
            api,
            configuration_set: None,
            timeout: None,
        }
    }

    /// Create a sender backed by the AWS SDK client.
    ///
    /// This is async because the AWS SDK loads credentials.
    pub async fn from_settings(settings: &SesSettings) -> Self {
        let region = Region::new(settings.region.clone());

        let sdk_config = if let (Some(access_key), Some(secret_key)) =
            (&settings.access_key_id, &settings.secret_access_key)
        {
            let credentials = aws_sdk_sesv2::config::Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "mailgate-ses",
            );

            aws_config::from_env()
                .region(region)
                .credentials_provider(credentials)
                .load()
                .await
        } else {
            // Default credential chain (IAM role, env vars, profile)
            aws_config::from_env().region(region).load().await
        };

        let sender = Self::new(Arc::new(Client::new(&sdk_config)));
        match &settings.configuration_set {
            Some(set) => sender.with_configuration_set(set.clone()),
            None => sender,
        }
    }

    pub fn with_configuration_set(mut self, configuration_set: impl Into<String>) -> Self {
        self.configuration_set = Some(configuration_set.into());
        self
    }

    /// Bound the SES call. An elapsed timeout is reported as `UNKNOWN_ERROR`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    async fn call(
        &self,
        request: SesSendRequest,
    ) -> std::result::Result<Option<String>, SesApiError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.api.send_email(request))
                .await
                .unwrap_or_else(|_| {
                    Err(SesApiError::Transport(format!(
                        "request timed out after {:?}",
                        limit
                    )))
                }),
            None => self.api.send_email(request).await,
        }
    }

    async fn send(&self, email: &Email) -> Result<()> {
        if let Err(err) = validate_ses_email(email) {
            debug!(
                reason = %err.reason(),
                "SES email rejected by validation: {}",
                err.message()
            );
            return Err(err);
        }

        let request = build_request(email, self.configuration_set.clone()).map_err(|e| {
            EmailError::validation("failed to create message").with_source(e)
        })?;

        debug!(
            from = %email.from_address,
            recipients = email.recipients().count(),
            attachments = email.attachments.len(),
            "Sending email via SES"
        );

        let started = Instant::now();
        let result = self.call(request).await;
        metrics::record_send_duration(PROVIDER_NAME, started.elapsed());

        match result {
            Ok(message_id) => {
                info!(message_id = message_id.as_deref().unwrap_or(""), "Email sent via SES");
                Ok(())
            }
            Err(err) => {
                let mapped = map_ses_error(err);
                warn!(reason = %mapped.reason(), "SES send failed: {}", mapped);
                Err(mapped)
            }
        }
    }
}

#[async_trait]
impl Sender for SesSender {
    async fn send_email(&self, email: &Email) -> Result<()> {
        let result = self.send(email).await;
        metrics::record_send(PROVIDER_NAME, &result);
        result
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}
