//! Email sending for Mailgate
//!
//! Callers depend on the [`Sender`] trait only. Two providers implement it:
//! - AWS SES ([`SesSender`])
//! - Gmail API with a delegated service account ([`GmailSender`])

pub mod gmail;
pub mod provider;
pub mod ses;
pub mod validation;

pub use gmail::GmailSender;
pub use provider::Sender;
pub use ses::SesSender;
pub use validation::{
    is_ses_address, parse_mailbox, validate_gmail_email, validate_ses_email, MailboxError,
};

use crate::config::{Config, ProviderConfig};
use anyhow::{Context, Result};
use std::sync::Arc;

/// Build the sender selected by `config`, applying the configured timeout
pub async fn build_sender(config: &Config) -> Result<Arc<dyn Sender>> {
    let sender: Arc<dyn Sender> = match &config.provider {
        ProviderConfig::Ses(settings) => {
            let sender = SesSender::from_settings(settings).await;
            match config.send_timeout {
                Some(timeout) => Arc::new(sender.with_timeout(timeout)),
                None => Arc::new(sender),
            }
        }
        ProviderConfig::Gmail(settings) => {
            let sender = GmailSender::from_settings(settings)
                .context("Failed to create Gmail sender")?;
            match config.send_timeout {
                Some(timeout) => Arc::new(sender.with_timeout(timeout)),
                None => Arc::new(sender),
            }
        }
    };

    Ok(sender)
}
