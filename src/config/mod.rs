//! Configuration management for Mailgate Core

use anyhow::{bail, Context, Result};
use std::env;
use std::fmt;
use std::time::Duration;
use validator::Validate;

pub const DEFAULT_AWS_REGION: &str = "us-east-1";
pub const DEFAULT_GMAIL_API_BASE_URL: &str = crate::email::gmail::client::DEFAULT_API_BASE_URL;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Which provider sends the mail, with its settings
    pub provider: ProviderConfig,
    /// Optional bound on each provider call
    pub send_timeout: Option<Duration>,
    /// Logging configuration
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone)]
pub enum ProviderConfig {
    Ses(SesSettings),
    Gmail(GmailSettings),
}

impl ProviderConfig {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderConfig::Ses(_) => "ses",
            ProviderConfig::Gmail(_) => "gmail",
        }
    }
}

/// AWS SES settings
#[derive(Clone, Validate)]
pub struct SesSettings {
    #[validate(length(min = 1, message = "AWS region must not be empty"))]
    pub region: String,
    /// Explicit credentials. When either is missing the default AWS chain is used.
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub configuration_set: Option<String>,
}

impl fmt::Debug for SesSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SesSettings")
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("configuration_set", &self.configuration_set)
            .finish()
    }
}

/// Gmail (service account with domain-wide delegation) settings
#[derive(Debug, Clone, Validate)]
pub struct GmailSettings {
    /// Path to the service-account JSON key
    #[validate(length(min = 1))]
    pub credentials_file: String,
    /// Workspace user the service account acts as
    #[validate(email)]
    pub impersonate: String,
    #[validate(url)]
    pub api_base_url: String,
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// "json" or "pretty"
    pub log_format: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: "pretty".to_string(),
        }
    }
}

impl TelemetryConfig {
    pub fn is_json(&self) -> bool {
        self.log_format == "json"
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let provider = match var("EMAIL_PROVIDER")
            .context("EMAIL_PROVIDER is required")?
            .to_lowercase()
            .as_str()
        {
            "ses" => {
                let settings = SesSettings {
                    region: var("AWS_REGION").unwrap_or_else(|| DEFAULT_AWS_REGION.to_string()),
                    access_key_id: var("AWS_ACCESS_KEY_ID"),
                    secret_access_key: var("AWS_SECRET_ACCESS_KEY"),
                    configuration_set: var("SES_CONFIGURATION_SET"),
                };
                settings.validate().context("Invalid SES configuration")?;
                ProviderConfig::Ses(settings)
            }
            "gmail" => {
                let settings = GmailSettings {
                    credentials_file: var("GMAIL_CREDENTIALS_FILE")
                        .context("GMAIL_CREDENTIALS_FILE is required for the gmail provider")?,
                    impersonate: var("GMAIL_IMPERSONATE")
                        .context("GMAIL_IMPERSONATE is required for the gmail provider")?,
                    api_base_url: var("GMAIL_API_BASE_URL")
                        .unwrap_or_else(|| DEFAULT_GMAIL_API_BASE_URL.to_string()),
                };
                settings.validate().context("Invalid Gmail configuration")?;
                ProviderConfig::Gmail(settings)
            }
            other => bail!("Unsupported EMAIL_PROVIDER: {} (expected ses or gmail)", other),
        };

        let send_timeout = var("EMAIL_SEND_TIMEOUT_SECS")
            .map(|value| value.parse::<u64>().context("Invalid EMAIL_SEND_TIMEOUT_SECS"))
            .transpose()?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let log_format = var("LOG_FORMAT")
            .map(|value| value.to_lowercase())
            .unwrap_or_else(|| "pretty".to_string());
        if log_format != "json" && log_format != "pretty" {
            bail!("Invalid LOG_FORMAT: {} (expected json or pretty)", log_format);
        }

        Ok(Self {
            provider,
            send_timeout,
            telemetry: TelemetryConfig { log_format },
        })
    }
}
