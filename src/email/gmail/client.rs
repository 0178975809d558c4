//! Gmail REST API client with domain-wide delegation
//!
//! Authenticates as a Google service account impersonating a Workspace user:
//! a signed RS256 assertion is exchanged for an access token (JWT bearer
//! grant), the token is cached until shortly before it expires, and
//! messages are posted to `users.messages.send`.

use super::errors::GmailApiError;
use super::GmailApi;
use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::error::Error as _;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

/// OAuth scope allowing only `messages.send`
pub const GMAIL_SEND_SCOPE: &str = "https://www.googleapis.com/auth/gmail.send";

pub const DEFAULT_API_BASE_URL: &str = "https://gmail.googleapis.com";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_TTL_SECS: i64 = 3600;
const TOKEN_REFRESH_SKEW_SECS: i64 = 30;

/// Errors raised while setting up the client (never during a send)
#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("unable to read service account file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to parse service account file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid service account private key: {0}")]
    InvalidKey(#[from] jsonwebtoken::errors::Error),

    #[error("unable to create HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// The fields of a Google service-account JSON key this client needs
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Clone)]
struct AccessToken {
    access_token: String,
    expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    raw: &'a str,
}

#[derive(Deserialize)]
struct SendResponse {
    id: String,
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    code: u16,
    message: String,
}

/// Production [`GmailApi`] implementation
#[derive(Clone)]
pub struct GmailClient {
    http_client: Client,
    base_url: String,
    client_email: String,
    token_uri: String,
    subject: String,
    key_id: Option<String>,
    encoding_key: EncodingKey,
    token: Arc<RwLock<Option<AccessToken>>>,
}

impl GmailClient {
    /// Create a client from a parsed key, impersonating `subject`
    pub fn new(
        key: ServiceAccountKey,
        subject: impl Into<String>,
    ) -> Result<Self, CredentialsError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            base_url: DEFAULT_API_BASE_URL.to_string(),
            client_email: key.client_email,
            token_uri: key.token_uri,
            subject: subject.into(),
            key_id: key.private_key_id,
            encoding_key,
            token: Arc::new(RwLock::new(None)),
        })
    }

    /// Create a client from the raw service-account JSON
    pub fn from_service_account_json(
        json: &[u8],
        subject: impl Into<String>,
    ) -> Result<Self, CredentialsError> {
        let key: ServiceAccountKey = serde_json::from_slice(json)?;
        Self::new(key, subject)
    }

    /// Create a client from a service-account JSON file
    pub fn from_service_account_file(
        path: impl AsRef<std::path::Path>,
        subject: impl Into<String>,
    ) -> Result<Self, CredentialsError> {
        let path = path.as_ref();
        let json = std::fs::read(path).map_err(|source| CredentialsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_service_account_json(&json, subject)
    }

    /// Override the API root (e.g. for a proxy or a test server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Impersonated user address
    pub fn subject(&self) -> &str {
        &self.subject
    }

    fn sign_assertion(&self) -> Result<String, GmailApiError> {
        let now = chrono::Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            sub: &self.subject,
            scope: GMAIL_SEND_SCOPE,
            aud: &self.token_uri,
            iat: now,
            exp: now + ASSERTION_TTL_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();

        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| GmailApiError::Other(format!("failed to sign token assertion: {}", e)))
    }

    /// Get an access token (with caching)
    async fn access_token(&self) -> Result<String, GmailApiError> {
        {
            let token = self.token.read().await;
            if let Some(ref t) = *token {
                if t.expires_at
                    > chrono::Utc::now() + chrono::Duration::seconds(TOKEN_REFRESH_SKEW_SECS)
                {
                    return Ok(t.access_token.clone());
                }
            }
        }

        let assertion = self.sign_assertion()?;
        let params = [("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())];

        let response = self
            .http_client
            .post(&self.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => match err.error_description {
                    Some(description) => format!("{}: {}", err.error, description),
                    None => err.error,
                },
                Err(_) => body,
            };
            return Err(token_error(status.as_u16(), detail));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| GmailApiError::Other(format!("failed to parse token response: {}", e)))?;

        debug!(
            subject = %self.subject,
            expires_in = token_response.expires_in,
            "Obtained Gmail access token"
        );

        let access_token = AccessToken {
            access_token: token_response.access_token.clone(),
            expires_at: chrono::Utc::now() + chrono::Duration::seconds(token_response.expires_in),
        };

        {
            let mut token = self.token.write().await;
            *token = Some(access_token);
        }

        Ok(token_response.access_token)
    }
}

/// Render a reqwest error with its source chain so connection details survive
fn transport_error(err: reqwest::Error) -> GmailApiError {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    if err.is_timeout() {
        GmailApiError::Timeout(message)
    } else if err.is_connect() {
        GmailApiError::Other(format!("connection error: {}", message))
    } else {
        GmailApiError::Other(message)
    }
}

#[async_trait]
impl GmailApi for GmailClient {
    async fn send(&self, user_id: &str, raw: &str) -> Result<String, GmailApiError> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/gmail/v1/users/{}/messages/send",
            self.base_url, user_id
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&token)
            .json(&SendRequest { raw })
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<ApiErrorEnvelope>(&body) {
                Ok(envelope) => GmailApiError::Api {
                    code: envelope.error.code,
                    message: envelope.error.message,
                },
                Err(_) => GmailApiError::Api {
                    code: status.as_u16(),
                    message: body,
                },
            });
        }

        let sent: SendResponse = response
            .json()
            .await
            .map_err(|e| GmailApiError::Other(format!("failed to parse send response: {}", e)))?;

        Ok(sent.id)
    }
}

/// Rejected grants (400, 401, 403) are credential problems and surface as
/// 401. Throttling and server failures keep their status so they stay
/// retryable.
fn token_error(status: u16, detail: String) -> GmailApiError {
    let code = match status {
        400 | 401 | 403 => 401,
        other => other,
    };

    GmailApiError::Api {
        code,
        message: format!("token exchange failed (HTTP {}): {}", status, detail),
    }
}
