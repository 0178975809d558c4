//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use mailgate_core::email::gmail::{GmailApi, GmailApiError};
use mailgate_core::email::ses::{SesApi, SesApiError, SesSendRequest};
use mailgate_core::Email;
use std::sync::Mutex;

/// Smallest email every provider accepts
pub fn minimal_email() -> Email {
    Email::new("sender@example.com", "Test")
        .with_to("recipient@example.com")
        .with_text_body("Test body")
}

/// SES fake that records requests and answers with a fixed result
pub struct RecordingSesApi {
    pub requests: Mutex<Vec<SesSendRequest>>,
    error: Option<(String, String)>,
}

impl RecordingSesApi {
    pub fn succeeding() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            error: None,
        }
    }

    pub fn failing(code: &str, message: &str) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            error: Some((code.to_string(), message.to_string())),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl SesApi for RecordingSesApi {
    async fn send_email(&self, request: SesSendRequest) -> Result<Option<String>, SesApiError> {
        self.requests.lock().unwrap().push(request);
        match &self.error {
            Some((code, message)) => Err(SesApiError::Service {
                code: code.clone(),
                message: message.clone(),
            }),
            None => Ok(Some("ses-message-id".to_string())),
        }
    }
}

/// Gmail fake that records `(user_id, raw)` pairs
pub struct RecordingGmailApi {
    pub calls: Mutex<Vec<(String, String)>>,
    error: Option<(u16, String)>,
}

impl RecordingGmailApi {
    pub fn succeeding() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            error: None,
        }
    }

    pub fn failing(code: u16, message: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            error: Some((code, message.to_string())),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl GmailApi for RecordingGmailApi {
    async fn send(&self, user_id: &str, raw: &str) -> Result<String, GmailApiError> {
        self.calls
            .lock()
            .unwrap()
            .push((user_id.to_string(), raw.to_string()));
        match &self.error {
            Some((code, message)) => Err(GmailApiError::Api {
                code: *code,
                message: message.clone(),
            }),
            None => Ok("gmail-message-id".to_string()),
        }
    }
}
