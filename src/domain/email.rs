//! Email domain types shared by every sender backend

use serde::{Deserialize, Serialize};

/// A provider-agnostic email.
///
/// Empty strings stand for "not set": an empty `html_body` means the message
/// has no HTML alternative, an empty `from_address` fails validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub from_address: String,
    #[serde(default)]
    pub to_addresses: Vec<String>,
    #[serde(default)]
    pub cc_addresses: Vec<String>,
    #[serde(default)]
    pub bcc_addresses: Vec<String>,
    #[serde(default)]
    pub reply_to_addresses: Vec<String>,
    pub subject: String,
    #[serde(default)]
    pub html_body: String,
    /// The email body for recipients with non-HTML email clients.
    #[serde(default)]
    pub text_body: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Email {
    pub fn new(from_address: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            from_address: from_address.into(),
            subject: subject.into(),
            ..Default::default()
        }
    }

    pub fn with_to(mut self, address: impl Into<String>) -> Self {
        self.to_addresses.push(address.into());
        self
    }

    pub fn with_cc(mut self, address: impl Into<String>) -> Self {
        self.cc_addresses.push(address.into());
        self
    }

    pub fn with_bcc(mut self, address: impl Into<String>) -> Self {
        self.bcc_addresses.push(address.into());
        self
    }

    pub fn with_reply_to(mut self, address: impl Into<String>) -> Self {
        self.reply_to_addresses.push(address.into());
        self
    }

    pub fn with_html_body(mut self, html_body: impl Into<String>) -> Self {
        self.html_body = html_body.into();
        self
    }

    pub fn with_text_body(mut self, text_body: impl Into<String>) -> Self {
        self.text_body = text_body.into();
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// All envelope recipients in to, cc, bcc order
    pub fn recipients(&self) -> impl Iterator<Item = &str> {
        self.to_addresses
            .iter()
            .chain(&self.cc_addresses)
            .chain(&self.bcc_addresses)
            .map(String::as_str)
    }

    pub fn has_recipients(&self) -> bool {
        self.recipients().next().is_some()
    }

    pub fn has_html_body(&self) -> bool {
        !self.html_body.is_empty()
    }

    pub fn has_text_body(&self) -> bool {
        !self.text_body.is_empty()
    }
}

/// A file attached to an [`Email`].
///
/// No size limit is enforced here; providers reject oversized payloads themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub file_name: String,
    pub content: Vec<u8>,
    pub description: String,
    /// MIME type of the content
    pub content_type: String,
}

impl Attachment {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
            description: String::new(),
            content_type: content_type.into(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}
