//! Mailgate Core - provider-agnostic email sending
//!
//! Build an [`Email`], pick a [`Sender`] (AWS SES or the Gmail API) and
//! send. Every failure comes back as an [`EmailError`] carrying one
//! provider-independent [`ErrorReason`].

pub mod config;
pub mod domain;
pub mod email;
pub mod error;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use domain::{Attachment, Email};
pub use email::{build_sender, GmailSender, Sender, SesSender};
pub use error::{EmailError, ErrorReason, Result};
