//! Pre-send validation of [`Email`] values
//!
//! Each backend has its own validator. Both run the checks in the same order
//! and stop at the first failure, but they disagree on what counts as a
//! well-formed address (`a@b`, `ops@localhost`, `a@b@example.com`), so the
//! two are kept apart on purpose.

use crate::domain::Email;
use crate::error::{EmailError, Result};
use mailparse::{MailAddr, MailParseError};
use thiserror::Error;

/// Why [`parse_mailbox`] rejected an address
#[derive(Debug, Error)]
pub enum MailboxError {
    #[error(transparent)]
    Parse(#[from] MailParseError),

    #[error("expected a single mailbox, found {0} addresses")]
    NotSingle(usize),

    #[error("expected a mailbox, found group {0:?}")]
    Group(String),

    #[error("malformed address: {0}")]
    AddrSpec(String),
}

/// SES address rule: any string containing both `@` and `.`.
///
/// SES performs the strict checks itself and reports them as
/// `InvalidParameterValue`.
pub fn is_ses_address(address: &str) -> bool {
    address.contains('@') && address.contains('.')
}

/// Gmail address rule: one RFC 5322 mailbox.
///
/// Accepts a bare addr-spec (`user@host`, `"john doe"@host`,
/// `user@[192.168.0.1]`), a bracketed address with an optional display name
/// and trailing comments. A dot in the host is not required.
pub fn parse_mailbox(address: &str) -> std::result::Result<(), MailboxError> {
    let trimmed = address.trim();
    if is_addr_spec(trimmed) {
        return Ok(());
    }

    let mut list = mailparse::addrparse(trimmed)?;
    if list.len() != 1 {
        return Err(MailboxError::NotSingle(list.len()));
    }

    match list.remove(0) {
        MailAddr::Single(info) => {
            let addr = info.addr.trim();
            if is_addr_spec(addr) {
                Ok(())
            } else {
                Err(MailboxError::AddrSpec(addr.to_string()))
            }
        }
        MailAddr::Group(group) => Err(MailboxError::Group(group.group_name)),
    }
}

fn is_addr_spec(addr: &str) -> bool {
    match addr.rsplit_once('@') {
        Some((local, domain)) => is_local_part(local) && is_domain(domain),
        None => false,
    }
}

fn is_local_part(local: &str) -> bool {
    match local.strip_prefix('"').and_then(|rest| rest.strip_suffix('"')) {
        Some(quoted) => is_quoted_content(quoted),
        None => is_dot_atom(local),
    }
}

fn is_domain(domain: &str) -> bool {
    match domain.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
        Some(literal) => {
            !literal.is_empty()
                && literal
                    .chars()
                    .all(|c| c.is_ascii_graphic() && !matches!(c, '[' | ']' | '\\'))
        }
        None => is_dot_atom(domain),
    }
}

fn is_dot_atom(value: &str) -> bool {
    !value.is_empty()
        && value
            .split('.')
            .all(|atom| !atom.is_empty() && atom.chars().all(is_atext))
}

fn is_atext(c: char) -> bool {
    c.is_alphanumeric() || "!#$%&'*+-/=?^_`{|}~".contains(c)
}

fn is_quoted_content(quoted: &str) -> bool {
    let mut escaped = false;
    for c in quoted.chars() {
        if c == '\r' || c == '\n' {
            return false;
        }
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            return false;
        }
    }
    !escaped
}

/// Validate an email for the SES backend before any provider call is made.
///
/// Checks run in this order: from present, from well-formed, at least one
/// recipient, every recipient well-formed, subject present, a body present.
pub fn validate_ses_email(email: &Email) -> Result<()> {
    if email.from_address.is_empty() {
        return Err(EmailError::validation("from address is required"));
    }

    if !is_ses_address(&email.from_address) {
        return Err(EmailError::invalid_email("invalid from address format"));
    }

    if !email.has_recipients() {
        return Err(EmailError::validation("at least one recipient is required"));
    }

    if let Some(address) = email.recipients().find(|address| !is_ses_address(address)) {
        return Err(EmailError::invalid_email(format!(
            "invalid recipient address: {}",
            address
        )));
    }

    if email.subject.is_empty() {
        return Err(EmailError::validation("subject is required"));
    }

    if !email.has_html_body() && !email.has_text_body() {
        return Err(EmailError::validation(
            "email body is required (HTML or text)",
        ));
    }

    Ok(())
}

/// Validate an email for the Gmail backend before any provider call is made.
///
/// Same order as [`validate_ses_email`]. Address failures keep the
/// [`MailboxError`] as their source.
pub fn validate_gmail_email(email: &Email) -> Result<()> {
    if email.from_address.is_empty() {
        return Err(EmailError::validation("from address is required"));
    }

    parse_mailbox(&email.from_address).map_err(|e| {
        EmailError::invalid_email("invalid from address format").with_source(e)
    })?;

    if !email.has_recipients() {
        return Err(EmailError::validation("at least one recipient is required"));
    }

    for address in email.recipients() {
        parse_mailbox(address).map_err(|e| {
            EmailError::invalid_email(format!("invalid recipient address: {}", address))
                .with_source(e)
        })?;
    }

    if email.subject.is_empty() {
        return Err(EmailError::validation("subject is required"));
    }

    if !email.has_html_body() && !email.has_text_body() {
        return Err(EmailError::validation(
            "email body is required (HTML or text)",
        ));
    }

    Ok(())
}
