//! Raw RFC 5322 message construction for the Gmail API
//!
//! The Gmail `messages.send` endpoint only accepts a complete message,
//! URL-safe base64 encoded. Output is deterministic: boundaries are fixed
//! tokens and nothing time- or randomness-dependent is written, so the same
//! [`Email`] always produces the same bytes.
//!
//! Body layout:
//! - text and HTML: `multipart/alternative`, text part first
//! - HTML only: `text/html`
//! - text only: `text/plain`
//! - with attachments: the body above becomes the first part of a
//!   `multipart/mixed` message, followed by one base64 part per attachment

use crate::domain::{Attachment, Email};
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use std::borrow::Cow;
use thiserror::Error;

/// Boundary of the `multipart/alternative` text/HTML body
pub const ALTERNATIVE_BOUNDARY: &str = "boundary123456789";

/// Boundary of the `multipart/mixed` attachment envelope
pub const MIXED_BOUNDARY: &str = "mixed_boundary_123456789";

const CRLF: &str = "\r\n";

/// RFC 2045 line limit for base64 bodies
const BASE64_LINE_LEN: usize = 76;

/// RFC 2047 limit for a single encoded-word
const MAX_ENCODED_WORD_LEN: usize = 75;

const SUBJECT_CHARSET: &str = "utf-8";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MimeError {
    #[error("line break in {0} header value")]
    HeaderInjection(&'static str),
}

#[derive(Debug, Clone)]
struct Header {
    name: &'static str,
    value: String,
}

impl Header {
    fn new(name: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

/// Ordered header block
#[derive(Debug, Default)]
struct Headers(Vec<Header>);

impl Headers {
    fn push(&mut self, name: &'static str, value: impl Into<String>) -> Result<(), MimeError> {
        let value = value.into();
        if value.contains(['\r', '\n']) {
            return Err(MimeError::HeaderInjection(name));
        }
        self.0.push(Header::new(name, value));
        Ok(())
    }

    /// Replace the first header with this name, or append it when absent
    fn set(&mut self, name: &'static str, value: impl Into<String>) {
        let value = value.into();
        match self.0.iter_mut().find(|h| h.name.eq_ignore_ascii_case(name)) {
            Some(header) => header.value = value,
            None => self.0.push(Header::new(name, value)),
        }
    }

    fn remove(&mut self, name: &'static str) {
        self.0.retain(|h| !h.name.eq_ignore_ascii_case(name));
    }

    fn write_to(&self, out: &mut String) {
        for (i, header) in self.0.iter().enumerate() {
            if i > 0 {
                out.push_str(CRLF);
            }
            out.push_str(header.name);
            out.push_str(": ");
            out.push_str(&header.value);
        }
    }
}

/// The message body before any attachment wrapping
enum Body<'a> {
    Alternative { text: &'a str, html: &'a str },
    Html(&'a str),
    Text(&'a str),
}

impl<'a> Body<'a> {
    fn select(email: &'a Email) -> Self {
        if email.has_html_body() && email.has_text_body() {
            Body::Alternative {
                text: &email.text_body,
                html: &email.html_body,
            }
        } else if email.has_html_body() {
            Body::Html(&email.html_body)
        } else {
            Body::Text(&email.text_body)
        }
    }

    fn headers(&self) -> Vec<Header> {
        match self {
            Body::Alternative { .. } => vec![Header::new(
                "Content-Type",
                format!("multipart/alternative; boundary={}", ALTERNATIVE_BOUNDARY),
            )],
            Body::Html(_) => vec![
                Header::new("Content-Type", "text/html; charset=utf-8"),
                Header::new("Content-Transfer-Encoding", "8bit"),
            ],
            Body::Text(_) => vec![
                Header::new("Content-Type", "text/plain; charset=utf-8"),
                Header::new("Content-Transfer-Encoding", "8bit"),
            ],
        }
    }

    fn write_to(&self, out: &mut String) {
        match self {
            Body::Alternative { text, html } => {
                write_part(
                    out,
                    ALTERNATIVE_BOUNDARY,
                    &[
                        Header::new("Content-Type", "text/plain; charset=utf-8"),
                        Header::new("Content-Transfer-Encoding", "8bit"),
                    ],
                    text,
                );
                out.push_str(CRLF);
                write_part(
                    out,
                    ALTERNATIVE_BOUNDARY,
                    &[
                        Header::new("Content-Type", "text/html; charset=utf-8"),
                        Header::new("Content-Transfer-Encoding", "8bit"),
                    ],
                    html,
                );
                out.push_str(CRLF);
                write_close_delimiter(out, ALTERNATIVE_BOUNDARY);
            }
            Body::Html(body) | Body::Text(body) => out.push_str(body),
        }
    }
}

fn write_part(out: &mut String, boundary: &str, headers: &[Header], content: &str) {
    out.push_str("--");
    out.push_str(boundary);
    out.push_str(CRLF);
    for header in headers {
        out.push_str(header.name);
        out.push_str(": ");
        out.push_str(&header.value);
        out.push_str(CRLF);
    }
    out.push_str(CRLF);
    out.push_str(content);
}

fn write_close_delimiter(out: &mut String, boundary: &str) {
    out.push_str("--");
    out.push_str(boundary);
    out.push_str("--");
}

fn join_addresses(addresses: &[String]) -> String {
    addresses.join(", ")
}

fn attachment_headers(attachment: &Attachment) -> Result<Vec<Header>, MimeError> {
    let mut headers = Headers::default();
    headers.push(
        "Content-Type",
        format!(
            "{}; name=\"{}\"",
            attachment.content_type, attachment.file_name
        ),
    )?;
    headers.push(
        "Content-Disposition",
        format!("attachment; filename=\"{}\"", attachment.file_name),
    )?;
    headers.push("Content-Transfer-Encoding", "base64")?;
    Ok(headers.0)
}

/// Standard base64 wrapped at 76 columns
fn encode_base64_lines(content: &[u8]) -> String {
    let encoded = STANDARD.encode(content);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / BASE64_LINE_LEN * 2);
    // base64 output is ASCII, so byte chunks are valid UTF-8
    for (i, chunk) in encoded.as_bytes().chunks(BASE64_LINE_LEN).enumerate() {
        if i > 0 {
            out.push_str(CRLF);
        }
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
    }
    out
}

/// Encode a header value as RFC 2047 `Q` encoded-words when it is not plain ASCII.
///
/// Printable ASCII (and tab) is returned unchanged. Otherwise the value is
/// split into encoded-words of at most 75 characters without splitting a
/// multi-byte character, separated by a single space.
pub fn encode_header_word(value: &str) -> Cow<'_, str> {
    if !needs_encoding(value) {
        return Cow::Borrowed(value);
    }

    let prefix = format!("=?{}?q?", SUBJECT_CHARSET);
    let max_content_len = MAX_ENCODED_WORD_LEN - prefix.len() - "?=".len();

    let mut out = String::with_capacity(value.len() * 3);
    out.push_str(&prefix);

    let mut current_len = 0;
    let mut last = 0;
    for (i, ch) in value.char_indices() {
        let encoded_len = if is_q_literal(ch) || ch == ' ' {
            1
        } else {
            3 * ch.len_utf8()
        };

        if current_len + encoded_len > max_content_len {
            write_q_string(&mut out, &value[last..i]);
            out.push_str("?= ");
            out.push_str(&prefix);
            last = i;
            current_len = 0;
        }
        current_len += encoded_len;
    }
    write_q_string(&mut out, &value[last..]);
    out.push_str("?=");

    Cow::Owned(out)
}

fn needs_encoding(value: &str) -> bool {
    value
        .chars()
        .any(|ch| (ch < ' ' || ch > '~') && ch != '\t')
}

fn is_q_literal(ch: char) -> bool {
    ch > ' ' && ch <= '~' && ch != '=' && ch != '?' && ch != '_'
}

fn write_q_string(out: &mut String, s: &str) {
    for byte in s.bytes() {
        match byte {
            b' ' => out.push('_'),
            b if is_q_literal(b as char) => out.push(b as char),
            b => out.push_str(&format!("={:02X}", b)),
        }
    }
}

/// Build the raw RFC 5322 message for an email
pub fn build_raw_message(email: &Email) -> Result<Vec<u8>, MimeError> {
    let mut headers = Headers::default();
    headers.push("From", email.from_address.as_str())?;
    headers.push("To", join_addresses(&email.to_addresses))?;
    headers.push("Subject", encode_header_word(&email.subject))?;
    headers.push("MIME-Version", "1.0")?;

    if !email.cc_addresses.is_empty() {
        headers.push("Cc", join_addresses(&email.cc_addresses))?;
    }
    if !email.bcc_addresses.is_empty() {
        headers.push("Bcc", join_addresses(&email.bcc_addresses))?;
    }
    if !email.reply_to_addresses.is_empty() {
        headers.push("Reply-To", join_addresses(&email.reply_to_addresses))?;
    }

    let body = Body::select(email);
    let body_headers = body.headers();
    for header in &body_headers {
        headers.0.push(header.clone());
    }

    let mut body_block = String::new();
    if email.attachments.is_empty() {
        body.write_to(&mut body_block);
    } else {
        headers.remove("Content-Transfer-Encoding");
        headers.set(
            "Content-Type",
            format!("multipart/mixed; boundary={}", MIXED_BOUNDARY),
        );

        let mut inner = String::new();
        body.write_to(&mut inner);
        write_part(&mut body_block, MIXED_BOUNDARY, &body_headers, &inner);

        for attachment in &email.attachments {
            body_block.push_str(CRLF);
            write_part(
                &mut body_block,
                MIXED_BOUNDARY,
                &attachment_headers(attachment)?,
                &encode_base64_lines(&attachment.content),
            );
        }
        body_block.push_str(CRLF);
        write_close_delimiter(&mut body_block, MIXED_BOUNDARY);
    }

    let mut raw = String::with_capacity(body_block.len() + 512);
    headers.write_to(&mut raw);
    raw.push_str(CRLF);
    raw.push_str(CRLF);
    raw.push_str(&body_block);

    Ok(raw.into_bytes())
}

/// Build the message and encode it the way the Gmail API expects (padded URL-safe base64)
pub fn encode_raw_message(email: &Email) -> Result<String, MimeError> {
    build_raw_message(email).map(|raw| URL_SAFE.encode(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text_email() -> Email {
        Email::new("sender@example.com", "Hello")
            .with_to("a@example.com")
            .with_to("b@example.com")
            .with_text_body("Plain body")
    }

    fn raw_string(email: &Email) -> String {
        String::from_utf8(build_raw_message(email).unwrap()).unwrap()
    }

    #[test]
    fn test_text_only_message() {
        let raw = raw_string(&text_email());

        assert_eq!(
            raw,
            "From: sender@example.com\r\n\
             To: a@example.com, b@example.com\r\n\
             Subject: Hello\r\n\
             MIME-Version: 1.0\r\n\
             Content-Type: text/plain; charset=utf-8\r\n\
             Content-Transfer-Encoding: 8bit\r\n\
             \r\n\
             Plain body"
        );
    }

    #[test]
    fn test_html_only_message() {
        let mut email = text_email();
        email.text_body.clear();
        email.html_body = "<p>Hi</p>".to_string();

        let raw = raw_string(&email);
        assert!(raw.contains("Content-Type: text/html; charset=utf-8\r\n"));
        assert!(raw.ends_with("\r\n\r\n<p>Hi</p>"));
    }

    #[test]
    fn test_alternative_message() {
        let email = text_email().with_html_body("<p>Html body</p>");
        let raw = raw_string(&email);

        let (head, body) = raw.split_once("\r\n\r\n").unwrap();
        assert!(head.ends_with(
            "Content-Type: multipart/alternative; boundary=boundary123456789"
        ));
        assert!(!head.contains("Content-Transfer-Encoding"));
        assert_eq!(
            body,
            "--boundary123456789\r\n\
             Content-Type: text/plain; charset=utf-8\r\n\
             Content-Transfer-Encoding: 8bit\r\n\
             \r\n\
             Plain body\r\n\
             --boundary123456789\r\n\
             Content-Type: text/html; charset=utf-8\r\n\
             Content-Transfer-Encoding: 8bit\r\n\
             \r\n\
             <p>Html body</p>\r\n\
             --boundary123456789--"
        );
    }

    #[test]
    fn test_optional_headers_order() {
        let email = text_email()
            .with_cc("cc@example.com")
            .with_bcc("bcc@example.com")
            .with_reply_to("reply@example.com");
        let raw = raw_string(&email);

        let names: Vec<&str> = raw
            .split("\r\n\r\n")
            .next()
            .unwrap()
            .split("\r\n")
            .map(|line| line.split(':').next().unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                "From",
                "To",
                "Subject",
                "MIME-Version",
                "Cc",
                "Bcc",
                "Reply-To",
                "Content-Type",
                "Content-Transfer-Encoding",
            ]
        );
    }

    #[test]
    fn test_empty_optional_headers_omitted() {
        let raw = raw_string(&text_email());
        assert!(!raw.contains("Cc:"));
        assert!(!raw.contains("Bcc:"));
        assert!(!raw.contains("Reply-To:"));
    }

    #[test]
    fn test_attachment_message_layout() {
        let email = text_email().with_attachment(Attachment::new(
            "notes.txt",
            "text/plain",
            b"attached".to_vec(),
        ));
        let raw = raw_string(&email);

        let (head, body) = raw.split_once("\r\n\r\n").unwrap();
        assert!(head.ends_with(
            "Content-Type: multipart/mixed; boundary=mixed_boundary_123456789"
        ));
        assert!(!head.contains("Content-Transfer-Encoding"));
        assert_eq!(
            body,
            "--mixed_boundary_123456789\r\n\
             Content-Type: text/plain; charset=utf-8\r\n\
             Content-Transfer-Encoding: 8bit\r\n\
             \r\n\
             Plain body\r\n\
             --mixed_boundary_123456789\r\n\
             Content-Type: text/plain; name=\"notes.txt\"\r\n\
             Content-Disposition: attachment; filename=\"notes.txt\"\r\n\
             Content-Transfer-Encoding: base64\r\n\
             \r\n\
             YXR0YWNoZWQ=\r\n\
             --mixed_boundary_123456789--"
        );
    }

    #[test]
    fn test_attachment_wraps_alternative_body() {
        let email = text_email()
            .with_html_body("<p>Html</p>")
            .with_attachment(Attachment::new("a.bin", "application/octet-stream", vec![0u8, 1, 2]));
        let raw = raw_string(&email);

        assert!(raw.contains(
            "--mixed_boundary_123456789\r\n\
             Content-Type: multipart/alternative; boundary=boundary123456789\r\n\
             \r\n\
             --boundary123456789\r\n"
        ));
        assert!(raw.contains("--boundary123456789--\r\n--mixed_boundary_123456789\r\n"));
        assert!(raw.ends_with("--mixed_boundary_123456789--"));
    }

    #[test]
    fn test_base64_lines_wrapped() {
        let encoded = encode_base64_lines(&[0xAB; 200]);
        let lines: Vec<&str> = encoded.split("\r\n").collect();
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|line| line.len() <= BASE64_LINE_LEN));
        assert_eq!(STANDARD.decode(lines.concat()).unwrap(), vec![0xAB; 200]);
    }

    #[test]
    fn test_build_is_deterministic() {
        let email = text_email()
            .with_html_body("<p>Html</p>")
            .with_attachment(Attachment::new("x.pdf", "application/pdf", vec![9u8; 64]));

        assert_eq!(
            encode_raw_message(&email).unwrap(),
            encode_raw_message(&email).unwrap()
        );
    }

    #[test]
    fn test_encoded_output_is_url_safe_base64() {
        let email = text_email().with_text_body("??>>??>>");
        let encoded = encode_raw_message(&email).unwrap();

        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
        assert_eq!(
            URL_SAFE.decode(&encoded).unwrap(),
            build_raw_message(&email).unwrap()
        );
    }

    #[test]
    fn test_header_injection_rejected() {
        let email = text_email().with_reply_to("x@example.com\r\nBcc: victim@example.com");
        assert_eq!(
            build_raw_message(&email).unwrap_err(),
            MimeError::HeaderInjection("Reply-To")
        );

        let email = text_email().with_attachment(Attachment::new(
            "evil\r\n.txt",
            "text/plain",
            Vec::new(),
        ));
        assert_eq!(
            build_raw_message(&email).unwrap_err(),
            MimeError::HeaderInjection("Content-Type")
        );
    }

    #[test]
    fn test_ascii_subject_untouched() {
        assert_eq!(encode_header_word("Hello, world!"), "Hello, world!");
        assert_eq!(encode_header_word("tab\tok"), "tab\tok");
    }

    #[test]
    fn test_non_ascii_subject_q_encoded() {
        assert_eq!(encode_header_word("¡Hola, señor!"), "=?utf-8?q?=C2=A1Hola,_se=C3=B1or!?=");
        assert_eq!(encode_header_word("a=b?c_d\u{e9}"), "=?utf-8?q?a=3Db=3Fc=5Fd=C3=A9?=");
    }

    #[test]
    fn test_long_subject_split_into_words() {
        let subject = "é".repeat(40);
        let encoded = encode_header_word(&subject);

        // 63 content bytes fit 10 six-byte characters per word
        let words: Vec<&str> = encoded.split(' ').collect();
        assert_eq!(words.len(), 4);
        for word in &words {
            assert!(word.len() <= MAX_ENCODED_WORD_LEN);
            assert!(word.starts_with("=?utf-8?q?"));
            assert!(word.ends_with("?="));
            assert_eq!(word.matches("=C3=A9").count(), 10);
        }
    }
}
