//! Sender contract tests shared by both providers

mod common;

use common::{minimal_email, RecordingGmailApi, RecordingSesApi};
use mailgate_core::email::gmail::GmailApiError;
use mailgate_core::email::ses::SesApiError;
use mailgate_core::{Email, ErrorReason, GmailSender, Sender, SesSender};
use rstest::rstest;
use std::error::Error as _;
use std::sync::Arc;

fn senders() -> (
    Arc<RecordingSesApi>,
    Arc<RecordingGmailApi>,
    Vec<Arc<dyn Sender>>,
) {
    let ses = Arc::new(RecordingSesApi::succeeding());
    let gmail = Arc::new(RecordingGmailApi::succeeding());
    let senders: Vec<Arc<dyn Sender>> = vec![
        Arc::new(SesSender::new(ses.clone())),
        Arc::new(GmailSender::new(gmail.clone())),
    ];
    (ses, gmail, senders)
}

#[tokio::test]
async fn test_minimal_email_sends_once_per_provider() {
    let (ses, gmail, senders) = senders();

    for sender in &senders {
        sender.send_email(&minimal_email()).await.unwrap();
    }

    assert_eq!(ses.calls(), 1);
    assert_eq!(gmail.calls(), 1);
    assert_eq!(gmail.calls.lock().unwrap()[0].0, "me");
}

fn without_from() -> Email {
    let mut email = minimal_email();
    email.from_address.clear();
    email
}

fn without_recipients() -> Email {
    let mut email = minimal_email();
    email.to_addresses.clear();
    email
}

fn without_subject() -> Email {
    let mut email = minimal_email();
    email.subject.clear();
    email
}

fn without_body() -> Email {
    let mut email = minimal_email();
    email.text_body.clear();
    email
}

#[rstest]
#[case(without_from(), ErrorReason::ValidationError, "from address is required")]
#[case(without_recipients(), ErrorReason::ValidationError, "at least one recipient is required")]
#[case(without_subject(), ErrorReason::ValidationError, "subject is required")]
#[case(without_body(), ErrorReason::ValidationError, "email body is required (HTML or text)")]
#[case(
    minimal_email().with_bcc("nope"),
    ErrorReason::InvalidEmail,
    "invalid recipient address: nope"
)]
#[tokio::test]
async fn test_invalid_email_never_reaches_provider(
    #[case] email: Email,
    #[case] reason: ErrorReason,
    #[case] message: &str,
) {
    let (ses, gmail, senders) = senders();

    for sender in &senders {
        let err = sender.send_email(&email).await.unwrap_err();
        assert_eq!(err.reason(), reason, "{}", sender.provider_name());
        assert_eq!(err.message(), message, "{}", sender.provider_name());
    }

    assert_eq!(ses.calls(), 0);
    assert_eq!(gmail.calls(), 0);
}

#[tokio::test]
async fn test_address_policies_differ() {
    let (ses, gmail, senders) = senders();
    let (ses_sender, gmail_sender) = (&senders[0], &senders[1]);

    // Dotless host: only the mailbox parser accepts it
    let local = minimal_email().with_to("ops@localhost");
    assert_eq!(
        ses_sender.send_email(&local).await.unwrap_err().reason(),
        ErrorReason::InvalidEmail
    );
    gmail_sender.send_email(&local).await.unwrap();

    // Two '@': only the heuristic accepts it
    let doubled = minimal_email().with_cc("a@b@example.com");
    ses_sender.send_email(&doubled).await.unwrap();
    assert_eq!(
        gmail_sender.send_email(&doubled).await.unwrap_err().reason(),
        ErrorReason::InvalidEmail
    );

    // Display-name form passes both
    let named = minimal_email().with_to("Jane Doe <jane@example.com>");
    ses_sender.send_email(&named).await.unwrap();
    gmail_sender.send_email(&named).await.unwrap();

    assert_eq!(ses.calls(), 2);
    assert_eq!(gmail.calls(), 2);
}

#[tokio::test]
async fn test_ses_error_keeps_native_cause() {
    let api = Arc::new(RecordingSesApi::failing(
        "MessageRejected",
        "Email address is not verified",
    ));
    let sender = SesSender::new(api.clone());

    let err = sender.send_email(&minimal_email()).await.unwrap_err();

    assert_eq!(err.reason(), ErrorReason::MessageRejected);
    assert_eq!(err.message(), "message rejected by SES");
    assert!(!err.reason().is_retryable());
    let cause = err.source().unwrap().downcast_ref::<SesApiError>().unwrap();
    assert!(matches!(cause, SesApiError::Service { code, .. } if code == "MessageRejected"));
    assert_eq!(api.calls(), 1);
}

#[tokio::test]
async fn test_gmail_error_keeps_native_cause() {
    let api = Arc::new(RecordingGmailApi::failing(503, "Backend unavailable"));
    let sender = GmailSender::new(api.clone());

    let err = sender.send_email(&minimal_email()).await.unwrap_err();

    assert_eq!(err.reason(), ErrorReason::ServiceError);
    assert_eq!(err.message(), "Gmail service temporarily unavailable");
    assert!(err.reason().is_retryable());
    let cause = err.source().unwrap().downcast_ref::<GmailApiError>().unwrap();
    assert!(matches!(cause, GmailApiError::Api { code: 503, .. }));
}

#[tokio::test]
async fn test_ses_request_mirrors_email() {
    let api = Arc::new(RecordingSesApi::succeeding());
    let sender = SesSender::new(api.clone()).with_configuration_set("events");

    let email = minimal_email()
        .with_html_body("<p>Test body</p>")
        .with_reply_to("support@example.com");
    sender.send_email(&email).await.unwrap();

    let requests = api.requests.lock().unwrap();
    let request = &requests[0];
    assert_eq!(request.from_email_address, "sender@example.com");
    assert_eq!(request.destination.to_addresses(), ["recipient@example.com"]);
    assert_eq!(request.reply_to_addresses, vec!["support@example.com"]);
    assert_eq!(request.configuration_set_name.as_deref(), Some("events"));

    let body = request.content.simple().unwrap().body().unwrap();
    assert_eq!(body.html().unwrap().data(), "<p>Test body</p>");
    assert_eq!(body.text().unwrap().data(), "Test body");
}
