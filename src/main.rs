use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mailgate_core::{build_sender, config::Config, telemetry, Attachment, Email};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "mailgate-core",
    version,
    about = "Send email through AWS SES or the Gmail API"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send a single email using the provider from the environment
    Send(SendArgs),
}

#[derive(clap::Args)]
struct SendArgs {
    #[arg(long)]
    from: String,
    #[arg(long)]
    to: Vec<String>,
    #[arg(long)]
    cc: Vec<String>,
    #[arg(long)]
    bcc: Vec<String>,
    #[arg(long = "reply-to")]
    reply_to: Vec<String>,
    #[arg(long)]
    subject: String,
    #[arg(long)]
    text: Option<String>,
    #[arg(long)]
    html: Option<String>,
    /// File to attach (repeatable)
    #[arg(long = "attach")]
    attachments: Vec<PathBuf>,
}

/// Content type for an attachment, by file extension
fn guess_content_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

fn read_attachment(path: &Path) -> Result<Attachment> {
    let content = std::fs::read(path)
        .with_context(|| format!("Failed to read attachment {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(Attachment::new(file_name, guess_content_type(path), content))
}

fn build_email(args: SendArgs) -> Result<Email> {
    let mut email = Email::new(args.from, args.subject);
    email.to_addresses = args.to;
    email.cc_addresses = args.cc;
    email.bcc_addresses = args.bcc;
    email.reply_to_addresses = args.reply_to;
    email.text_body = args.text.unwrap_or_default();
    email.html_body = args.html.unwrap_or_default();
    email.attachments = args
        .attachments
        .iter()
        .map(|path| read_attachment(path))
        .collect::<Result<_>>()?;
    Ok(email)
}

async fn run(cli: Cli) -> Result<bool> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    telemetry::init(&config.telemetry);

    match cli.command {
        Command::Send(args) => {
            let email = build_email(args)?;
            let sender = build_sender(&config).await?;
            info!(provider = sender.provider_name(), "Sending email");

            match sender.send_email(&email).await {
                Ok(()) => {
                    info!("Email sent");
                    Ok(true)
                }
                Err(err) => {
                    error!(reason = %err.reason(), "Email send failed");
                    eprintln!("{}", err);
                    Ok(false)
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type(Path::new("report.PDF")), "application/pdf");
        assert_eq!(guess_content_type(Path::new("notes.txt")), "text/plain");
        assert_eq!(guess_content_type(Path::new("photo.jpeg")), "image/jpeg");
        assert_eq!(guess_content_type(Path::new("logo.svg")), "image/svg+xml");
        assert_eq!(
            guess_content_type(Path::new("letter.docx")),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        );
        assert_eq!(
            guess_content_type(Path::new("sheet.xlsx")),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        );
        assert_eq!(guess_content_type(Path::new("README")), "application/octet-stream");
    }

    #[test]
    fn test_cli_parses_send() {
        let cli = Cli::try_parse_from([
            "mailgate-core",
            "send",
            "--from",
            "sender@example.com",
            "--to",
            "a@example.com",
            "--to",
            "b@example.com",
            "--subject",
            "Hello",
            "--text",
            "Body",
        ])
        .unwrap();

        let Command::Send(args) = cli.command;
        let email = build_email(args).unwrap();
        assert_eq!(email.to_addresses, vec!["a@example.com", "b@example.com"]);
        assert_eq!(email.text_body, "Body");
        assert!(email.html_body.is_empty());
        assert!(email.attachments.is_empty());
    }

    #[test]
    fn test_cli_leaves_recipient_check_to_validation() {
        let cli = Cli::try_parse_from([
            "mailgate-core",
            "send",
            "--from",
            "sender@example.com",
            "--subject",
            "Hello",
            "--text",
            "Body",
        ])
        .unwrap();

        let Command::Send(args) = cli.command;
        let email = build_email(args).unwrap();
        assert!(email.to_addresses.is_empty());

        let err = mailgate_core::email::validate_ses_email(&email).unwrap_err();
        assert_eq!(err.reason(), mailgate_core::ErrorReason::ValidationError);
        assert_eq!(err.message(), "at least one recipient is required");
    }

    #[test]
    fn test_missing_attachment_file() {
        let err = read_attachment(Path::new("/nonexistent/file.pdf")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/file.pdf"));
    }
}
