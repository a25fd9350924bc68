//! Metrics summary email.

use crate::error::{Result, TrackerError};
use crate::metrics::MetricsSnapshot;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

/// SMTP relay settings
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

/// Subject line for a run
pub fn summary_subject(author_name: &str, snapshot: &MetricsSnapshot) -> String {
    format!(
        "Google Scholar Metrics Update - {} - {}",
        author_name,
        snapshot.date.format("%Y-%m-%d")
    )
}

/// Plain-text body for a run
pub fn summary_body(author_name: &str, snapshot: &MetricsSnapshot) -> String {
    format!(
        "Google Scholar Metrics Update for {author}\n\
         Date: {date}\n\
         \n\
         Summary:\n\
         - Total Papers: {papers}\n\
         - Total Citations: {total}\n\
         - h-index: {h}\n\
         - i10-index: {i10}\n\
         \n\
         This is an automated message from scholar-citations.\n",
        author = author_name,
        date = snapshot.date.format("%Y-%m-%d"),
        papers = snapshot.paper_count,
        total = snapshot.total_citations,
        h = snapshot.h_index,
        i10 = snapshot.i10_index,
    )
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .map_err(|e: lettre::address::AddressError| {
            TrackerError::Email(format!("Invalid address '{}': {}", address, e))
        })
}

/// Build the summary message.
pub fn build_summary_email(
    from: &str,
    to: &str,
    author_name: &str,
    snapshot: &MetricsSnapshot,
) -> Result<Message> {
    Message::builder()
        .from(parse_mailbox(from)?)
        .to(parse_mailbox(to)?)
        .subject(summary_subject(author_name, snapshot))
        .header(ContentType::TEXT_PLAIN)
        .body(summary_body(author_name, snapshot))
        .map_err(|e| TrackerError::Email(format!("Failed to build email: {}", e)))
}

/// Send the summary through a STARTTLS relay.
pub async fn send_summary(
    settings: &SmtpSettings,
    to: &str,
    author_name: &str,
    snapshot: &MetricsSnapshot,
) -> Result<()> {
    let email = build_summary_email(&settings.from, to, author_name, snapshot)?;

    let creds = Credentials::new(settings.username.clone(), settings.password.clone());
    let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
        .map_err(|e| TrackerError::Email(format!("SMTP relay error: {}", e)))?
        .port(settings.port)
        .credentials(creds)
        .build();

    let response = mailer
        .send(email)
        .await
        .map_err(|e| TrackerError::Email(format!("SMTP send error: {}", e)))?;

    info!(to, code = %response.code(), "Sent metrics summary email");
    Ok(())
}
