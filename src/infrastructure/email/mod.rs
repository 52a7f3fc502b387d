//! Outgoing email.
//!
//! `SmtpEmailSender` delivers through lettre's async SMTP transport.
//! `LogEmailSender` is used when SMTP is disabled and only logs what would
//! have been sent.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::config::SmtpSettings;
use crate::infrastructure::metrics;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("SMTP delivery failed: {0}")]
    Transport(String),
}

/// A file attached to an outgoing email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<EmailAttachment>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError>;
}

/// SMTP delivery via lettre.
pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailSender {
    pub fn new(settings: &SmtpSettings) -> Result<Self, EmailError> {
        let builder = if settings.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
                .map_err(|e| EmailError::Transport(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
        };

        let mut builder = builder.port(settings.port);
        if !settings.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ));
        }

        let from = build_mailbox(Some(&settings.from_name), &settings.from_address)?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

fn build_mailbox(name: Option<&str>, address: &str) -> Result<Mailbox, EmailError> {
    let address = address
        .trim()
        .parse()
        .map_err(|_| EmailError::InvalidAddress(address.to_string()))?;
    let name = name.filter(|n| !n.trim().is_empty()).map(str::to_string);
    Ok(Mailbox::new(name, address))
}

/// Assemble the MIME message: plain text alone, or multipart/mixed when there
/// are attachments.
pub fn build_message(from: &Mailbox, email: OutgoingEmail) -> Result<Message, EmailError> {
    let builder = Message::builder()
        .from(from.clone())
        .to(build_mailbox(None, &email.to)?)
        .subject(email.subject);

    if email.attachments.is_empty() {
        return builder
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)
            .map_err(|e| EmailError::Build(e.to_string()));
    }

    let mut multipart = MultiPart::mixed().singlepart(SinglePart::plain(email.body));
    for attachment in email.attachments {
        let content_type = ContentType::parse(&attachment.content_type)
            .map_err(|e| EmailError::Build(e.to_string()))?;
        multipart = multipart
            .singlepart(Attachment::new(attachment.filename).body(attachment.data, content_type));
    }

    builder
        .multipart(multipart)
        .map_err(|e| EmailError::Build(e.to_string()))
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError> {
        let to = email.to.clone();
        let message = build_message(&self.from, email)?;

        match self.transport.send(message).await {
            Ok(_) => {
                metrics::record_email("sent");
                tracing::info!(to = %to, "Email sent");
                Ok(())
            }
            Err(e) => {
                metrics::record_email("failed");
                tracing::error!(to = %to, error = %e, "Email delivery failed");
                Err(EmailError::Transport(e.to_string()))
            }
        }
    }
}

/// Stand-in used when SMTP is disabled.
#[derive(Debug, Default, Clone)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError> {
        metrics::record_email("logged");
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            attachments = email.attachments.len(),
            "SMTP disabled, email not delivered"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_email(attachments: Vec<EmailAttachment>) -> OutgoingEmail {
        OutgoingEmail {
            to: "buyer@example.com".to_string(),
            subject: "Invoice 1403-00001".to_string(),
            body: "Please find the invoice attached.".to_string(),
            attachments,
        }
    }

    fn sender() -> Mailbox {
        build_mailbox(Some("CRM"), "noreply@example.com").unwrap()
    }

    #[test]
    fn test_build_plain_message() {
        let message = build_message(&sender(), create_test_email(vec![])).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("To: buyer@example.com"));
        assert!(raw.contains("Subject: Invoice 1403-00001"));
        assert!(raw.contains("Please find the invoice attached."));
        assert!(!raw.contains("multipart/mixed"));
    }

    #[test]
    fn test_build_message_with_attachment() {
        let attachment = EmailAttachment {
            filename: "invoice.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            data: b"%PDF-1.5".to_vec(),
        };
        let message = build_message(&sender(), create_test_email(vec![attachment])).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("invoice.pdf"));
        assert!(raw.contains("application/pdf"));
    }

    #[test]
    fn test_invalid_recipient_is_rejected() {
        let mut email = create_test_email(vec![]);
        email.to = "not an address".to_string();

        let result = build_message(&sender(), email);
        assert!(matches!(result, Err(EmailError::InvalidAddress(_))));
    }

    #[tokio::test]
    async fn test_log_sender_always_succeeds() {
        let sender = LogEmailSender;
        assert!(sender.send(create_test_email(vec![])).await.is_ok());
    }
}
