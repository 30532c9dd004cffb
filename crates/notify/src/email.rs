//! SMTP email channel via `lettre`.

use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::traits::{Notification, Notifier, NotifyError};

const IMPLICIT_TLS_PORT: u16 = 465;
const SUBMISSION_PORT: u16 = 587;

/// Connection and addressing for the email channel.
#[derive(Debug, Clone, Default)]
pub struct SmtpSettings {
    pub host: String,
    /// Defaults to 587.
    pub port: Option<u16>,
    /// `None` means TLS on.
    pub tls: Option<bool>,
    /// `"certs@example.com"` or `"Certs <certs@example.com>"`.
    pub from: String,
    pub to: Vec<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Security {
    ImplicitTls,
    StartTls,
    Plaintext,
}

fn security_for(port: u16, tls: Option<bool>) -> Security {
    match (port, tls.unwrap_or(true)) {
        (IMPLICIT_TLS_PORT, _) => Security::ImplicitTls,
        (_, true) => Security::StartTls,
        (_, false) => Security::Plaintext,
    }
}

fn parse_mailbox(addr: &str) -> Result<Mailbox, NotifyError> {
    addr.trim()
        .parse()
        .map_err(|e: lettre::address::AddressError| {
            NotifyError::Config(format!("invalid address '{addr}': {e}"))
        })
}

/// Sends renewal outcomes as plain-text mail to a fixed recipient list.
#[derive(Debug)]
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl EmailNotifier {
    /// Addresses are validated here; no connection is opened until the
    /// first send.
    pub fn new(settings: &SmtpSettings) -> Result<Self, NotifyError> {
        let from = parse_mailbox(&settings.from)?;
        let to = settings
            .to
            .iter()
            .map(|addr| parse_mailbox(addr))
            .collect::<Result<Vec<_>, _>>()?;
        if to.is_empty() {
            return Err(NotifyError::Config(
                "at least one recipient is required".to_string(),
            ));
        }

        let port = settings.port.unwrap_or(SUBMISSION_PORT);
        let host = settings.host.as_str();
        let mut builder = match security_for(port, settings.tls) {
            Security::ImplicitTls => AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .map_err(|e| NotifyError::Config(e.to_string()))?,
            Security::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| NotifyError::Config(e.to_string()))?,
            Security::Plaintext => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
        }
        .port(port);

        if let (Some(user), Some(pass)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
        })
    }

    pub fn recipient_count(&self) -> usize {
        self.to.len()
    }

    fn build_message(&self, notification: &Notification) -> Result<Message, NotifyError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(notification.subject.as_str())
            .header(ContentType::TEXT_PLAIN);
        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }
        builder
            .body(notification.body.clone())
            .map_err(|e| NotifyError::Smtp(e.to_string()))
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let message = self.build_message(notification)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;
        tracing::debug!(
            resource = notification.resource().unwrap_or("-"),
            recipients = self.to.len(),
            "email handed to SMTP relay"
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "email"
    }
}
