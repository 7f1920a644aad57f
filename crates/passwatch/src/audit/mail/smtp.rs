use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Message, SmtpTransport, Transport};
use tracing::{debug, info};

use super::{MailError, MailTransport, NotificationRequest};

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub starttls: bool,
    pub from: String,
}

/// SMTP delivery through `lettre`.
pub struct SmtpMailer {
    host: String,
    transport: SmtpTransport,
    from: Mailbox,
}

impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("host", &self.host)
            .field("from", &self.from.to_string())
            .finish_non_exhaustive()
    }
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self, MailError> {
        let from = parse_mailbox(&settings.from)?;

        let mut builder =
            SmtpTransport::builder_dangerous(settings.host.as_str()).port(settings.port);
        if settings.starttls {
            let parameters = TlsParameters::new(settings.host.clone())
                .map_err(|err| MailError::Transport(err.to_string()))?;
            builder = builder.tls(Tls::Required(parameters));
        }
        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            host: settings.host.clone(),
            transport: builder.build(),
            from,
        })
    }

    /// Connect once without sending, so an unreachable relay fails the run early.
    pub fn test_connection(&self) -> Result<(), MailError> {
        match self.transport.test_connection() {
            Ok(true) => {
                info!(host = %self.host, "mail server reachable");
                Ok(())
            }
            Ok(false) => Err(MailError::Unreachable(self.host.clone())),
            Err(err) => Err(MailError::Transport(err.to_string())),
        }
    }

    fn build_message(&self, request: &NotificationRequest) -> Result<Message, MailError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(request.subject.clone())
            .header(ContentType::TEXT_HTML);
        for recipient in &request.recipients {
            builder = builder.to(parse_mailbox(recipient)?);
        }

        builder
            .body(request.html_body.clone())
            .map_err(|err| MailError::Message(err.to_string()))
    }
}

impl MailTransport for SmtpMailer {
    fn send(&self, request: &NotificationRequest) -> Result<(), MailError> {
        let message = self.build_message(request)?;
        self.transport
            .send(&message)
            .map_err(|err| MailError::Transport(err.to_string()))?;
        debug!(recipients = request.recipients.len(), subject = %request.subject, "mail sent");
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address
        .trim()
        .parse::<Mailbox>()
        .map_err(|err| MailError::InvalidAddress {
            address: address.to_string(),
            reason: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::mail::NotificationKind;

    fn settings(from: &str) -> SmtpSettings {
        SmtpSettings {
            host: "localhost".to_string(),
            port: 2525,
            username: None,
            password: None,
            starttls: false,
            from: from.to_string(),
        }
    }

    #[test]
    fn rejects_malformed_sender() {
        match SmtpMailer::new(&settings("not an address")) {
            Err(MailError::InvalidAddress { address, .. }) => assert_eq!(address, "not an address"),
            other => panic!("expected invalid address, got {other:?}"),
        }
    }

    #[test]
    fn builds_html_message_for_every_recipient() {
        let mailer = SmtpMailer::new(&settings("IT Support <it@example.com>")).expect("mailer");
        let request = NotificationRequest {
            kind: NotificationKind::Digest,
            recipients: vec!["a@example.com".to_string(), "b@example.com".to_string()],
            subject: "Password Expiration Report - 2025-10-01".to_string(),
            html_body: "<p>report</p>".to_string(),
            account: None,
        };

        let message = mailer.build_message(&request).expect("message builds");
        let formatted = String::from_utf8(message.formatted()).expect("utf8 message");

        assert!(formatted.contains("To: a@example.com, b@example.com"));
        assert!(formatted.contains("Content-Type: text/html"));
        assert!(formatted.contains("Subject: Password Expiration Report - 2025-10-01"));
    }

    #[test]
    fn invalid_recipient_fails_only_that_message() {
        let mailer = SmtpMailer::new(&settings("it@example.com")).expect("mailer");
        let request = NotificationRequest {
            kind: NotificationKind::UserNotice,
            recipients: vec!["broken-address".to_string()],
            subject: "Your password has expired".to_string(),
            html_body: String::new(),
            account: Some("broken".to_string()),
        };

        assert!(matches!(
            mailer.build_message(&request),
            Err(MailError::InvalidAddress { .. })
        ));
    }
}
