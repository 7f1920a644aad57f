//! Outbound mail boundary.

mod schedule;
mod smtp;

pub use schedule::{GatedTransport, SendSchedule};
pub use smtp::{SmtpMailer, SmtpSettings};

use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    UserNotice,
    Digest,
}

/// A rendered message ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationRequest {
    pub kind: NotificationKind,
    pub recipients: Vec<String>,
    pub subject: String,
    pub html_body: String,
    /// Account the notice is about; absent for the digest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
}

pub trait MailTransport {
    fn send(&self, request: &NotificationRequest) -> Result<(), MailError>;
}

impl<T: MailTransport + ?Sized> MailTransport for &T {
    fn send(&self, request: &NotificationRequest) -> Result<(), MailError> {
        (**self).send(request)
    }
}

impl<T: MailTransport + ?Sized> MailTransport for Box<T> {
    fn send(&self, request: &NotificationRequest) -> Result<(), MailError> {
        (**self).send(request)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid mail address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("unable to build message: {0}")]
    Message(String),
    #[error("mail transport failure: {0}")]
    Transport(String),
    #[error("mail server {0} did not accept a test connection")]
    Unreachable(String),
    #[error("sending is not scheduled for {0}")]
    OutsideSendWindow(chrono::Weekday),
}

/// Transport for dry runs: records nothing, only logs what would be sent.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

impl MailTransport for LogTransport {
    fn send(&self, request: &NotificationRequest) -> Result<(), MailError> {
        info!(
            kind = ?request.kind,
            recipients = %request.recipients.join(", "),
            subject = %request.subject,
            "dry run: notification not sent"
        );
        Ok(())
    }
}
