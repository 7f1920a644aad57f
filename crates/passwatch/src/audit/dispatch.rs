use serde::Serialize;
use tracing::{info, warn};

use super::buckets::ReportBuckets;
use super::domain::PasswordStatus;
use super::mail::{MailTransport, NotificationKind, NotificationRequest};
use super::report::{render_user_notice, NoticeContext, RenderedMessage};

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub report_only: bool,
    pub admin_recipients: Vec<String>,
    pub notice: NoticeContext,
}

/// An account that needed a notice but had no usable contact address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedNotice {
    pub account_name: String,
    pub display_name: String,
    pub status: PasswordStatus,
}

#[derive(Debug, Clone, Default)]
pub struct DispatchPlan {
    pub notices: Vec<NotificationRequest>,
    pub skipped: Vec<SkippedNotice>,
    pub digest: Option<NotificationRequest>,
}

impl DispatchPlan {
    /// Every request in send order: user notices first, then the digest.
    pub fn requests(&self) -> impl Iterator<Item = &NotificationRequest> {
        self.notices.iter().chain(self.digest.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty() && self.digest.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryFailure {
    pub kind: NotificationKind,
    pub recipients: Vec<String>,
    pub subject: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliverySummary {
    pub sent: usize,
    pub skipped: usize,
    pub failures: Vec<DeliveryFailure>,
}

impl DeliverySummary {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Decides who gets mail for a run and hands requests to a transport.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    settings: DispatchSettings,
}

impl Dispatcher {
    pub fn new(settings: DispatchSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    pub fn plan(&self, buckets: &ReportBuckets, digest: &RenderedMessage) -> DispatchPlan {
        if self.settings.report_only {
            info!("report-only run: no notifications planned");
            return DispatchPlan::default();
        }

        let mut plan = DispatchPlan::default();

        for result in buckets.notice_candidates() {
            let Some(contact) = result.contact() else {
                warn!(
                    account = %result.account_name,
                    status = result.status.label(),
                    "no contact address; user notice skipped"
                );
                plan.skipped.push(SkippedNotice {
                    account_name: result.account_name.clone(),
                    display_name: result.display_name.clone(),
                    status: result.status,
                });
                continue;
            };

            if let Some(message) = render_user_notice(result, &self.settings.notice) {
                plan.notices.push(NotificationRequest {
                    kind: NotificationKind::UserNotice,
                    recipients: vec![contact.to_string()],
                    subject: message.subject,
                    html_body: message.html,
                    account: Some(result.account_name.clone()),
                });
            }
        }

        let admins: Vec<String> = self
            .settings
            .admin_recipients
            .iter()
            .map(|address| address.trim())
            .filter(|address| !address.is_empty())
            .map(str::to_string)
            .collect();

        if !admins.is_empty() && buckets.classified() > 0 {
            plan.digest = Some(NotificationRequest {
                kind: NotificationKind::Digest,
                recipients: admins,
                subject: digest.subject.clone(),
                html_body: digest.html.clone(),
                account: None,
            });
        }

        info!(
            notices = plan.notices.len(),
            skipped = plan.skipped.len(),
            digest = plan.digest.is_some(),
            "dispatch planned"
        );
        plan
    }

    /// Send every planned request. A failed send is recorded and the
    /// remaining requests still go out.
    pub fn deliver(&self, plan: &DispatchPlan, transport: &dyn MailTransport) -> DeliverySummary {
        let mut summary = DeliverySummary {
            skipped: plan.skipped.len(),
            ..DeliverySummary::default()
        };

        for request in plan.requests() {
            match transport.send(request) {
                Ok(()) => {
                    summary.sent += 1;
                    info!(
                        kind = ?request.kind,
                        recipients = %request.recipients.join(", "),
                        "notification sent"
                    );
                }
                Err(err) => {
                    warn!(
                        kind = ?request.kind,
                        recipients = %request.recipients.join(", "),
                        error = %err,
                        "notification failed"
                    );
                    summary.failures.push(DeliveryFailure {
                        kind: request.kind,
                        recipients: request.recipients.clone(),
                        subject: request.subject.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        summary
    }
}
