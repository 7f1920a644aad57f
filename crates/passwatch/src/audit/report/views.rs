use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use super::super::buckets::{ReportBuckets, ReportCounts};
use super::super::domain::{ClassificationResult, PasswordStatus};

pub(crate) const DATE_FORMAT: &str = "%B %d, %Y";

#[derive(Debug, Clone, Serialize)]
pub struct AccountView {
    pub display_name: String,
    pub account_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub enabled: bool,
    pub status: PasswordStatus,
    pub status_label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_last_set: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_left: Option<i64>,
}

impl AccountView {
    pub fn from_result(result: &ClassificationResult) -> Self {
        Self {
            display_name: result.display_name.clone(),
            account_name: result.account_name.clone(),
            email: result.contact().map(str::to_string),
            enabled: result.enabled,
            status: result.status,
            status_label: result.status.label(),
            password_last_set: result.password_last_set,
            expiration_date: result.expiration_date(),
            days_left: result.days_left(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BucketViews {
    pub expired: Vec<AccountView>,
    pub critical: Vec<AccountView>,
    pub warning: Vec<AccountView>,
    pub never_expires: Vec<AccountView>,
    pub never_logged_in: Vec<AccountView>,
    pub disabled: Vec<AccountView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub counts: ReportCounts,
    pub buckets: BucketViews,
}

impl ReportBuckets {
    pub fn summary(&self) -> ReportSummary {
        let views = |bucket: &[ClassificationResult]| -> Vec<AccountView> {
            bucket.iter().map(AccountView::from_result).collect()
        };

        ReportSummary {
            counts: self.counts(),
            buckets: BucketViews {
                expired: views(&self.expired),
                critical: views(&self.critical),
                warning: views(&self.warning),
                never_expires: views(&self.never_expires),
                never_logged_in: views(&self.never_logged_in),
                disabled: views(&self.disabled),
            },
        }
    }
}

pub(crate) fn format_date(value: DateTime<Utc>) -> String {
    value.with_timezone(&Local).format(DATE_FORMAT).to_string()
}

pub(crate) fn format_days_left(days_left: i64) -> String {
    match days_left {
        d if d < -1 => format!("expired {} days ago", -d),
        -1 => "expired 1 day ago".to_string(),
        0 => "expires today".to_string(),
        1 => "1 day".to_string(),
        d => format!("{d} days"),
    }
}
