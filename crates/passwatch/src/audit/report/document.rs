use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use super::super::buckets::{ReportBuckets, ReportCounts};
use super::super::domain::{
    ClassificationResult, DomainPasswordPolicy, LockoutDuration, PolicyThresholds,
};
use super::views::{format_date, format_days_left};

const NOT_REPORTED: &str = "Not reported";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Expired,
    Critical,
    Warning,
    NeverExpires,
    NeverLoggedIn,
    Disabled,
}

impl SectionKind {
    pub const fn ordered() -> [Self; 6] {
        [
            Self::Expired,
            Self::Critical,
            Self::Warning,
            Self::NeverExpires,
            Self::NeverLoggedIn,
            Self::Disabled,
        ]
    }

    pub const fn heading(self) -> &'static str {
        match self {
            Self::Expired => "Expired Passwords",
            Self::Critical => "Critical",
            Self::Warning => "Warning",
            Self::NeverExpires => "Password Never Expires",
            Self::NeverLoggedIn => "Never Logged In",
            Self::Disabled => "Disabled Accounts",
        }
    }

    /// CSS class used by the HTML renderer for the section accent.
    pub const fn css_class(self) -> &'static str {
        match self {
            Self::Expired => "expired",
            Self::Critical => "critical",
            Self::Warning => "warning",
            Self::NeverExpires => "never-expires",
            Self::NeverLoggedIn => "never-logged-in",
            Self::Disabled => "disabled",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub display_name: String,
    pub account_name: String,
    pub email: Option<String>,
    pub password_last_set: Option<String>,
    pub expiration_date: Option<String>,
    pub days_left: Option<String>,
    pub enabled: bool,
}

impl ReportRow {
    fn from_result(result: &ClassificationResult) -> Self {
        Self {
            display_name: result.display_name.clone(),
            account_name: result.account_name.clone(),
            email: result.contact().map(str::to_string),
            password_last_set: result.password_last_set.map(format_date),
            expiration_date: result.expiration_date().map(format_date),
            days_left: result.days_left().map(format_days_left),
            enabled: result.enabled,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSection {
    pub kind: SectionKind,
    pub heading: &'static str,
    pub description: String,
    pub rows: Vec<ReportRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PolicyLine {
    pub label: &'static str,
    pub value: String,
}

/// Presentation-neutral digest: summary counts, policy table, and account sections.
#[derive(Debug, Clone, Serialize)]
pub struct ReportDocument {
    pub title: String,
    pub generated_at: NaiveDateTime,
    pub counts: ReportCounts,
    pub warning_threshold_days: i64,
    pub critical_threshold_days: i64,
    pub policy: Vec<PolicyLine>,
    pub sections: Vec<ReportSection>,
}

impl ReportDocument {
    pub fn build(
        buckets: &ReportBuckets,
        thresholds: &PolicyThresholds,
        policy: &DomainPasswordPolicy,
        generated_at: NaiveDateTime,
    ) -> Self {
        let sections = SectionKind::ordered()
            .into_iter()
            .filter(|kind| section_visible(*kind, buckets))
            .map(|kind| ReportSection {
                kind,
                heading: kind.heading(),
                description: section_description(kind, thresholds),
                rows: section_results(kind, buckets)
                    .iter()
                    .map(ReportRow::from_result)
                    .collect(),
            })
            .collect();

        Self {
            title: "Password Expiration Report".to_string(),
            generated_at,
            counts: buckets.counts(),
            warning_threshold_days: thresholds.warning_threshold_days,
            critical_threshold_days: thresholds.critical_threshold_days,
            policy: policy_lines(policy),
            sections,
        }
    }

    pub fn subject(&self) -> String {
        format!("{} - {}", self.title, self.generated_at.format("%Y-%m-%d"))
    }

    pub fn section(&self, kind: SectionKind) -> Option<&ReportSection> {
        self.sections.iter().find(|section| section.kind == kind)
    }
}

fn section_visible(kind: SectionKind, buckets: &ReportBuckets) -> bool {
    match kind {
        SectionKind::NeverExpires => buckets.include.include_never_expires,
        SectionKind::Disabled => buckets.include.include_disabled,
        _ => true,
    }
}

fn section_results(kind: SectionKind, buckets: &ReportBuckets) -> &[ClassificationResult] {
    match kind {
        SectionKind::Expired => &buckets.expired,
        SectionKind::Critical => &buckets.critical,
        SectionKind::Warning => &buckets.warning,
        SectionKind::NeverExpires => &buckets.never_expires,
        SectionKind::NeverLoggedIn => &buckets.never_logged_in,
        SectionKind::Disabled => &buckets.disabled,
    }
}

fn section_description(kind: SectionKind, thresholds: &PolicyThresholds) -> String {
    match kind {
        SectionKind::Expired => format!(
            "Passwords older than the {}-day maximum age.",
            thresholds.max_password_age.num_days()
        ),
        SectionKind::Critical => format!(
            "Passwords expiring within {} days.",
            thresholds.critical_threshold_days
        ),
        SectionKind::Warning => format!(
            "Passwords expiring within {} days.",
            thresholds.warning_threshold_days
        ),
        SectionKind::NeverExpires => "Accounts exempt from password expiration.".to_string(),
        SectionKind::NeverLoggedIn => "Accounts that have never set a password.".to_string(),
        SectionKind::Disabled => "Disabled accounts included in this audit.".to_string(),
    }
}

fn policy_lines(policy: &DomainPasswordPolicy) -> Vec<PolicyLine> {
    let line = |label, value: Option<String>| PolicyLine {
        label,
        value: value.unwrap_or_else(|| NOT_REPORTED.to_string()),
    };

    vec![
        line(
            "Maximum password age",
            Some(format_age(policy.max_password_age)),
        ),
        line("Minimum password age", policy.min_password_age.map(format_age)),
        line(
            "Minimum length",
            policy.min_length.map(|n| format!("{n} characters")),
        ),
        line(
            "Complexity required",
            policy
                .complexity_enabled
                .map(|enabled| if enabled { "Yes" } else { "No" }.to_string()),
        ),
        line(
            "Password history",
            policy
                .history_count
                .map(|n| format!("{n} passwords remembered")),
        ),
        line(
            "Lockout threshold",
            policy.lockout_threshold.map(|n| match n {
                0 => "Lockout disabled".to_string(),
                n => format!("{n} invalid attempts"),
            }),
        ),
        line(
            "Lockout duration",
            policy.lockout_duration.map(|duration| match duration {
                LockoutDuration::Minutes(minutes) => format!("{minutes} minutes"),
                LockoutDuration::UntilUnlocked => "Until unlocked by an administrator".to_string(),
            }),
        ),
    ]
}

fn format_age(age: Duration) -> String {
    match age.num_days() {
        1 => "1 day".to_string(),
        days => format!("{days} days"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::buckets::aggregate;
    use crate::audit::classifier::classify_all;
    use crate::audit::domain::AccountRecord;
    use crate::audit::filter::InclusionFlags;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 1, 9, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn generated_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 10, 1)
            .and_then(|date| date.and_hms_opt(9, 0, 0))
            .expect("valid local time")
    }

    fn thresholds(include: InclusionFlags) -> PolicyThresholds {
        PolicyThresholds {
            warning_threshold_days: 14,
            critical_threshold_days: 7,
            max_password_age: Duration::days(42),
            include,
        }
    }

    fn accounts() -> Vec<AccountRecord> {
        vec![
            AccountRecord {
                display_name: "Ada Lovelace".to_string(),
                account_name: "alovelace".to_string(),
                email: Some("ada@example.com".to_string()),
                password_last_set: Some(now() - Duration::days(40)),
                password_never_expires: false,
                enabled: true,
            },
            AccountRecord {
                display_name: "Service Account".to_string(),
                account_name: "svc_backup".to_string(),
                email: None,
                password_last_set: Some(now() - Duration::days(900)),
                password_never_expires: true,
                enabled: false,
            },
        ]
    }

    fn document(include: InclusionFlags) -> ReportDocument {
        let thresholds = thresholds(include);
        let results = classify_all(&accounts(), &thresholds, now());
        let buckets = aggregate(&results, include);
        let policy = DomainPasswordPolicy::with_max_age(thresholds.max_password_age);
        ReportDocument::build(&buckets, &thresholds, &policy, generated_at())
    }

    #[test]
    fn optional_sections_follow_inclusion_flags() {
        let hidden = document(InclusionFlags::default());
        assert!(hidden.section(SectionKind::NeverExpires).is_none());
        assert!(hidden.section(SectionKind::Disabled).is_none());
        assert_eq!(hidden.sections.len(), 4);

        let shown = document(InclusionFlags::new(true, true));
        let kinds: Vec<SectionKind> = shown.sections.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, SectionKind::ordered());
        assert_eq!(
            shown
                .section(SectionKind::Disabled)
                .map(|section| section.rows.len()),
            Some(1)
        );
    }

    #[test]
    fn rows_carry_formatted_days_left() {
        let doc = document(InclusionFlags::default());
        let critical = doc.section(SectionKind::Critical).expect("critical section");
        assert_eq!(critical.rows.len(), 1);
        assert_eq!(critical.rows[0].account_name, "alovelace");
        assert_eq!(critical.rows[0].days_left.as_deref(), Some("2 days"));
        assert!(critical.description.contains("7 days"));
    }

    #[test]
    fn policy_table_marks_unknown_values() {
        let doc = document(InclusionFlags::default());
        assert_eq!(doc.policy[0].value, "42 days");
        assert!(doc.policy[1..].iter().all(|line| line.value == NOT_REPORTED));
        assert_eq!(doc.subject(), "Password Expiration Report - 2025-10-01");
    }
}
