use std::path::PathBuf;

use chrono::{DateTime, Local, Utc};
use tracing::{debug, info, warn};

use super::buckets::{aggregate, ReportBuckets};
use super::classifier::classify_all;
use super::directory::{DirectoryError, DirectoryGateway};
use super::dispatch::{DeliverySummary, DispatchPlan, DispatchSettings, Dispatcher};
use super::domain::PolicyThresholds;
use super::filter::InclusionFlags;
use super::mail::MailTransport;
use super::report::{render_digest, write_report, ReportDocument, ReportError};

/// Everything a single audit run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct AuditSettings {
    pub organizational_unit: String,
    pub warning_threshold_days: i64,
    pub critical_threshold_days: i64,
    pub include: InclusionFlags,
    /// Directory for the HTML digest; `None` skips writing it.
    pub report_dir: Option<PathBuf>,
    pub dispatch: DispatchSettings,
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Report(#[from] ReportError),
}

#[derive(Debug)]
pub struct AuditSummary {
    pub buckets: ReportBuckets,
    pub document: ReportDocument,
    pub report_path: Option<PathBuf>,
    pub plan: DispatchPlan,
    pub delivery: DeliverySummary,
}

#[derive(Debug)]
pub enum AuditOutcome {
    /// The snapshot was empty; nothing was classified, written, or sent.
    NoAccounts,
    Completed(Box<AuditSummary>),
}

/// One pass over a directory snapshot: classify, aggregate, render, write, notify.
pub struct AuditRun<'a> {
    directory: &'a dyn DirectoryGateway,
    transport: &'a dyn MailTransport,
}

impl<'a> AuditRun<'a> {
    pub fn new(directory: &'a dyn DirectoryGateway, transport: &'a dyn MailTransport) -> Self {
        Self {
            directory,
            transport,
        }
    }

    pub fn execute(
        &self,
        settings: &AuditSettings,
        now: DateTime<Utc>,
    ) -> Result<AuditOutcome, AuditError> {
        let policy = self.directory.fetch_domain_password_policy()?;
        info!(
            max_password_age_days = policy.max_password_age.num_days(),
            "domain password policy loaded"
        );

        if settings.critical_threshold_days > settings.warning_threshold_days {
            warn!(
                critical = settings.critical_threshold_days,
                warning = settings.warning_threshold_days,
                "critical threshold exceeds warning threshold; warning bucket will stay empty"
            );
        }

        let accounts = self
            .directory
            .fetch_accounts(&settings.organizational_unit, &settings.include)?;
        if accounts.is_empty() {
            info!(ou = %settings.organizational_unit, "no accounts matched; nothing to report");
            return Ok(AuditOutcome::NoAccounts);
        }

        let thresholds = PolicyThresholds::from_policy(
            settings.warning_threshold_days,
            settings.critical_threshold_days,
            settings.include,
            &policy,
        );
        let results = classify_all(&accounts, &thresholds, now);
        for result in &results {
            debug!(
                account = %result.account_name,
                status = result.status.label(),
                days_left = ?result.days_left(),
                "account classified"
            );
        }

        let buckets = aggregate(&results, settings.include);
        let generated_at = now.with_timezone(&Local).naive_local();
        let document = ReportDocument::build(&buckets, &thresholds, &policy, generated_at);
        let digest = render_digest(&document);

        let report_path = settings
            .report_dir
            .as_deref()
            .map(|dir| write_report(dir, generated_at, &digest.html))
            .transpose()?;

        let dispatcher = Dispatcher::new(settings.dispatch.clone());
        let plan = dispatcher.plan(&buckets, &digest);
        let delivery = dispatcher.deliver(&plan, self.transport);

        let counts = buckets.counts();
        info!(
            total = counts.total,
            expired = counts.expired,
            critical = counts.critical,
            warning = counts.warning,
            sent = delivery.sent,
            failed = delivery.failed(),
            "audit complete"
        );

        Ok(AuditOutcome::Completed(Box::new(AuditSummary {
            buckets,
            document,
            report_path,
            plan,
            delivery,
        })))
    }
}
