use chrono::{DateTime, Utc};
use clap::Args;
use passwatch::audit::report::ReportDocument;
use passwatch::audit::{
    AuditOutcome, AuditRun, AuditSettings, AuditSummary, CsvDirectory, DirectoryGateway,
    DomainPasswordPolicy, GatedTransport, LdapDirectory, LogTransport, MailTransport, SmtpMailer,
    MAX_PASSWORD_AGE_DAYS,
};
use passwatch::config::AppConfig;
use passwatch::error::AppError;
use passwatch::telemetry;
use std::path::PathBuf;
use tracing::info;

const DEFAULT_SNAPSHOT_MAX_AGE_DAYS: i64 = 90;

#[derive(Args, Debug, Default, Clone)]
pub(crate) struct SourceArgs {
    /// Read accounts from an exported CSV snapshot instead of the directory
    #[arg(long)]
    pub(crate) accounts_csv: Option<PathBuf>,
    /// Maximum password age in days applied to a CSV snapshot (default 90)
    #[arg(long, requires = "accounts_csv")]
    pub(crate) max_age_days: Option<i64>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct RunArgs {
    /// Build and write the report without sending any mail
    #[arg(long)]
    pub(crate) report_only: bool,
    /// Log the notifications that would be sent instead of sending them
    #[arg(long)]
    pub(crate) dry_run: bool,
    #[command(flatten)]
    pub(crate) source: SourceArgs,
    /// Directory for the HTML report (overrides REPORT_DIR)
    #[arg(long)]
    pub(crate) output_dir: Option<PathBuf>,
    /// Evaluate as of this instant (RFC 3339). Defaults to now.
    #[arg(long, value_parser = crate::infra::parse_instant)]
    pub(crate) now: Option<DateTime<Utc>>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ReportArgs {
    #[command(flatten)]
    pub(crate) source: SourceArgs,
    /// Evaluate as of this instant (RFC 3339). Defaults to now.
    #[arg(long, value_parser = crate::infra::parse_instant)]
    pub(crate) now: Option<DateTime<Utc>>,
}

pub(crate) fn run_audit(args: RunArgs) -> Result<(), AppError> {
    let RunArgs {
        report_only,
        dry_run,
        source,
        output_dir,
        now,
    } = args;

    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let mut settings = config.audit_settings();
    settings.dispatch.report_only |= report_only;
    if let Some(dir) = output_dir {
        settings.report_dir = Some(dir);
    }

    let directory = open_directory(&config, &source)?;
    let transport = open_transport(&config, &settings, dry_run)?;
    let now = now.unwrap_or_else(Utc::now);

    let outcome = AuditRun::new(directory.as_ref(), transport.as_ref()).execute(&settings, now)?;
    match outcome {
        AuditOutcome::NoAccounts => println!("No accounts matched; nothing to report."),
        AuditOutcome::Completed(summary) => render_run_summary(&summary, &settings, dry_run),
    }

    Ok(())
}

pub(crate) fn run_report(args: ReportArgs) -> Result<(), AppError> {
    let ReportArgs { source, now } = args;

    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let mut settings = config.audit_settings();
    settings.dispatch.report_only = true;
    settings.report_dir = None;

    let directory = open_directory(&config, &source)?;
    let now = now.unwrap_or_else(Utc::now);

    match AuditRun::new(directory.as_ref(), &LogTransport).execute(&settings, now)? {
        AuditOutcome::NoAccounts => println!("No accounts matched; nothing to report."),
        AuditOutcome::Completed(summary) => render_document(&summary.document),
    }

    Ok(())
}

/// Prerequisite: the directory must answer (or the snapshot must load)
/// before any account is processed.
pub(crate) fn open_directory(
    config: &AppConfig,
    source: &SourceArgs,
) -> Result<Box<dyn DirectoryGateway>, AppError> {
    match &source.accounts_csv {
        Some(path) => {
            let policy = snapshot_policy(source)?;
            info!(
                path = %path.display(),
                max_age_days = policy.max_password_age.num_days(),
                "using account snapshot"
            );
            let snapshot = CsvDirectory::from_path(path, policy.max_password_age)?;
            Ok(Box::new(snapshot))
        }
        None => {
            let ldap = config.require_directory()?;
            Ok(Box::new(LdapDirectory::connect(&ldap)?))
        }
    }
}

fn snapshot_policy(source: &SourceArgs) -> Result<DomainPasswordPolicy, AppError> {
    let days = source
        .max_age_days
        .unwrap_or(DEFAULT_SNAPSHOT_MAX_AGE_DAYS);
    DomainPasswordPolicy::from_max_age_days(days).ok_or_else(|| {
        AppError::InvalidRequest(format!(
            "--max-age-days must be between 1 and {MAX_PASSWORD_AGE_DAYS}"
        ))
    })
}

/// Prerequisite: a live run needs a reachable relay before anything is classified.
pub(crate) fn open_transport(
    config: &AppConfig,
    settings: &AuditSettings,
    dry_run: bool,
) -> Result<Box<dyn MailTransport>, AppError> {
    if settings.dispatch.report_only || dry_run {
        return Ok(Box::new(LogTransport));
    }

    let smtp = config.require_mail()?;
    let mailer = SmtpMailer::new(&smtp)?;
    mailer.test_connection()?;
    Ok(Box::new(GatedTransport::new(
        mailer,
        config.mail.schedule.clone(),
    )))
}

fn render_run_summary(summary: &AuditSummary, settings: &AuditSettings, dry_run: bool) {
    let counts = summary.buckets.counts();
    println!("Password expiration audit");
    println!(
        "Accounts: {} total | {} expired | {} critical | {} warning | {} ok",
        counts.total, counts.expired, counts.critical, counts.warning, counts.ok
    );
    println!(
        "          {} never expire | {} never logged in | {} disabled",
        counts.never_expires, counts.never_logged_in, counts.disabled
    );

    if let Some(path) = &summary.report_path {
        println!("Report written to {}", path.display());
    }

    if settings.dispatch.report_only {
        println!("Report-only run: no notifications sent");
        return;
    }

    let verb = if dry_run { "logged" } else { "sent" };
    println!(
        "Notifications: {} {verb}, {} failed, {} skipped (no address)",
        summary.delivery.sent,
        summary.delivery.failed(),
        summary.delivery.skipped
    );
    for skipped in &summary.plan.skipped {
        println!(
            "- skipped {} ({}): {}",
            skipped.display_name,
            skipped.account_name,
            skipped.status.label()
        );
    }
    for failure in &summary.delivery.failures {
        println!(
            "- failed to {}: {}",
            failure.recipients.join(", "),
            failure.reason
        );
    }
}

pub(crate) fn render_document(document: &ReportDocument) {
    println!("{}", document.title);
    println!(
        "Generated {} (warning {} days, critical {} days)",
        document.generated_at.format("%Y-%m-%d %H:%M"),
        document.warning_threshold_days,
        document.critical_threshold_days
    );

    println!("\nDomain policy");
    for line in &document.policy {
        println!("- {}: {}", line.label, line.value);
    }

    for section in &document.sections {
        println!("\n{} ({})", section.heading, section.rows.len());
        if section.rows.is_empty() {
            println!("- none");
            continue;
        }
        for row in &section.rows {
            let timing = match (&row.expiration_date, &row.days_left) {
                (Some(date), Some(days_left)) => format!("{date} ({days_left})"),
                _ => "no expiration".to_string(),
            };
            println!(
                "- {} ({}) {} [{}]",
                row.display_name,
                row.account_name,
                timing,
                row.email.as_deref().unwrap_or("no address")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(max_age_days: Option<i64>) -> SourceArgs {
        SourceArgs {
            accounts_csv: Some(PathBuf::from("accounts.csv")),
            max_age_days,
        }
    }

    #[test]
    fn snapshot_max_age_defaults_to_ninety_days() {
        let policy = snapshot_policy(&source(None)).expect("default accepted");
        assert_eq!(policy.max_password_age, chrono::Duration::days(90));
    }

    #[test]
    fn snapshot_max_age_outside_range_is_rejected() {
        for days in [0, -1, MAX_PASSWORD_AGE_DAYS + 1, 100_000_000] {
            match snapshot_policy(&source(Some(days))) {
                Err(AppError::InvalidRequest(message)) => {
                    assert!(message.contains("--max-age-days"), "{message}")
                }
                other => panic!("expected invalid request for {days}, got {other:?}"),
            }
        }
    }
}
