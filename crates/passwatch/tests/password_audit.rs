use std::cell::RefCell;

use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use passwatch::audit::report::{report_file_name, NoticeContext, SectionKind};
use passwatch::audit::{
    AuditOutcome, AuditRun, AuditSettings, CsvDirectory, DispatchSettings, InclusionFlags,
    MailError, MailTransport, NotificationKind, NotificationRequest, PasswordStatus, ReportCounts,
};

const SNAPSHOT: &str = "\
DisplayName,SamAccountName,EmailAddress,PasswordLastSet,PasswordNeverExpires,Enabled
Account A,a,a@example.com,2025-09-11T09:00:00Z,False,True
Account B,b,b@example.com,,False,True
Account C,c,c@example.com,2024-02-01T09:00:00Z,True,True
";

#[derive(Default)]
struct Outbox {
    sent: RefCell<Vec<NotificationRequest>>,
}

impl MailTransport for Outbox {
    fn send(&self, request: &NotificationRequest) -> Result<(), MailError> {
        self.sent.borrow_mut().push(request.clone());
        Ok(())
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 1, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

fn settings(include: InclusionFlags, report_dir: Option<std::path::PathBuf>) -> AuditSettings {
    AuditSettings {
        organizational_unit: String::new(),
        warning_threshold_days: 14,
        critical_threshold_days: 7,
        include,
        report_dir,
        dispatch: DispatchSettings {
            report_only: false,
            admin_recipients: vec!["it-admins@example.com".to_string()],
            notice: NoticeContext {
                signature: "IT Support".to_string(),
            },
        },
    }
}

fn snapshot(csv: &str) -> CsvDirectory {
    CsvDirectory::from_reader(csv.as_bytes(), Duration::days(30)).expect("snapshot parses")
}

#[test]
fn three_account_example_lands_in_expected_buckets() {
    let directory = snapshot(SNAPSHOT);
    let outbox = Outbox::default();

    let outcome = AuditRun::new(&directory, &outbox)
        .execute(&settings(InclusionFlags::new(false, true), None), now())
        .expect("audit runs");

    let AuditOutcome::Completed(summary) = outcome else {
        panic!("expected classified accounts");
    };
    let buckets = &summary.buckets;

    assert_eq!(buckets.warning.len(), 1);
    assert_eq!(buckets.warning[0].account_name, "a");
    assert_eq!(buckets.warning[0].days_left(), Some(10));
    assert_eq!(buckets.warning[0].status, PasswordStatus::Warning);
    assert_eq!(buckets.never_logged_in[0].account_name, "b");
    assert_eq!(buckets.never_expires[0].account_name, "c");
    assert!(buckets.never_logged_in[0].expiration_date().is_none());
    assert!(buckets.never_expires[0].days_left().is_none());
    assert_eq!(
        buckets.counts(),
        ReportCounts {
            total: 3,
            expired: 0,
            critical: 0,
            warning: 1,
            ok: 0,
            never_expires: 1,
            never_logged_in: 1,
            disabled: 0,
        }
    );

    let sent = outbox.sent.borrow();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].recipients, ["a@example.com"]);
    assert_eq!(sent[0].subject, "Your password expires in 10 days");
    assert_eq!(sent[1].kind, NotificationKind::Digest);
    assert_eq!(sent[1].recipients, ["it-admins@example.com"]);
}

#[test]
fn default_inclusion_leaves_never_expiring_accounts_out() {
    let directory = snapshot(SNAPSHOT);
    let outbox = Outbox::default();

    let outcome = AuditRun::new(&directory, &outbox)
        .execute(&settings(InclusionFlags::default(), None), now())
        .expect("audit runs");

    let AuditOutcome::Completed(summary) = outcome else {
        panic!("expected classified accounts");
    };
    assert_eq!(summary.buckets.counts().total, 2);
    assert!(summary.buckets.never_expires.is_empty());
    assert!(summary.document.section(SectionKind::NeverExpires).is_none());
    assert!(summary.document.section(SectionKind::Disabled).is_none());
}

#[test]
fn disabled_accounts_are_reported_alongside_their_status() {
    let csv = "\
DisplayName,SamAccountName,EmailAddress,PasswordLastSet,PasswordNeverExpires,Enabled
Dormant,dormant,dormant@example.com,2025-09-29T09:00:00Z,False,False
Lapsed,lapsed,,2025-08-01T09:00:00Z,False,False
";
    let directory = snapshot(csv);
    let outbox = Outbox::default();

    let outcome = AuditRun::new(&directory, &outbox)
        .execute(&settings(InclusionFlags::new(true, false), None), now())
        .expect("audit runs");

    let AuditOutcome::Completed(summary) = outcome else {
        panic!("expected classified accounts");
    };
    let counts = summary.buckets.counts();
    assert_eq!((counts.ok, counts.expired, counts.disabled), (1, 1, 2));
    assert_eq!(summary.plan.skipped.len(), 1);
    assert_eq!(summary.plan.skipped[0].account_name, "lapsed");

    let digest = outbox
        .sent
        .borrow()
        .iter()
        .find(|request| request.kind == NotificationKind::Digest)
        .cloned()
        .expect("digest sent");
    assert!(digest.html_body.contains("Disabled Accounts"));
    assert!(digest.html_body.contains("lapsed"));
}

#[test]
fn report_file_is_written_with_timestamped_name() {
    let directory = snapshot(SNAPSHOT);
    let outbox = Outbox::default();
    let temp = tempfile::tempdir().expect("temp dir");
    let reports = temp.path().join("reports");

    let outcome = AuditRun::new(&directory, &outbox)
        .execute(
            &settings(InclusionFlags::default(), Some(reports.clone())),
            now(),
        )
        .expect("audit runs");

    let AuditOutcome::Completed(summary) = outcome else {
        panic!("expected classified accounts");
    };
    let expected_name = report_file_name(now().with_timezone(&Local).naive_local());
    let path = summary.report_path.expect("report path");
    assert_eq!(path, reports.join(&expected_name));
    assert!(expected_name.starts_with("PasswordExpirationReport_"));

    let html = std::fs::read_to_string(&path).expect("report readable");
    assert!(html.contains("Account A"));
    assert!(html.contains("Never Logged In"));
}
