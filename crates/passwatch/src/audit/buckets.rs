use serde::Serialize;

use super::domain::{ClassificationResult, PasswordStatus};
use super::filter::InclusionFlags;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportCounts {
    pub total: usize,
    pub expired: usize,
    pub critical: usize,
    pub warning: usize,
    pub ok: usize,
    pub never_expires: usize,
    pub never_logged_in: usize,
    pub disabled: usize,
}

/// Classified accounts grouped for rendering and dispatch.
///
/// `disabled` is filled from the `enabled` flag alone, so an account can sit in
/// a status bucket and in `disabled` at the same time.
#[derive(Debug, Clone, Default)]
pub struct ReportBuckets {
    pub expired: Vec<ClassificationResult>,
    pub critical: Vec<ClassificationResult>,
    pub warning: Vec<ClassificationResult>,
    pub never_expires: Vec<ClassificationResult>,
    pub never_logged_in: Vec<ClassificationResult>,
    pub disabled: Vec<ClassificationResult>,
    pub include: InclusionFlags,
    classified: usize,
    ok: usize,
}

impl ReportBuckets {
    pub fn counts(&self) -> ReportCounts {
        ReportCounts {
            total: self.classified,
            expired: self.expired.len(),
            critical: self.critical.len(),
            warning: self.warning.len(),
            ok: self.ok,
            never_expires: self.never_expires.len(),
            never_logged_in: self.never_logged_in.len(),
            disabled: self.disabled.len(),
        }
    }

    /// Number of accounts that went through classification.
    pub fn classified(&self) -> usize {
        self.classified
    }

    pub fn is_empty(&self) -> bool {
        self.classified == 0
    }

    /// Accounts eligible for a per-user notice, most urgent bucket first.
    pub fn notice_candidates(&self) -> impl Iterator<Item = &ClassificationResult> {
        self.expired
            .iter()
            .chain(self.critical.iter())
            .chain(self.warning.iter())
    }
}

/// Partition classified accounts into report buckets.
///
/// Inclusion has already been decided when accounts were fetched; the flags
/// are carried along so the renderer can decide which sections to show.
pub fn aggregate(results: &[ClassificationResult], include: InclusionFlags) -> ReportBuckets {
    let mut buckets = ReportBuckets {
        include,
        classified: results.len(),
        ..ReportBuckets::default()
    };

    for result in results {
        match result.status {
            PasswordStatus::Expired => buckets.expired.push(result.clone()),
            PasswordStatus::Critical => buckets.critical.push(result.clone()),
            PasswordStatus::Warning => buckets.warning.push(result.clone()),
            PasswordStatus::NeverExpires => buckets.never_expires.push(result.clone()),
            PasswordStatus::NeverLoggedIn => buckets.never_logged_in.push(result.clone()),
            PasswordStatus::Ok => buckets.ok += 1,
        }

        if !result.enabled {
            buckets.disabled.push(result.clone());
        }
    }

    for bucket in [
        &mut buckets.expired,
        &mut buckets.critical,
        &mut buckets.warning,
    ] {
        bucket.sort_by_key(|result| result.days_left().unwrap_or(i64::MAX));
    }

    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::domain::Expiration;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 1, 9, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn result(name: &str, status: PasswordStatus, days_left: Option<i64>) -> ClassificationResult {
        ClassificationResult {
            display_name: name.to_string(),
            account_name: name.to_lowercase(),
            email: Some(format!("{}@example.com", name.to_lowercase())),
            enabled: true,
            password_never_expires: status == PasswordStatus::NeverExpires,
            password_last_set: days_left.map(|_| now() - Duration::days(10)),
            expiration: days_left.map(|days_left| Expiration {
                date: now() + Duration::days(days_left),
                days_left,
            }),
            status,
        }
    }

    fn names(bucket: &[ClassificationResult]) -> Vec<&str> {
        bucket.iter().map(|r| r.display_name.as_str()).collect()
    }

    #[test]
    fn empty_input_yields_empty_buckets() {
        let buckets = aggregate(&[], InclusionFlags::default());
        assert!(buckets.is_empty());
        assert_eq!(buckets.counts(), ReportCounts::default());
    }

    #[test]
    fn status_buckets_sort_soonest_first() {
        let results = vec![
            result("Warn12", PasswordStatus::Warning, Some(12)),
            result("Crit5", PasswordStatus::Critical, Some(5)),
            result("Warn9", PasswordStatus::Warning, Some(9)),
            result("Exp1", PasswordStatus::Expired, Some(-1)),
            result("Crit0", PasswordStatus::Critical, Some(0)),
            result("Exp30", PasswordStatus::Expired, Some(-30)),
            result("Warn9b", PasswordStatus::Warning, Some(9)),
        ];

        let buckets = aggregate(&results, InclusionFlags::default());

        assert_eq!(names(&buckets.expired), ["Exp30", "Exp1"]);
        assert_eq!(names(&buckets.critical), ["Crit0", "Crit5"]);
        assert_eq!(names(&buckets.warning), ["Warn9", "Warn9b", "Warn12"]);
    }

    #[test]
    fn unsorted_buckets_keep_insertion_order() {
        let results = vec![
            result("Zed", PasswordStatus::NeverLoggedIn, None),
            result("Amy", PasswordStatus::NeverLoggedIn, None),
            result("Max", PasswordStatus::NeverExpires, None),
        ];

        let buckets = aggregate(&results, InclusionFlags::default());

        assert_eq!(names(&buckets.never_logged_in), ["Zed", "Amy"]);
        assert_eq!(names(&buckets.never_expires), ["Max"]);
    }

    #[test]
    fn disabled_bucket_is_independent_of_status() {
        let mut healthy = result("Healthy", PasswordStatus::Ok, Some(40));
        healthy.enabled = false;
        let mut expired = result("Gone", PasswordStatus::Expired, Some(-3));
        expired.enabled = false;

        let buckets = aggregate(&[healthy, expired], InclusionFlags::new(true, false));
        let counts = buckets.counts();

        assert_eq!(names(&buckets.disabled), ["Healthy", "Gone"]);
        assert_eq!(names(&buckets.expired), ["Gone"]);
        assert!(buckets.critical.is_empty() && buckets.warning.is_empty());
        assert_eq!(counts.ok, 1);
        assert_eq!(counts.disabled, 2);
        assert_eq!(counts.total, 2);
    }

    #[test]
    fn never_expires_bucket_is_kept_when_flag_is_off() {
        let buckets = aggregate(
            &[result("Svc", PasswordStatus::NeverExpires, None)],
            InclusionFlags::default(),
        );
        assert_eq!(buckets.counts().never_expires, 1);
    }

    #[test]
    fn notice_candidates_walk_expired_then_critical_then_warning() {
        let results = vec![
            result("Warn", PasswordStatus::Warning, Some(10)),
            result("Crit", PasswordStatus::Critical, Some(2)),
            result("Fine", PasswordStatus::Ok, Some(50)),
            result("Exp", PasswordStatus::Expired, Some(-2)),
        ];
        let buckets = aggregate(&results, InclusionFlags::default());
        let order: Vec<&str> = buckets
            .notice_candidates()
            .map(|r| r.display_name.as_str())
            .collect();
        assert_eq!(order, ["Exp", "Crit", "Warn"]);
    }
}
