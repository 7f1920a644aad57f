use chrono::{DateTime, Utc};

use super::domain::{
    AccountRecord, ClassificationResult, Expiration, PasswordStatus, PolicyThresholds,
};

const SECONDS_PER_DAY: i64 = 86_400;

/// Classify one account against the run thresholds.
///
/// Rules apply in order and the first match wins: a missing `password_last_set`
/// means the account never logged in, a non-expiring password skips the date
/// math, and everything else is placed by whole days remaining. Threshold
/// comparisons are inclusive and critical is checked before warning.
pub fn classify(
    record: &AccountRecord,
    policy: &PolicyThresholds,
    now: DateTime<Utc>,
) -> ClassificationResult {
    let (status, expiration) = match record.password_last_set {
        None => (PasswordStatus::NeverLoggedIn, None),
        Some(_) if record.password_never_expires => (PasswordStatus::NeverExpires, None),
        Some(last_set) => {
            // Saturates so an absurd maximum age still yields a date far in the future.
            let date = last_set
                .checked_add_signed(policy.max_password_age)
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            let days_left = whole_days_until(now, date);
            let status = status_for_days_left(days_left, policy);
            (status, Some(Expiration { date, days_left }))
        }
    };

    ClassificationResult {
        display_name: record.display_name.clone(),
        account_name: record.account_name.clone(),
        email: record.email.clone(),
        enabled: record.enabled,
        password_never_expires: record.password_never_expires,
        password_last_set: record.password_last_set,
        expiration,
        status,
    }
}

pub fn classify_all(
    records: &[AccountRecord],
    policy: &PolicyThresholds,
    now: DateTime<Utc>,
) -> Vec<ClassificationResult> {
    records
        .iter()
        .map(|record| classify(record, policy, now))
        .collect()
}

fn status_for_days_left(days_left: i64, policy: &PolicyThresholds) -> PasswordStatus {
    if days_left < 0 {
        PasswordStatus::Expired
    } else if days_left <= policy.critical_threshold_days {
        PasswordStatus::Critical
    } else if days_left <= policy.warning_threshold_days {
        PasswordStatus::Warning
    } else {
        PasswordStatus::Ok
    }
}

// Floors toward negative infinity; `Duration::num_days` truncates toward zero,
// which would report a password expired half a day ago as 0 days left.
fn whole_days_until(now: DateTime<Utc>, date: DateTime<Utc>) -> i64 {
    (date - now).num_seconds().div_euclid(SECONDS_PER_DAY)
}
