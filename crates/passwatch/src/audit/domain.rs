use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::filter::InclusionFlags;

/// Account as read from the directory snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub display_name: String,
    pub account_name: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Absent when the account has never authenticated.
    #[serde(default)]
    pub password_last_set: Option<DateTime<Utc>>,
    #[serde(default)]
    pub password_never_expires: bool,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl AccountRecord {
    /// Contact address with surrounding whitespace removed, if one is usable.
    pub fn contact(&self) -> Option<&str> {
        contact_address(self.email.as_deref())
    }
}

pub(crate) fn contact_address(email: Option<&str>) -> Option<&str> {
    email.map(str::trim).filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordStatus {
    Expired,
    Critical,
    Warning,
    Ok,
    NeverExpires,
    NeverLoggedIn,
}

impl PasswordStatus {
    pub const fn ordered() -> [Self; 6] {
        [
            Self::Expired,
            Self::Critical,
            Self::Warning,
            Self::Ok,
            Self::NeverExpires,
            Self::NeverLoggedIn,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Expired => "Expired",
            Self::Critical => "Critical",
            Self::Warning => "Warning",
            Self::Ok => "OK",
            Self::NeverExpires => "Never Expires",
            Self::NeverLoggedIn => "Never Logged In",
        }
    }

    /// Statuses that warrant a per-user notice.
    pub const fn requires_notice(self) -> bool {
        matches!(self, Self::Expired | Self::Critical | Self::Warning)
    }
}

/// Computed expiry of a password. Both parts exist together or not at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expiration {
    pub date: DateTime<Utc>,
    pub days_left: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    pub display_name: String,
    pub account_name: String,
    pub email: Option<String>,
    pub enabled: bool,
    pub password_never_expires: bool,
    pub password_last_set: Option<DateTime<Utc>>,
    pub expiration: Option<Expiration>,
    pub status: PasswordStatus,
}

impl ClassificationResult {
    pub fn expiration_date(&self) -> Option<DateTime<Utc>> {
        self.expiration.map(|expiration| expiration.date)
    }

    pub fn days_left(&self) -> Option<i64> {
        self.expiration.map(|expiration| expiration.days_left)
    }

    pub fn contact(&self) -> Option<&str> {
        contact_address(self.email.as_deref())
    }
}

/// Run-wide thresholds. `critical_threshold_days` is expected to be no greater
/// than `warning_threshold_days`; callers own that ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyThresholds {
    pub warning_threshold_days: i64,
    pub critical_threshold_days: i64,
    pub max_password_age: Duration,
    pub include: InclusionFlags,
}

impl PolicyThresholds {
    pub fn from_policy(
        warning_threshold_days: i64,
        critical_threshold_days: i64,
        include: InclusionFlags,
        policy: &DomainPasswordPolicy,
    ) -> Self {
        Self {
            warning_threshold_days,
            critical_threshold_days,
            max_password_age: policy.max_password_age,
            include,
        }
    }
}

/// Largest maximum password age accepted from callers, in days (100 years).
pub const MAX_PASSWORD_AGE_DAYS: i64 = 36_500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutDuration {
    Minutes(i64),
    UntilUnlocked,
}

/// Domain-wide password policy. Only the maximum age is needed for
/// classification; the rest is informational and may be unknown for
/// snapshot sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainPasswordPolicy {
    pub max_password_age: Duration,
    pub min_password_age: Option<Duration>,
    pub min_length: Option<u32>,
    pub complexity_enabled: Option<bool>,
    pub history_count: Option<u32>,
    pub lockout_threshold: Option<u32>,
    pub lockout_duration: Option<LockoutDuration>,
}

impl DomainPasswordPolicy {
    pub fn with_max_age(max_password_age: Duration) -> Self {
        Self {
            max_password_age,
            min_password_age: None,
            min_length: None,
            complexity_enabled: None,
            history_count: None,
            lockout_threshold: None,
            lockout_duration: None,
        }
    }

    /// Policy for a caller-supplied maximum age; `None` unless
    /// `1..=MAX_PASSWORD_AGE_DAYS`.
    pub fn from_max_age_days(days: i64) -> Option<Self> {
        if !(1..=MAX_PASSWORD_AGE_DAYS).contains(&days) {
            return None;
        }
        Duration::try_days(days).map(Self::with_max_age)
    }
}
