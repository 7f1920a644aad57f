use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::info;

use super::{DirectoryError, DirectoryGateway};
use crate::audit::domain::{AccountRecord, DomainPasswordPolicy};
use crate::audit::filter::InclusionFlags;

/// Account export produced by directory tooling (for example
/// `Get-ADUser | Export-Csv`), used for offline audits.
#[derive(Debug, Clone)]
pub struct CsvDirectory {
    accounts: Vec<SnapshotAccount>,
    policy: DomainPasswordPolicy,
}

#[derive(Debug, Clone)]
struct SnapshotAccount {
    record: AccountRecord,
    distinguished_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SnapshotRow {
    #[serde(rename = "DisplayName", default)]
    display_name: String,
    #[serde(rename = "SamAccountName")]
    account_name: String,
    #[serde(
        rename = "EmailAddress",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    email: Option<String>,
    #[serde(
        rename = "PasswordLastSet",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    password_last_set: Option<String>,
    #[serde(
        rename = "PasswordNeverExpires",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    password_never_expires: Option<String>,
    #[serde(rename = "Enabled", default, deserialize_with = "empty_string_as_none")]
    enabled: Option<String>,
    #[serde(
        rename = "DistinguishedName",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    distinguished_name: Option<String>,
}

impl CsvDirectory {
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        max_password_age: Duration,
    ) -> Result<Self, DirectoryError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, max_password_age)
    }

    pub fn from_reader<R: Read>(
        reader: R,
        max_password_age: Duration,
    ) -> Result<Self, DirectoryError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut accounts = Vec::new();
        for (index, row) in csv_reader.deserialize::<SnapshotRow>().enumerate() {
            // header is line 1
            let line = index as u64 + 2;
            accounts.push(snapshot_account(row?, line)?);
        }

        info!(accounts = accounts.len(), "account snapshot loaded");

        Ok(Self {
            accounts,
            policy: DomainPasswordPolicy::with_max_age(max_password_age),
        })
    }

    /// Replace the policy reported alongside the snapshot.
    pub fn with_policy(mut self, policy: DomainPasswordPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl DirectoryGateway for CsvDirectory {
    fn fetch_accounts(
        &self,
        organizational_unit: &str,
        include: &InclusionFlags,
    ) -> Result<Vec<AccountRecord>, DirectoryError> {
        let scope = organizational_unit.trim().to_ascii_lowercase();
        Ok(self
            .accounts
            .iter()
            .filter(|account| within_scope(account.distinguished_name.as_deref(), &scope))
            .map(|account| &account.record)
            .filter(|record| include.admits(record))
            .cloned()
            .collect())
    }

    fn fetch_domain_password_policy(&self) -> Result<DomainPasswordPolicy, DirectoryError> {
        Ok(self.policy.clone())
    }
}

// Rows without a distinguished name are assumed to be exported from the target OU.
fn within_scope(distinguished_name: Option<&str>, scope: &str) -> bool {
    match distinguished_name {
        Some(dn) if !scope.is_empty() => dn.to_ascii_lowercase().ends_with(scope),
        _ => true,
    }
}

fn snapshot_account(row: SnapshotRow, line: u64) -> Result<SnapshotAccount, DirectoryError> {
    let invalid = |reason: String| DirectoryError::InvalidRecord { row: line, reason };

    if row.account_name.is_empty() {
        return Err(invalid("SamAccountName is empty".to_string()));
    }

    let password_last_set = match row.password_last_set.as_deref() {
        Some(raw) => Some(
            parse_timestamp(raw)
                .ok_or_else(|| invalid(format!("unrecognized PasswordLastSet '{raw}'")))?,
        ),
        None => None,
    };
    let password_never_expires = parse_flag(row.password_never_expires.as_deref(), false)
        .map_err(|raw| invalid(format!("PasswordNeverExpires '{raw}' is not a boolean")))?;
    let enabled = parse_flag(row.enabled.as_deref(), true)
        .map_err(|raw| invalid(format!("Enabled '{raw}' is not a boolean")))?;

    let display_name = if row.display_name.is_empty() {
        row.account_name.clone()
    } else {
        row.display_name
    };

    Ok(SnapshotAccount {
        record: AccountRecord {
            display_name,
            account_name: row.account_name,
            email: row.email,
            password_last_set,
            password_never_expires,
            enabled,
        },
        distinguished_name: row.distinguished_name,
    })
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn parse_flag(value: Option<&str>, default: bool) -> Result<bool, String> {
    match value.map(|raw| raw.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(raw) => match raw.as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(raw),
        },
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const EXPORT: &str = "\
DisplayName,SamAccountName,EmailAddress,PasswordLastSet,PasswordNeverExpires,Enabled,DistinguishedName
Ada Lovelace,alovelace,ada@example.com,2025-09-01 08:00:00,False,True,\"CN=Ada Lovelace,OU=Staff,DC=corp,DC=example\"
Build Bot,svc_build,,2024-01-01T00:00:00Z,True,True,\"CN=Build Bot,OU=Service,DC=corp,DC=example\"
New Hire,nhire,nhire@example.com,,False,True,\"CN=New Hire,OU=Staff,DC=corp,DC=example\"
Old Timer,otimer,otimer@example.com,2025-01-05,False,False,\"CN=Old Timer,OU=Staff,DC=corp,DC=example\"
";

    fn directory() -> CsvDirectory {
        CsvDirectory::from_reader(EXPORT.as_bytes(), Duration::days(90)).expect("export parses")
    }

    #[test]
    fn parses_export_columns() {
        let all = directory()
            .fetch_accounts("", &InclusionFlags::new(true, true))
            .expect("accounts fetched");

        assert_eq!(all.len(), 4);
        assert_eq!(
            all[0].password_last_set,
            Utc.with_ymd_and_hms(2025, 9, 1, 8, 0, 0).single()
        );
        assert!(all[1].password_never_expires);
        assert_eq!(all[1].email, None);
        assert_eq!(all[2].password_last_set, None);
        assert!(!all[3].enabled);
    }

    #[test]
    fn fetch_applies_inclusion_table_and_scope() {
        let dir = directory();

        let default = dir
            .fetch_accounts("OU=Staff,DC=corp,DC=example", &InclusionFlags::default())
            .expect("accounts fetched");
        let names: Vec<&str> = default.iter().map(|r| r.account_name.as_str()).collect();
        assert_eq!(names, ["alovelace", "nhire"]);

        let service_only = dir
            .fetch_accounts("ou=service,dc=corp,dc=example", &InclusionFlags::new(false, true))
            .expect("accounts fetched");
        assert_eq!(service_only.len(), 1);
        assert_eq!(service_only[0].account_name, "svc_build");
    }

    #[test]
    fn policy_reports_configured_max_age() {
        let policy = directory()
            .fetch_domain_password_policy()
            .expect("policy available");
        assert_eq!(policy.max_password_age, Duration::days(90));
        assert_eq!(policy.min_length, None);
    }

    #[test]
    fn invalid_rows_report_their_line() {
        let export = "SamAccountName,PasswordLastSet\njdoe,yesterday\n";
        match CsvDirectory::from_reader(export.as_bytes(), Duration::days(90)) {
            Err(DirectoryError::InvalidRecord { row, reason }) => {
                assert_eq!(row, 2);
                assert!(reason.contains("yesterday"));
            }
            other => panic!("expected invalid record, got {other:?}"),
        }
    }
}
