use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use ldap3::adapters::{Adapter, EntriesOnly, PagedResults};
use ldap3::{LdapConn, LdapConnSettings, LdapError, Scope, SearchEntry};
use tracing::{debug, info, warn};

use super::{DirectoryError, DirectoryGateway};
use crate::audit::domain::{AccountRecord, DomainPasswordPolicy, LockoutDuration};
use crate::audit::filter::{InclusionFlags, UAC_ACCOUNT_DISABLE, UAC_DONT_EXPIRE_PASSWORD};

const ACCOUNT_ATTRIBUTES: [&str; 5] = [
    "displayName",
    "sAMAccountName",
    "mail",
    "pwdLastSet",
    "userAccountControl",
];

const POLICY_ATTRIBUTES: [&str; 7] = [
    "maxPwdAge",
    "minPwdAge",
    "minPwdLength",
    "pwdProperties",
    "pwdHistoryLength",
    "lockoutThreshold",
    "lockoutDuration",
];

const LDAP_NO_SUCH_OBJECT: u32 = 32;
/// Seconds between 1601-01-01 (FILETIME epoch) and 1970-01-01.
const FILETIME_UNIX_OFFSET_SECS: i64 = 11_644_473_600;
const TICKS_PER_SECOND: i64 = 10_000_000;
const TICKS_PER_MINUTE: i64 = 60 * TICKS_PER_SECOND;
const DOMAIN_PASSWORD_COMPLEX: u32 = 0x1;

#[derive(Debug, Clone)]
pub struct LdapSettings {
    pub url: String,
    pub bind_dn: Option<String>,
    pub bind_password: Option<String>,
    pub starttls: bool,
    pub timeout: std::time::Duration,
    pub page_size: i32,
}

/// Active Directory source backed by a synchronous `ldap3` connection.
pub struct LdapDirectory {
    url: String,
    page_size: i32,
    conn: Mutex<LdapConn>,
}

impl std::fmt::Debug for LdapDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapDirectory")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl LdapDirectory {
    /// Open the connection and bind. Failing here is a setup error.
    pub fn connect(settings: &LdapSettings) -> Result<Self, DirectoryError> {
        debug!(url = %settings.url, "connecting to directory");

        let conn_settings = LdapConnSettings::new()
            .set_conn_timeout(settings.timeout)
            .set_starttls(settings.starttls);
        let mut conn = LdapConn::with_settings(conn_settings, &settings.url).map_err(|source| {
            DirectoryError::Connect {
                url: settings.url.clone(),
                source,
            }
        })?;

        if let Some(bind_dn) = settings.bind_dn.as_deref() {
            let password = settings.bind_password.as_deref().unwrap_or("");
            let result =
                conn.simple_bind(bind_dn, password)
                    .map_err(|source| DirectoryError::Connect {
                        url: settings.url.clone(),
                        source,
                    })?;
            if result.rc != 0 {
                return Err(DirectoryError::Bind {
                    bind_dn: bind_dn.to_string(),
                    code: result.rc,
                    message: result.text,
                });
            }
        }

        info!(url = %settings.url, "directory connection established");

        Ok(Self {
            url: settings.url.clone(),
            page_size: settings.page_size,
            conn: Mutex::new(conn),
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, LdapConn>, DirectoryError> {
        self.conn
            .lock()
            .map_err(|_| DirectoryError::Unavailable("directory connection lock poisoned".into()))
    }

    fn naming_context(conn: &mut LdapConn) -> Result<String, DirectoryError> {
        let (entries, _) = conn
            .search("", Scope::Base, "(objectClass=*)", vec!["defaultNamingContext"])
            .and_then(|result| result.success())
            .map_err(|err| DirectoryError::PolicyUnavailable(format!("root DSE unreadable: {err}")))?;

        entries
            .into_iter()
            .next()
            .map(SearchEntry::construct)
            .and_then(|entry| first_value(&entry.attrs, "defaultNamingContext").map(str::to_string))
            .ok_or_else(|| {
                DirectoryError::PolicyUnavailable(
                    "root DSE did not report a defaultNamingContext".into(),
                )
            })
    }
}

impl DirectoryGateway for LdapDirectory {
    fn fetch_accounts(
        &self,
        organizational_unit: &str,
        include: &InclusionFlags,
    ) -> Result<Vec<AccountRecord>, DirectoryError> {
        let filter = include.ldap_filter();
        debug!(base = organizational_unit, %filter, "searching directory");

        let mut conn = self.connection()?;
        let adapters: Vec<Box<dyn Adapter<_, _>>> = vec![
            Box::new(EntriesOnly::new()),
            Box::new(PagedResults::new(self.page_size)),
        ];
        let mut search = conn
            .streaming_search_with(
                adapters,
                organizational_unit,
                Scope::Subtree,
                &filter,
                ACCOUNT_ATTRIBUTES.to_vec(),
            )
            .map_err(|source| search_error(organizational_unit, source))?;

        let mut records = Vec::new();
        while let Some(entry) = search
            .next()
            .map_err(|source| search_error(organizational_unit, source))?
        {
            let entry = SearchEntry::construct(entry);
            match account_from_attributes(&entry.attrs) {
                Some(record) if include.admits(&record) => records.push(record),
                Some(_) => {}
                None => warn!(dn = %entry.dn, "skipping directory entry without sAMAccountName"),
            }
        }

        search
            .result()
            .success()
            .map_err(|source| search_error(organizational_unit, source))?;

        info!(base = organizational_unit, accounts = records.len(), "directory snapshot fetched");
        Ok(records)
    }

    fn fetch_domain_password_policy(&self) -> Result<DomainPasswordPolicy, DirectoryError> {
        let mut conn = self.connection()?;
        let naming_context = Self::naming_context(&mut conn)?;

        let (entries, _) = conn
            .search(
                &naming_context,
                Scope::Base,
                "(objectClass=domain)",
                POLICY_ATTRIBUTES.to_vec(),
            )
            .and_then(|result| result.success())
            .map_err(|err| {
                DirectoryError::PolicyUnavailable(format!(
                    "unable to read domain object {naming_context}: {err}"
                ))
            })?;

        let entry = entries
            .into_iter()
            .next()
            .map(SearchEntry::construct)
            .ok_or_else(|| {
                DirectoryError::PolicyUnavailable(format!(
                    "domain object {naming_context} not found"
                ))
            })?;

        policy_from_attributes(&entry.attrs)
    }
}

fn search_error(base: &str, source: LdapError) -> DirectoryError {
    match &source {
        LdapError::LdapResult { result } if result.rc == LDAP_NO_SUCH_OBJECT => {
            DirectoryError::InvalidOrganizationalUnit(base.to_string())
        }
        _ => DirectoryError::Search {
            base: base.to_string(),
            source,
        },
    }
}

fn first_value<'a>(attrs: &'a HashMap<String, Vec<String>>, name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, values)| values.first())
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn integer<T: std::str::FromStr>(attrs: &HashMap<String, Vec<String>>, name: &str) -> Option<T> {
    first_value(attrs, name).and_then(|value| value.parse().ok())
}

pub(crate) fn account_from_attributes(
    attrs: &HashMap<String, Vec<String>>,
) -> Option<AccountRecord> {
    let account_name = first_value(attrs, "sAMAccountName")?.to_string();
    let display_name = first_value(attrs, "displayName")
        .map(str::to_string)
        .unwrap_or_else(|| account_name.clone());
    let uac = integer::<u32>(attrs, "userAccountControl").unwrap_or(0);

    Some(AccountRecord {
        display_name,
        account_name,
        email: first_value(attrs, "mail").map(str::to_string),
        password_last_set: integer::<i64>(attrs, "pwdLastSet").and_then(filetime_to_utc),
        password_never_expires: uac & UAC_DONT_EXPIRE_PASSWORD != 0,
        enabled: uac & UAC_ACCOUNT_DISABLE == 0,
    })
}

pub(crate) fn policy_from_attributes(
    attrs: &HashMap<String, Vec<String>>,
) -> Result<DomainPasswordPolicy, DirectoryError> {
    let max_password_age = integer::<i64>(attrs, "maxPwdAge")
        .and_then(interval_to_duration)
        .filter(|age| *age > Duration::zero())
        .ok_or_else(|| {
            DirectoryError::PolicyUnavailable(
                "domain policy does not set a maximum password age".into(),
            )
        })?;

    Ok(DomainPasswordPolicy {
        max_password_age,
        min_password_age: integer::<i64>(attrs, "minPwdAge").and_then(interval_to_duration),
        min_length: integer(attrs, "minPwdLength"),
        complexity_enabled: integer::<u32>(attrs, "pwdProperties")
            .map(|properties| properties & DOMAIN_PASSWORD_COMPLEX != 0),
        history_count: integer(attrs, "pwdHistoryLength"),
        lockout_threshold: integer(attrs, "lockoutThreshold"),
        lockout_duration: integer::<i64>(attrs, "lockoutDuration").map(|raw| match raw {
            i64::MIN => LockoutDuration::UntilUnlocked,
            ticks => LockoutDuration::Minutes(ticks.abs() / TICKS_PER_MINUTE),
        }),
    })
}

/// `pwdLastSet` is a FILETIME; zero means the password was never set.
pub(crate) fn filetime_to_utc(ticks: i64) -> Option<DateTime<Utc>> {
    if ticks <= 0 || ticks == i64::MAX {
        return None;
    }
    let secs = ticks / TICKS_PER_SECOND - FILETIME_UNIX_OFFSET_SECS;
    let nanos = (ticks % TICKS_PER_SECOND) * 100;
    DateTime::from_timestamp(secs, u32::try_from(nanos).ok()?)
}

/// Policy intervals are negative 100ns counts; `i64::MIN` stands for "never".
pub(crate) fn interval_to_duration(ticks: i64) -> Option<Duration> {
    if ticks == i64::MIN {
        return None;
    }
    Some(Duration::microseconds(ticks.abs() / 10))
}
