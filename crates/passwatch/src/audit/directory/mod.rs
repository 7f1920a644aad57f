//! Directory sources for account snapshots and the domain password policy.

mod ldap;
mod snapshot;

pub use ldap::{LdapDirectory, LdapSettings};
pub use snapshot::CsvDirectory;

use super::domain::{AccountRecord, DomainPasswordPolicy};
use super::filter::InclusionFlags;

/// Read access to the accounts under an organizational unit and the domain policy.
pub trait DirectoryGateway {
    /// Accounts under `organizational_unit` admitted by `include`.
    fn fetch_accounts(
        &self,
        organizational_unit: &str,
        include: &InclusionFlags,
    ) -> Result<Vec<AccountRecord>, DirectoryError>;

    fn fetch_domain_password_policy(&self) -> Result<DomainPasswordPolicy, DirectoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("unable to reach directory at {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: ldap3::LdapError,
    },
    #[error("directory bind as {bind_dn} rejected (code {code}): {message}")]
    Bind {
        bind_dn: String,
        code: u32,
        message: String,
    },
    #[error("organizational unit {0} does not exist")]
    InvalidOrganizationalUnit(String),
    #[error("directory search under {base} failed: {source}")]
    Search {
        base: String,
        #[source]
        source: ldap3::LdapError,
    },
    #[error("domain password policy unavailable: {0}")]
    PolicyUnavailable(String),
    #[error("directory unavailable: {0}")]
    Unavailable(String),
    #[error("failed to read account snapshot: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid account snapshot data: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid account snapshot row {row}: {reason}")]
    InvalidRecord { row: u64, reason: String },
}
