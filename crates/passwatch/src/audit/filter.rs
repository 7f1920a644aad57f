//! Fetch-time inclusion rules.
//!
//! The two inclusion flags select accounts through a single table:
//!
//! | include_disabled | include_never_expires | accounts fetched               |
//! |------------------|-----------------------|--------------------------------|
//! | false            | false                 | enabled and expiring           |
//! | true             | false                 | expiring (enabled or disabled) |
//! | false            | true                  | enabled                        |
//! | true             | true                  | all                            |
//!
//! The same table drives the server-side LDAP filter and the client-side
//! predicate, so every directory source yields the same population.

use serde::{Deserialize, Serialize};

use super::domain::AccountRecord;

/// `userAccountControl` bit for a disabled account.
pub const UAC_ACCOUNT_DISABLE: u32 = 0x0002;
/// `userAccountControl` bit for a password that never expires.
pub const UAC_DONT_EXPIRE_PASSWORD: u32 = 0x10000;

const LDAP_MATCHING_RULE_BIT_AND: &str = "1.2.840.113556.1.4.803";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionFlags {
    #[serde(default)]
    pub include_disabled: bool,
    #[serde(default)]
    pub include_never_expires: bool,
}

impl InclusionFlags {
    pub const fn new(include_disabled: bool, include_never_expires: bool) -> Self {
        Self {
            include_disabled,
            include_never_expires,
        }
    }

    pub fn admits(&self, record: &AccountRecord) -> bool {
        (self.include_disabled || record.enabled)
            && (self.include_never_expires || !record.password_never_expires)
    }

    /// Server-side equivalent of [`InclusionFlags::admits`] for Active Directory.
    pub fn ldap_filter(&self) -> String {
        let mut filter = String::from("(&(objectCategory=person)(objectClass=user)");
        if !self.include_disabled {
            filter.push_str(&excluded_bit(UAC_ACCOUNT_DISABLE));
        }
        if !self.include_never_expires {
            filter.push_str(&excluded_bit(UAC_DONT_EXPIRE_PASSWORD));
        }
        filter.push(')');
        filter
    }
}

fn excluded_bit(bit: u32) -> String {
    format!("(!(userAccountControl:{LDAP_MATCHING_RULE_BIT_AND}:={bit}))")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(enabled: bool, never_expires: bool) -> AccountRecord {
        AccountRecord {
            display_name: "Sample".to_string(),
            account_name: "sample".to_string(),
            email: None,
            password_last_set: None,
            password_never_expires: never_expires,
            enabled,
        }
    }

    #[test]
    fn predicate_table_matches_flags() {
        let cases = [
            (InclusionFlags::new(false, false), [true, false, false, false]),
            (InclusionFlags::new(true, false), [true, false, true, false]),
            (InclusionFlags::new(false, true), [true, true, false, false]),
            (InclusionFlags::new(true, true), [true, true, true, true]),
        ];
        let population = [
            record(true, false),
            record(true, true),
            record(false, false),
            record(false, true),
        ];

        for (flags, expected) in cases {
            let admitted: Vec<bool> = population.iter().map(|r| flags.admits(r)).collect();
            assert_eq!(admitted, expected, "flags {flags:?}");
        }
    }

    #[test]
    fn ldap_filter_excludes_disabled_and_non_expiring_by_default() {
        let filter = InclusionFlags::default().ldap_filter();
        assert_eq!(
            filter,
            "(&(objectCategory=person)(objectClass=user)\
             (!(userAccountControl:1.2.840.113556.1.4.803:=2))\
             (!(userAccountControl:1.2.840.113556.1.4.803:=65536)))"
        );
    }

    #[test]
    fn ldap_filter_with_everything_included_only_scopes_users() {
        let filter = InclusionFlags::new(true, true).ldap_filter();
        assert_eq!(filter, "(&(objectCategory=person)(objectClass=user))");
    }
}
