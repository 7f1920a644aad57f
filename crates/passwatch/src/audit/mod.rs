//! Password-expiration audit: classify directory accounts, group them into
//! report buckets, render the digest, and plan notification mail.

pub mod buckets;
pub mod classifier;
pub mod directory;
pub mod dispatch;
pub mod domain;
pub mod filter;
pub mod mail;
pub mod pipeline;
pub mod report;

pub use buckets::{aggregate, ReportBuckets, ReportCounts};
pub use classifier::{classify, classify_all};
pub use directory::{CsvDirectory, DirectoryError, DirectoryGateway, LdapDirectory, LdapSettings};
pub use dispatch::{
    DeliveryFailure, DeliverySummary, DispatchPlan, DispatchSettings, Dispatcher, SkippedNotice,
};
pub use domain::{
    AccountRecord, ClassificationResult, DomainPasswordPolicy, Expiration, LockoutDuration,
    PasswordStatus, PolicyThresholds, MAX_PASSWORD_AGE_DAYS,
};
pub use filter::InclusionFlags;
pub use mail::{
    GatedTransport, LogTransport, MailError, MailTransport, NotificationKind, NotificationRequest,
    SendSchedule, SmtpMailer, SmtpSettings,
};
pub use pipeline::{AuditError, AuditOutcome, AuditRun, AuditSettings, AuditSummary};
