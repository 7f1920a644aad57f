use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::Weekday;

use crate::audit::report::NoticeContext;
use crate::audit::{
    AuditSettings, DispatchSettings, InclusionFlags, LdapSettings, SendSchedule, SmtpSettings,
};

const LDAP_PAGE_SIZE: i32 = 500;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub directory: DirectoryConfig,
    pub mail: MailConfig,
    pub audit: AuditConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(&env_or("APP_ENV", "development"));

        let host = env_or("APP_HOST", "127.0.0.1");
        let port = env_or("APP_PORT", "3000")
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let telemetry = TelemetryConfig {
            log_level: env_or("APP_LOG_LEVEL", "info"),
            json: env_or("APP_LOG_FORMAT", "compact").eq_ignore_ascii_case("json"),
        };

        let directory = DirectoryConfig {
            url: optional("LDAP_URL"),
            bind_dn: optional("LDAP_BIND_DN"),
            bind_password: optional("LDAP_BIND_PASSWORD"),
            target_ou: optional("TARGET_OU"),
            starttls: bool_var("LDAP_STARTTLS", false)?,
            timeout_secs: number_var("LDAP_TIMEOUT_SECS", 10)?,
        };

        let mail = MailConfig {
            smtp_host: optional("SMTP_HOST"),
            smtp_port: number_var("SMTP_PORT", 25)?,
            username: optional("SMTP_USERNAME"),
            password: optional("SMTP_PASSWORD"),
            starttls: bool_var("SMTP_STARTTLS", true)?,
            from: optional("MAIL_FROM"),
            admin_recipients: parse_recipients(&env_or("ADMIN_RECIPIENTS", "")),
            signature: env_or("MAIL_SIGNATURE", "IT Support"),
            schedule: parse_schedule(&env_or("SEND_WEEKDAYS", "any"))?,
        };

        let audit = AuditConfig {
            warning_threshold_days: number_var("WARNING_THRESHOLD_DAYS", 14)?,
            critical_threshold_days: number_var("CRITICAL_THRESHOLD_DAYS", 7)?,
            include_disabled: bool_var("INCLUDE_DISABLED", false)?,
            include_never_expires: bool_var("INCLUDE_NEVER_EXPIRES", false)?,
            report_only: bool_var("REPORT_ONLY", false)?,
            report_dir: PathBuf::from(env_or("REPORT_DIR", ".")),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry,
            directory,
            mail,
            audit,
        })
    }

    /// Connection settings for a live directory run.
    pub fn require_directory(&self) -> Result<LdapSettings, ConfigError> {
        let url = self
            .directory
            .url
            .clone()
            .ok_or(ConfigError::Missing { var: "LDAP_URL" })?;
        if self.directory.target_ou.is_none() {
            return Err(ConfigError::Missing { var: "TARGET_OU" });
        }

        Ok(LdapSettings {
            url,
            bind_dn: self.directory.bind_dn.clone(),
            bind_password: self.directory.bind_password.clone(),
            starttls: self.directory.starttls,
            timeout: Duration::from_secs(self.directory.timeout_secs),
            page_size: LDAP_PAGE_SIZE,
        })
    }

    /// Relay settings; only needed when mail will actually be sent.
    pub fn require_mail(&self) -> Result<SmtpSettings, ConfigError> {
        let host = self
            .mail
            .smtp_host
            .clone()
            .ok_or(ConfigError::Missing { var: "SMTP_HOST" })?;
        let from = self
            .mail
            .from
            .clone()
            .ok_or(ConfigError::Missing { var: "MAIL_FROM" })?;

        Ok(SmtpSettings {
            host,
            port: self.mail.smtp_port,
            username: self.mail.username.clone(),
            password: self.mail.password.clone(),
            starttls: self.mail.starttls,
            from,
        })
    }

    pub fn audit_settings(&self) -> AuditSettings {
        AuditSettings {
            organizational_unit: self.directory.target_ou.clone().unwrap_or_default(),
            warning_threshold_days: self.audit.warning_threshold_days,
            critical_threshold_days: self.audit.critical_threshold_days,
            include: self.audit.include(),
            report_dir: Some(self.audit.report_dir.clone()),
            dispatch: DispatchSettings {
                report_only: self.audit.report_only,
                admin_recipients: self.mail.admin_recipients.clone(),
                notice: NoticeContext {
                    signature: self.mail.signature.clone(),
                },
            },
        }
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub json: bool,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub url: Option<String>,
    pub bind_dn: Option<String>,
    pub bind_password: Option<String>,
    pub target_ou: Option<String>,
    pub starttls: bool,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub starttls: bool,
    pub from: Option<String>,
    pub admin_recipients: Vec<String>,
    pub signature: String,
    pub schedule: SendSchedule,
}

#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub warning_threshold_days: i64,
    pub critical_threshold_days: i64,
    pub include_disabled: bool,
    pub include_never_expires: bool,
    pub report_only: bool,
    pub report_dir: PathBuf,
}

impl AuditConfig {
    pub fn include(&self) -> InclusionFlags {
        InclusionFlags::new(self.include_disabled, self.include_never_expires)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidBool { var: &'static str, value: String },
    InvalidNumber { var: &'static str, value: String },
    InvalidWeekday { value: String },
    EmptySchedule { value: String },
    Missing { var: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidBool { var, value } => {
                write!(f, "{var} must be true/false, yes/no, on/off or 1/0 (got '{value}')")
            }
            ConfigError::InvalidNumber { var, value } => {
                write!(f, "{var} must be a whole number (got '{value}')")
            }
            ConfigError::InvalidWeekday { value } => {
                write!(f, "SEND_WEEKDAYS contains an unknown weekday '{value}'")
            }
            ConfigError::EmptySchedule { value } => {
                write!(f, "SEND_WEEKDAYS names no weekday (got '{value}'); use 'any' to send every day")
            }
            ConfigError::Missing { var } => write!(f, "{var} is required but not set"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

fn env_or(var: &str, default: &str) -> String {
    env::var(var).unwrap_or_else(|_| default.to_string())
}

fn optional(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn bool_var(var: &'static str, default: bool) -> Result<bool, ConfigError> {
    match optional(var) {
        None => Ok(default),
        Some(value) => parse_bool(&value).ok_or(ConfigError::InvalidBool { var, value }),
    }
}

fn number_var<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(var) {
        None => Ok(default),
        Some(value) => value
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split([',', ';'])
        .map(str::trim)
        .filter(|address| !address.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_schedule(raw: &str) -> Result<SendSchedule, ConfigError> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("any") {
        return Ok(SendSchedule::Always);
    }

    let mut days = Vec::new();
    for part in raw.split([',', ';']).map(str::trim).filter(|p| !p.is_empty()) {
        let day = part
            .parse::<Weekday>()
            .map_err(|_| ConfigError::InvalidWeekday {
                value: part.to_string(),
            })?;
        if !days.contains(&day) {
            days.push(day);
        }
    }
    if days.is_empty() {
        return Err(ConfigError::EmptySchedule {
            value: raw.to_string(),
        });
    }
    Ok(SendSchedule::Weekdays(days))
}
