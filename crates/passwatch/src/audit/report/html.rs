//! HTML rendering for the administrator digest and per-user notices.

use std::fmt::{self, Write};

use super::super::domain::{ClassificationResult, Expiration, PasswordStatus};
use super::document::{ReportDocument, ReportRow, ReportSection};
use super::views::{format_date, format_days_left};

const STYLE: &str = "body{font-family:Segoe UI,Arial,sans-serif;color:#222;margin:24px}\
h1{font-size:22px;margin-bottom:4px}h2{font-size:17px;margin-top:28px}\
.meta{color:#666;font-size:13px}\
table{border-collapse:collapse;width:100%;margin-top:8px;font-size:13px}\
th,td{border:1px solid #ddd;padding:6px 8px;text-align:left}th{background:#f4f4f4}\
.summary td{text-align:center;font-weight:600}\
.expired h2{color:#b00020}.critical h2{color:#d35400}.warning h2{color:#b7950b}\
.never-expires h2,.never-logged-in h2,.disabled h2{color:#555}\
.empty{color:#888;font-style:italic}";

/// Rendered message body with its subject line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub html: String,
}

/// Settings shared by every per-user notice.
#[derive(Debug, Clone)]
pub struct NoticeContext {
    pub signature: String,
}

pub fn render_digest(document: &ReportDocument) -> RenderedMessage {
    let mut html = String::new();
    write_digest(&mut html, document).expect("write digest into string");

    RenderedMessage {
        subject: document.subject(),
        html,
    }
}

fn write_digest(html: &mut String, document: &ReportDocument) -> fmt::Result {
    let title = escape_html(&document.title);
    writeln!(
        html,
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{title}</title><style>{STYLE}</style></head><body>"
    )?;
    writeln!(html, "<h1>{title}</h1>")?;
    writeln!(
        html,
        "<p class=\"meta\">Generated {} | warning threshold {} days | critical threshold {} days</p>",
        document.generated_at.format("%B %d, %Y %H:%M"),
        document.warning_threshold_days,
        document.critical_threshold_days
    )?;

    write_summary(html, document)?;
    write_policy(html, document)?;
    for section in &document.sections {
        write_section(html, section)?;
    }

    writeln!(html, "</body></html>")
}

fn write_summary(html: &mut String, document: &ReportDocument) -> fmt::Result {
    let counts = &document.counts;
    let cells = [
        ("Total", counts.total),
        ("Expired", counts.expired),
        ("Critical", counts.critical),
        ("Warning", counts.warning),
        ("OK", counts.ok),
        ("Never Expires", counts.never_expires),
        ("Never Logged In", counts.never_logged_in),
        ("Disabled", counts.disabled),
    ];

    write!(html, "<h2>Summary</h2>\n<table class=\"summary\"><tr>")?;
    for (label, _) in &cells {
        write!(html, "<th>{label}</th>")?;
    }
    write!(html, "</tr><tr>")?;
    for (_, count) in &cells {
        write!(html, "<td>{count}</td>")?;
    }
    writeln!(html, "</tr></table>")
}

fn write_policy(html: &mut String, document: &ReportDocument) -> fmt::Result {
    write!(html, "<h2>Domain Password Policy</h2>\n<table>")?;
    for line in &document.policy {
        write!(
            html,
            "<tr><th>{}</th><td>{}</td></tr>",
            line.label,
            escape_html(&line.value)
        )?;
    }
    writeln!(html, "</table>")
}

fn write_section(html: &mut String, section: &ReportSection) -> fmt::Result {
    writeln!(
        html,
        "<div class=\"{}\"><h2>{} ({})</h2>\n<p class=\"meta\">{}</p>",
        section.kind.css_class(),
        section.heading,
        section.rows.len(),
        escape_html(&section.description)
    )?;
    writeln!(
        html,
        "<table><tr><th>Name</th><th>Account</th><th>Email</th><th>Password Last Set</th>\
         <th>Expires</th><th>Days Left</th><th>Enabled</th></tr>"
    )?;

    if section.rows.is_empty() {
        writeln!(
            html,
            "<tr><td class=\"empty\" colspan=\"7\">No accounts</td></tr>"
        )?;
    }
    for row in &section.rows {
        write_row(html, row)?;
    }

    writeln!(html, "</table></div>")
}

fn write_row(html: &mut String, row: &ReportRow) -> fmt::Result {
    let cell = |value: Option<&str>| escape_html(value.unwrap_or("-"));
    writeln!(
        html,
        "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
        escape_html(&row.display_name),
        escape_html(&row.account_name),
        cell(row.email.as_deref()),
        cell(row.password_last_set.as_deref()),
        cell(row.expiration_date.as_deref()),
        cell(row.days_left.as_deref()),
        if row.enabled { "Yes" } else { "No" }
    )
}

/// Render the notice sent to the owner of an expiring or expired password.
/// Returns `None` for statuses that never produce a notice.
pub fn render_user_notice(
    result: &ClassificationResult,
    context: &NoticeContext,
) -> Option<RenderedMessage> {
    if !result.status.requires_notice() {
        return None;
    }
    let expiration = result.expiration?;

    let subject = match expiration.days_left {
        d if d < 0 => "Your password has expired".to_string(),
        0 => "Your password expires today".to_string(),
        1 => "Your password expires in 1 day".to_string(),
        d => format!("Your password expires in {d} days"),
    };

    let mut html = String::new();
    write_notice(&mut html, result, expiration, context).expect("write notice into string");

    Some(RenderedMessage { subject, html })
}

fn write_notice(
    html: &mut String,
    result: &ClassificationResult,
    expiration: Expiration,
    context: &NoticeContext,
) -> fmt::Result {
    let account = escape_html(&result.account_name);
    let when = format_date(expiration.date);

    writeln!(
        html,
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><style>{STYLE}</style></head><body>"
    )?;
    writeln!(html, "<p>Hello {},</p>", escape_html(&result.display_name))?;

    write!(html, "<p>The password for your account <strong>{account}</strong> ")?;
    if result.status == PasswordStatus::Expired {
        write!(
            html,
            "expired on {when} ({})",
            format_days_left(expiration.days_left)
        )?;
    } else if expiration.days_left == 0 {
        write!(html, "expires today ({when})")?;
    } else {
        write!(
            html,
            "will expire on {when} ({} left)",
            format_days_left(expiration.days_left)
        )?;
    }
    writeln!(html, ".</p>")?;

    writeln!(
        html,
        "<p>Please change your password before it expires to avoid losing access. \
         Use a passphrase that meets the domain password policy and has not been used before.</p>"
    )?;
    writeln!(
        html,
        "<p>Thank you,<br>{}</p>\n</body></html>",
        escape_html(&context.signature)
    )
}

pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
