use crate::infra::{deserialize_optional_instant, AppState};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use chrono::{DateTime, Utc};
use passwatch::audit::report::ReportSummary;
use passwatch::audit::{
    aggregate, classify_all, AccountRecord, DomainPasswordPolicy, InclusionFlags,
    PolicyThresholds, MAX_PASSWORD_AGE_DAYS,
};
use passwatch::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Deserialize)]
pub(crate) struct ClassifyRequest {
    pub(crate) accounts: Vec<AccountRecord>,
    pub(crate) max_password_age_days: i64,
    #[serde(default = "default_warning_days")]
    pub(crate) warning_threshold_days: i64,
    #[serde(default = "default_critical_days")]
    pub(crate) critical_threshold_days: i64,
    #[serde(default)]
    pub(crate) include: InclusionFlags,
    #[serde(default, deserialize_with = "deserialize_optional_instant")]
    pub(crate) now: Option<DateTime<Utc>>,
}

fn default_warning_days() -> i64 {
    14
}

fn default_critical_days() -> i64 {
    7
}

#[derive(Debug, Serialize)]
pub(crate) struct ClassifyResponse {
    pub(crate) now: DateTime<Utc>,
    pub(crate) max_password_age_days: i64,
    pub(crate) warning_threshold_days: i64,
    pub(crate) critical_threshold_days: i64,
    pub(crate) include: InclusionFlags,
    #[serde(flatten)]
    pub(crate) summary: ReportSummary,
}

pub(crate) fn audit_routes() -> axum::Router {
    axum::Router::new()
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/audit/classify",
            axum::routing::post(classify_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Classify a caller-supplied snapshot without touching the directory or mail.
pub(crate) async fn classify_endpoint(
    Json(payload): Json<ClassifyRequest>,
) -> Result<Json<ClassifyResponse>, AppError> {
    let ClassifyRequest {
        accounts,
        max_password_age_days,
        warning_threshold_days,
        critical_threshold_days,
        include,
        now,
    } = payload;

    let policy =
        DomainPasswordPolicy::from_max_age_days(max_password_age_days).ok_or_else(|| {
            AppError::InvalidRequest(format!(
                "max_password_age_days must be between 1 and {MAX_PASSWORD_AGE_DAYS}"
            ))
        })?;
    let thresholds = PolicyThresholds::from_policy(
        warning_threshold_days,
        critical_threshold_days,
        include,
        &policy,
    );
    let now = now.unwrap_or_else(Utc::now);

    let admitted: Vec<AccountRecord> = accounts
        .into_iter()
        .filter(|account| include.admits(account))
        .collect();
    let results = classify_all(&admitted, &thresholds, now);
    let summary = aggregate(&results, include).summary();

    Ok(Json(ClassifyResponse {
        now,
        max_password_age_days,
        warning_threshold_days,
        critical_threshold_days,
        include,
        summary,
    }))
}
