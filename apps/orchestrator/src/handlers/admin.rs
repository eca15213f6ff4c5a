// [apps/orchestrator/src/handlers/admin.rs]
/*!
 * APARATO: HANDLERS DE ADMINISTRACIÓN (ESTRATO L4)
 * RESPONSABILIDAD: `GET /admin/logs/stats`, `POST
 * /admin/logs/{rotate,cleanup,dedup}`, y el CRUD restringido de
 * `/admin/compliance/incidents`. Todo este módulo vive detrás de
 * `admin_auth_guard`.
 */

use std::path::PathBuf;
use std::str::FromStr;

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use ehr_domain_models::{ComplianceCategory, ComplianceIncident, InvestigationStatus, Severity};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::middleware::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct LogStats {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
    pub critical: u64,
    pub dedup_window_seconds: u64,
    pub retention_days: RetentionDaysView,
}

#[derive(Debug, Serialize)]
pub struct RetentionDaysView {
    pub low: i64,
    pub medium: i64,
    pub high: i64,
    pub critical: i64,
}

/// Counts of recent (last 24h) operational records by severity — a cheap
/// summary, not a full table scan; `recent_by_severity` is already indexed
/// on `(severity, last_seen)`.
#[instrument(skip(state))]
pub async fn log_stats(State(state): State<AppState>) -> Result<Json<LogStats>, ApiError> {
    let since = Utc::now() - chrono::Duration::hours(24);
    let mut counts = [0u64; 4];
    for (i, severity) in [Severity::Low, Severity::Medium, Severity::High, Severity::Critical].into_iter().enumerate() {
        let records = state.errors.recent_by_severity(severity, since).await?;
        counts[i] = records.into_iter().filter(|r| r.severity == severity).count() as u64;
    }

    let config = state.telemetry.config();
    Ok(Json(LogStats {
        low: counts[0],
        medium: counts[1],
        high: counts[2],
        critical: counts[3],
        dedup_window_seconds: config.dedup_window.as_secs(),
        retention_days: RetentionDaysView {
            low: config.retention_days.low,
            medium: config.retention_days.medium,
            high: config.retention_days.high,
            critical: config.retention_days.critical,
        },
    }))
}

#[derive(Debug, Serialize)]
pub struct RotateResponse {
    pub files_archived: u64,
    pub bytes_before_rotation: u64,
}

/// Rotates `LOG_DIR` if its accumulated `*.log` size has crossed
/// `LOG_ROTATION_THRESHOLD` of `MAX_LOG_FILE_SIZE_MB`; a no-op (zero
/// archived) if `LOG_DIR` is unset, the directory doesn't exist, or the
/// threshold isn't crossed yet.
#[instrument(skip(state))]
pub async fn rotate_logs(State(state): State<AppState>) -> Result<Json<RotateResponse>, ApiError> {
    let config = state.telemetry.config().clone();
    let log_dir = std::env::var("LOG_DIR").unwrap_or_default();
    let summary = ehr_domain_telemetry::rotate_log_directory(&PathBuf::from(log_dir), &config, Utc::now())
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(Json(RotateResponse { files_archived: summary.files_archived, bytes_before_rotation: summary.bytes_before }))
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub purged_low: u64,
    pub purged_medium: u64,
    pub purged_high: u64,
    pub purged_critical: u64,
}

/// Forces the severity/age purge the housekeeping daemon otherwise runs
/// only on `CLEANUP_SCHEDULE`. Never touches `compliance_incidents`.
#[instrument(skip(state))]
pub async fn cleanup_logs(State(state): State<AppState>) -> Result<Json<CleanupResponse>, ApiError> {
    let config = state.telemetry.config().clone();
    let summary = ehr_domain_telemetry::purge_operational(&state.errors, &config, Utc::now()).await?;
    Ok(Json(CleanupResponse {
        purged_low: summary.low,
        purged_medium: summary.medium,
        purged_high: summary.high,
        purged_critical: summary.critical,
    }))
}

#[derive(Debug, Serialize)]
pub struct DedupResponse {
    pub groups_merged: u64,
}

/// Consolidates operational records whose dedup window has already
/// lapsed but that still share a `(master_code, endpoint)` pair — the live
/// per-occurrence dedup already runs continuously in
/// [`ehr_domain_telemetry::TelemetryRouter::report`]; this is the
/// on-demand sweep for the long tail that accumulated across separate
/// windows.
#[instrument(skip(state))]
pub async fn dedup_logs(State(state): State<AppState>) -> Result<Json<DedupResponse>, ApiError> {
    let config = state.telemetry.config().clone();
    let dedup_window = chrono::Duration::from_std(config.dedup_window).unwrap_or_else(|_| chrono::Duration::minutes(5));
    let merged = state.errors.consolidate_expired(Utc::now(), dedup_window, config.max_sample_stack_traces).await?;
    Ok(Json(DedupResponse { groups_merged: merged }))
}

#[derive(Debug, Deserialize)]
pub struct CreateIncidentRequest {
    pub severity: String,
    pub category: String,
    pub description: String,
    pub regulated_data_exposed: bool,
    pub records_affected: u64,
}

/// Manually opens a compliance incident — the same path
/// [`ehr_domain_telemetry::TelemetryRouter`] takes automatically for
/// keyword-matched events, exposed here for incidents an operator
/// identifies out of band (e.g. from an external audit).
#[instrument(skip(state, body))]
pub async fn create_incident(State(state): State<AppState>, Json(body): Json<CreateIncidentRequest>) -> Result<Json<ComplianceIncident>, ApiError> {
    let severity = Severity::from_str(&body.severity).map_err(ApiError::bad_request)?;
    let category = ComplianceCategory::from_str(&body.category).map_err(ApiError::bad_request)?;

    let incident = ComplianceIncident {
        incident_number: String::new(),
        severity,
        category,
        description: body.description,
        regulated_data_exposed: body.regulated_data_exposed,
        records_affected: body.records_affected,
        investigation_status: InvestigationStatus::Detected,
        assigned_to: None,
        reported_to_regulator_at: None,
        breach_notification_sent_at: None,
        audit_log_reference: uuid::Uuid::new_v4().to_string(),
        created_at: Utc::now(),
    };
    let incident_number = state.compliance.record(&incident).await?;
    let mut recorded = incident;
    recorded.incident_number = incident_number;
    Ok(Json(recorded))
}

#[instrument(skip(state))]
pub async fn list_incidents(State(state): State<AppState>) -> Result<Json<Vec<ComplianceIncident>>, ApiError> {
    Ok(Json(state.compliance.list_open().await?))
}

#[instrument(skip(state))]
pub async fn get_incident(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<ComplianceIncident>, ApiError> {
    Ok(Json(state.compliance.find(&id).await?))
}

#[derive(Debug, Deserialize)]
pub struct UpdateIncidentRequest {
    pub investigation_status: String,
    pub reported_to_regulator: bool,
    pub breach_notification_sent: bool,
}

/// Advances an incident's investigation status and, where the caller
/// asserts it happened, stamps the regulator-report / breach-notification
/// timestamps. Every other field is immutable once recorded.
#[instrument(skip(state, body))]
pub async fn update_incident(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateIncidentRequest>,
) -> Result<Json<ComplianceIncident>, ApiError> {
    let status = InvestigationStatus::from_str(&body.investigation_status).map_err(ApiError::bad_request)?;
    let now = Utc::now();
    state
        .compliance
        .advance_status(
            &id,
            status,
            body.reported_to_regulator.then_some(now),
            body.breach_notification_sent.then_some(now),
        )
        .await?;
    Ok(Json(state.compliance.find(&id).await?))
}
