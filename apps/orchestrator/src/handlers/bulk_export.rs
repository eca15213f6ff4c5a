// [apps/orchestrator/src/handlers/bulk_export.rs]
/*!
 * APARATO: HANDLERS DE BULK EXPORT (ESTRATO L4)
 * RESPONSABILIDAD: Kickoff, consulta de estado e ingesta manual de
 * `$export` por vendor. El poll y la ingesta
 * automáticos ya corren dentro del `JobExecutor` una vez el job es
 * reclamado por el pool de workers; estos endpoints cubren el arranque y
 * la consulta/ingesta bajo demanda desde el exterior.
 */

use axum::extract::{Path, State};
use axum::Json;
use ehr_domain_models::SyncJob;
use ehr_domain_sync_orchestrator::CancellationToken;
use ehr_domain_vendor_adapters::{BulkExportScope, PollOutcome};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::middleware::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartBulkExportRequest {
    pub connection_id: String,
    pub export_type: String,
    #[serde(default)]
    pub resource_types: Option<Vec<String>>,
    #[serde(default)]
    pub since: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Serialize)]
pub struct StartBulkExportResponse {
    pub job: SyncJob,
}

fn parse_scope(export_type: &str) -> Result<BulkExportScope, ApiError> {
    match export_type.to_ascii_uppercase().as_str() {
        "PATIENT" => Ok(BulkExportScope::Patient),
        "SYSTEM" => Ok(BulkExportScope::System),
        other if other.starts_with("GROUP:") => Ok(BulkExportScope::Group(other[6..].to_string())),
        other => Err(ApiError::bad_request(format!("unknown bulk export type: {other}"))),
    }
}

#[instrument(skip(state, body))]
pub async fn start(
    State(state): State<AppState>,
    Path(_vendor): Path<String>,
    Json(body): Json<StartBulkExportRequest>,
) -> Result<Json<StartBulkExportResponse>, ApiError> {
    let scope = parse_scope(&body.export_type)?;
    let job = state
        .bulk_export_runner
        .start_export(&body.connection_id, scope, body.resource_types, body.since)
        .await?;
    Ok(Json(StartBulkExportResponse { job }))
}

#[instrument(skip(state))]
pub async fn poll(State(state): State<AppState>, Path((_vendor, job_id)): Path<(String, String)>) -> Result<Json<SyncJob>, ApiError> {
    let job = state.jobs.find_by_id(&job_id).await?;
    Ok(Json(job))
}

#[derive(Debug, Serialize)]
pub struct ProcessBulkExportResponse {
    pub files_processed: u64,
    pub files_failed: u64,
    pub status: &'static str,
}

#[instrument(skip(state))]
pub async fn process(State(state): State<AppState>, Path((_vendor, job_id)): Path<(String, String)>) -> Result<Json<ProcessBulkExportResponse>, ApiError> {
    let job = state.jobs.find_by_id(&job_id).await?;
    let connection = state.connections.find_by_id(&job.connection_id).await?;
    let status_url = job
        .status_url
        .as_deref()
        .ok_or_else(|| ApiError::unprocessable("job has no export status URL to poll"))?;

    match state.bulk_export_runner.poll_once(&connection, status_url).await? {
        PollOutcome::InProgress {.. } => Ok(Json(ProcessBulkExportResponse { files_processed: 0, files_failed: 0, status: "IN_PROGRESS" })),
        PollOutcome::Complete(manifest) => {
            let cancellation = CancellationToken::new();
            let summary = state
                .bulk_export_runner
                .ingest_export(&connection, &job, &manifest, &cancellation)
                .await?;
            Ok(Json(ProcessBulkExportResponse {
                        files_processed: summary.files_processed,
                        files_failed: summary.files_failed,
                        status: "COMPLETE",
                    }))
        }
    }
}



