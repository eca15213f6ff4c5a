// [apps/orchestrator/src/handlers/sync.rs]
/*!
 * APARATO: HANDLERS DE SINCRONIZACIÓN (ESTRATO L4)
 * RESPONSABILIDAD: `POST /ehr/sync` (enqueue) y `GET /ehr/sync` (estado
 * puntual o historial según el parámetro presente).
 */

use std::collections::HashMap;
use std::str::FromStr;

use axum::extract::{Query, State};
use axum::Json;
use ehr_domain_models::{JobDirection, JobOptions, JobType, SyncJob};
use ehr_domain_sync_orchestrator::EnqueueRequest;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::middleware::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EnqueueSyncRequest {
    pub connection_id: String,
    pub sync_type: String,
    #[serde(default)]
    pub download_documents: bool,
}

#[derive(Debug, Serialize)]
pub struct EnqueueSyncResponse {
    pub sync_id: String,
}

#[instrument(skip(state, body))]
pub async fn enqueue(State(state): State<AppState>, Json(body): Json<EnqueueSyncRequest>) -> Result<Json<EnqueueSyncResponse>, ApiError> {
    let job_type = JobType::from_str(&body.sync_type).map_err(ApiError::bad_request)?;

    let job = state
        .orchestrator
        .enqueue(EnqueueRequest {
            job_type,
            direction: JobDirection::Inbound,
            priority: 3,
            connection_id: body.connection_id,
            resource_type_filter: None,
            resource_id_filter: None,
            filter: HashMap::new(),
            options: JobOptions { validate_output: body.download_documents, ..JobOptions::default() },
        })
        .await?;

    Ok(Json(EnqueueSyncResponse { sync_id: job.job_id }))
}

#[derive(Debug, Deserialize)]
pub struct SyncQuery {
    pub sync_id: Option<String>,
    pub connection_id: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

#[instrument(skip(state))]
pub async fn status_or_history(State(state): State<AppState>, Query(query): Query<SyncQuery>) -> Result<Json<serde_json::Value>, ApiError> {
    if let Some(sync_id) = query.sync_id {
        let job: SyncJob = state.orchestrator.status(&sync_id).await?;
        return Ok(Json(serde_json::to_value(job).map_err(|e| ApiError::internal(e.to_string()))?));
    }

    if let Some(connection_id) = query.connection_id {
        let history = state
            .orchestrator
            .history(&connection_id, query.limit.unwrap_or(50), query.offset.unwrap_or(0))
            .await?;
        return Ok(Json(serde_json::to_value(history).map_err(|e| ApiError::internal(e.to_string()))?));
    }

    Err(ApiError::bad_request("either syncId or connectionId is required"))
}



