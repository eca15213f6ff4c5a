// [apps/orchestrator/src/handlers/webhooks.rs]
/*!
 * APARATO: HANDLER DE WEBHOOKS ENTRANTES (ESTRATO L4)
 * RESPONSABILIDAD: Verifica la firma HMAC de cada push de vendor y
 * encola un job `WEBHOOK` de prioridad alta. Una firma ausente o inválida falla sin encolar nada.
 */

use std::collections::HashMap;
use std::str::FromStr;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use ehr_domain_models::{JobDirection, JobOptions, JobType, Vendor};
use ehr_domain_sync_orchestrator::EnqueueRequest;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha512};
use subtle::ConstantTimeEq;
use tracing::{instrument, warn};

use crate::middleware::ApiError;
use crate::state::AppState;

const DEFAULT_SIGNATURE_HEADER: &str = "x-webhook-signature";

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    #[allow(dead_code)]
    event_type: String,
    #[allow(dead_code)]
    event_id: String,
    #[allow(dead_code)]
    timestamp: String,
    resource_type: Option<String>,
    resource_id: Option<String>,
    #[allow(dead_code)]
    action: Option<String>,
    #[allow(dead_code)]
    data: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
}

/// Known event types that map to a sync job; anything else is accepted
/// but ignored.
const RECOGNIZED_EVENT_TYPES: &[&str] = &["patient.updated", "resource.created", "resource.updated", "resource.deleted"];

#[instrument(skip(state, headers, raw_body))]
pub async fn receive(
    State(state): State<AppState>,
    Path(vendor): Path<String>,
    headers: HeaderMap,
    raw_body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    let vendor = Vendor::from_str(&vendor).map_err(ApiError::bad_request)?;

    let secret = std::env::var("WEBHOOK_SECRET").unwrap_or_default();
    if secret.is_empty() {
        return Err(ApiError::unavailable("WEBHOOK_SECRET is not configured"));
    }

    let header_name = std::env::var("WEBHOOK_SIGNATURE_HEADER").unwrap_or_else(|_| DEFAULT_SIGNATURE_HEADER.to_string());
    let presented_signature = headers
        .get(header_name.as_str())
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("missing webhook signature header"))?;

    if !verify_signature(&secret, &raw_body, presented_signature) {
        warn!(%vendor, "webhook signature verification failed");
        return Err(ApiError::unauthorized("webhook signature verification failed"));
    }

    let payload: WebhookPayload = serde_json::from_slice(&raw_body).map_err(|e| ApiError::bad_request(format!("malformed webhook body: {e}")))?;

    if !RECOGNIZED_EVENT_TYPES.contains(&payload.event_type.as_str()) {
        return Ok(Json(WebhookResponse { status: "IGNORED" }));
    }

    let resource_id = payload.resource_id.clone().ok_or_else(|| ApiError::bad_request("webhook body missing resourceId"))?;
    let resource_type = payload.resource_type.clone().ok_or_else(|| ApiError::bad_request("webhook body missing resourceType"))?;

    let connection_id = resolve_connection_id(&state, vendor, &resource_type, &resource_id).await?;

    state
        .orchestrator
        .enqueue(EnqueueRequest {
            job_type: JobType::Webhook,
            direction: JobDirection::Inbound,
            priority: 2,
            connection_id,
            resource_type_filter: Some(resource_type),
            resource_id_filter: Some(vec![resource_id]),
            filter: HashMap::new(),
            options: JobOptions::default(),
        })
        .await?;

    Ok(Json(WebhookResponse { status: "ACCEPTED" }))
}

/// `resourceId` is the vendor-side FHIR resource id of the changed
/// resource, not the internal connection UUID `connection_repository.rs`
/// and `FhirSyncExecutor::run` key connections by. Resolve it two ways:
/// a `Patient` event names the vendor's patient id directly, so it
/// matches a connection's `vendor_patient_id`; any other resource type
/// must already have been synced at least once to be addressable, so its
/// owning connection is looked up from the local resource store.
async fn resolve_connection_id(state: &AppState, vendor: Vendor, resource_type: &str, resource_id: &str) -> Result<String, ApiError> {
    if resource_type.eq_ignore_ascii_case("Patient") {
        if let Ok(connection) = state.connections.find_by_vendor_and_patient_id(vendor, resource_id).await {
            return Ok(connection.connection_id);
        }
    }

    state
        .resources
        .find_connection_id_by_vendor_resource(vendor, resource_type, resource_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found(format!("no connection found for {vendor} {resource_type} {resource_id}")))
}

/// Accepts either a SHA-256 or SHA-512 HMAC hex digest, selected by
/// `WEBHOOK_SIGNATURE_ALGO` (default `sha256`), compared in constant time.
fn verify_signature(secret: &str, body: &[u8], presented_hex: &str) -> bool {
    let algo = std::env::var("WEBHOOK_SIGNATURE_ALGO").unwrap_or_else(|_| "sha256".to_string());
    let presented = match hex::decode(presented_hex.trim()) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let expected = match algo.to_ascii_lowercase().as_str() {
        "sha512" => {
            let mut mac = match Hmac::<Sha512>::new_from_slice(secret.as_bytes()) {
                Ok(mac) => mac,
                Err(_) => return false,
            };
            mac.update(body);
            mac.finalize().into_bytes().to_vec()
        }
        _ => {
            let mut mac = match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
                Ok(mac) => mac,
                Err(_) => return false,
            };
            mac.update(body);
            mac.finalize().into_bytes().to_vec()
        }
    };

    expected.ct_eq(&presented).into()
}

