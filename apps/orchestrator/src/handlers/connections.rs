// [apps/orchestrator/src/handlers/connections.rs]
/*!
 * APARATO: HANDLERS DE CONEXIÓN (ESTRATO L4)
 * RESPONSABILIDAD: `POST /ehr/connect`, `POST /ehr/authorize`,
 * `GET /ehr/connections`, `DELETE /ehr/connections`.
 */

use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use ehr_domain_models::{Connection, ConnectionStatus, Vendor};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::instrument;

use crate::middleware::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub user_id: String,
    pub vendor: String,
    pub fhir_base_url: String,
    pub authorization_url: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
}

#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    pub connection_id: String,
    pub authorization_url: String,
    pub state: String,
}

#[instrument(skip(state, body))]
pub async fn connect(State(state): State<AppState>, Json(body): Json<ConnectRequest>) -> Result<Json<ConnectResponse>, ApiError> {
    let vendor = Vendor::from_str(&body.vendor).map_err(ApiError::bad_request)?;

    let sealed_client_secret = match body.client_secret {
        Some(secret) if !secret.is_empty() => Some(state.vault.seal(&secret)?),
        _ => None,
    };

    let now = Utc::now();
    let connection = Connection {
        connection_id: ehr_infra_db::repositories::connection_repository::new_connection_id(),
        user_id: body.user_id,
        vendor,
        vendor_patient_id: None,
        fhir_base_url: body.fhir_base_url,
        authorization_url: body.authorization_url,
        token_url: body.token_url,
        client_id: body.client_id,
        redirect_uri: body.redirect_uri,
        sealed_client_secret,
        sealed_access_token: None,
        sealed_refresh_token: None,
        access_token_expires_at: None,
        last_sync_at: None,
        next_sync_at: None,
        sync_frequency_hours: 24,
        auto_sync: true,
        status: ConnectionStatus::PendingAuth,
        created_at: now,
        updated_at: now,
    };

    state.connections.create(&connection).await?;
    let begin = state.auth.begin(&connection);

    Ok(Json(ConnectResponse {
                connection_id: connection.connection_id,
                authorization_url: begin.authorization_url,
                state: begin.state,
            }))
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeRequest {
    pub connection_id: String,
    pub code: String,
    pub state: String,
    pub code_verifier: String,
}

#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    pub connection: Connection,
}

#[instrument(skip(state, body))]
pub async fn authorize(State(state): State<AppState>, Json(body): Json<AuthorizeRequest>) -> Result<Json<AuthorizeResponse>, ApiError> {
    let connection = state
        .auth
        .complete(&body.connection_id, &body.code, &body.state, &body.code_verifier)
        .await?;
    Ok(Json(AuthorizeResponse { connection }))
}

#[derive(Debug, Deserialize)]
pub struct ListConnectionsQuery {
    pub user_id: String,
}

#[instrument(skip(state))]
pub async fn list(State(state): State<AppState>, Query(query): Query<ListConnectionsQuery>) -> Result<Json<Vec<Connection>>, ApiError> {
    let connections = state.connections.list_for_user(&query.user_id).await?;
    Ok(Json(connections))
}

#[derive(Debug, Deserialize)]
pub struct RevokeConnectionQuery {
    pub connection_id: String,
}

#[instrument(skip(state))]
pub async fn revoke(State(state): State<AppState>, Query(query): Query<RevokeConnectionQuery>) -> Result<Json<serde_json::Value>, ApiError> {
    state.connections.revoke(&query.connection_id).await?;
    Ok(Json(serde_json::json!({ "revoked": true })))
}



