// [apps/orchestrator/src/middleware.rs]
/*!
 * APARATO: MIDDLEWARE PERIMETRAL Y ENVOLTURA DE ERRORES (ESTRATO L4)
 * RESPONSABILIDAD: Guard de salud (rechaza tráfico en mantenimiento),
 * guard de rol para `/admin/*`, y el tipo `ApiError` que traduce
 * cualquier error de dominio al sobre JSON `{error: {...}}`.
 */

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;

use crate::state::AppState;

/// Blocks all traffic while the system is in `Maintenance` mode.
pub async fn health_guard(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if let Err(reason) = state.is_operational() {
        warn!(reason = %reason, "request rejected, system in maintenance mode");
        return ApiError::unavailable(&reason).into_response();
    }
    next.run(req).await
}

/// Gates `/admin/*`: requires `Authorization: Bearer <ADMIN_API_TOKEN>`.
/// Compliance incident CRUD and housekeeping triggers live behind this.
pub async fn admin_auth_guard(req: Request, next: Next) -> Result<Response, ApiError> {
    let expected = std::env::var("ADMIN_API_TOKEN").unwrap_or_default();
    if expected.is_empty() {
        return Err(ApiError::unavailable("ADMIN_API_TOKEN is not configured"));
    }

    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    match presented {
        Some(token) if token == expected => Ok(next.run(req).await),
        _ => Err(ApiError::unauthorized("missing or invalid admin bearer token")),
    }
}

/// The HTTP error envelope every handler returns on failure:
/// `{error: {message, code, statusCode, details?, timestamp, requestId}}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into(), details: None }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "AUTH_REQUIRED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "CONFLICT", message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "BUSINESS_RULE_VIOLATION", message)
    }

    pub fn locked(message: impl Into<String>) -> Self {
        Self::new(StatusCode::LOCKED, "RESOURCE_LOCKED", message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, "EXTERNAL_SERVICE_ERROR", message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", message)
    }

    /// Falls back to a 500 for anything that should never reach a client
    /// as-is (lock poisoning, serialization bugs).
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
                "error": {
                    "message": self.message,
                "code": self.code,
                "statusCode": self.status.as_u16(),
                "details": self.details,
                "timestamp": Utc::now().to_rfc3339(),
                "requestId": uuid::Uuid::new_v4().to_string(),
            }
        });
    (self.status, Json(body)).into_response()
}
}

/// Classifies a domain error's rendered message against the bracketed
/// `[L#_*_FAULT]`/suffix conventions used across `ehr-core-*`/`ehr-infra-*`
/// so a single mapping covers every crate without each handler hand-rolling
/// its own `match`.
fn classify(message: &str) -> (StatusCode, &'static str) {
    let upper = message.to_uppercase();
    if upper.contains("NOT_FOUND") {
        (StatusCode::NOT_FOUND, "NOT_FOUND")
    } else if upper.contains("IMMUTABLE") || upper.contains("LOCKED") {
        (StatusCode::LOCKED, "RESOURCE_LOCKED")
    } else if upper.contains("INVALID_STATE_TRANSITION") || upper.contains("CONFLICT") {
        (StatusCode::CONFLICT, "CONFLICT")
    } else if upper.contains("RATE_LIMIT") || upper.contains("429") {
        (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED")
    } else if upper.contains("PAYLOAD_TOO_LARGE") || upper.contains("413") {
        (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE")
    } else if upper.contains("COMPLIANCE") || upper.contains("FORBIDDEN") {
        (StatusCode::FORBIDDEN, "FORBIDDEN")
    } else if upper.contains("AUTH_VAULT") || upper.contains("AUTH_TOKEN") || upper.contains("AUTH_REFRESH") || upper.contains("AUTH_EXCHANGE") {
        (StatusCode::UNAUTHORIZED, "AUTH_REQUIRED")
    } else if upper.contains("VALIDATION") || upper.contains("CONFIG") {
        (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
    } else if upper.contains("TRANSPORT") || upper.contains("VENDOR_REJECTED") || upper.contains("EXTERNAL") {
        (StatusCode::BAD_GATEWAY, "EXTERNAL_SERVICE_ERROR")
    } else {
        (StatusCode::UNPROCESSABLE_ENTITY, "BUSINESS_RULE_VIOLATION")
    }
}

macro_rules! impl_from_domain_error {
    ($($error_type:ty),+ $(,)?) => {
        $(
            impl From<$error_type> for ApiError {
                fn from(error: $error_type) -> Self {
                    let message = error.to_string();
                    let (status, code) = classify(&message);
                    ApiError::new(status, code, message)
                }
            }
        )+
    };
}

impl_from_domain_error!(
    ehr_infra_db::DbError,
    ehr_core_auth::AuthError,
    ehr_core_crypto_vault::VaultError,
    ehr_domain_vendor_adapters::AdapterError,
    ehr_domain_transform::TransformError,
    ehr_domain_sync_orchestrator::OrchestratorError,
    ehr_domain_bulk_export::BulkExportError,
    ehr_domain_fhir_sync::FhirSyncError,
    ehr_domain_telemetry::TelemetryError,
);



