// [apps/orchestrator/src/routes.rs]
/*!
 * APARATO: MATRIZ DE ENRUTAMIENTO (ESTRATO L3)
 * RESPONSABILIDAD: Expone la superficie HTTP externa —
 * conexiones, sincronización, bulk export, webhooks entrantes y
 * administración — detrás del guard de salud perimetral.
 */

use std::time::Duration;

use axum::{
    http::{header, Method},
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::handlers::{admin, bulk_export, connections, sync, webhooks};
use crate::middleware::{admin_auth_guard, health_guard};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    let ehr_routes = Router::new()
        .route("/connect", post(connections::connect))
        .route("/authorize", post(connections::authorize))
        .route("/connections", get(connections::list).delete(connections::revoke))
        .route("/sync", post(sync::enqueue).get(sync::status_or_history))
        .route("/:vendor/bulk-export", post(bulk_export::start))
        .route("/:vendor/bulk-export/:job_id", get(bulk_export::poll))
        .route("/:vendor/bulk-export/:job_id/process", post(bulk_export::process));

    let webhook_routes = Router::new().route("/:vendor", post(webhooks::receive));

    let admin_routes = Router::new()
        .route("/logs/stats", get(admin::log_stats))
        .route("/logs/rotate", post(admin::rotate_logs))
        .route("/logs/cleanup", post(admin::cleanup_logs))
        .route("/logs/dedup", post(admin::dedup_logs))
        .route("/compliance/incidents", get(admin::list_incidents).post(admin::create_incident))
        .route("/compliance/incidents/:id", get(admin::get_incident).post(admin::update_incident))
        .layer(middleware::from_fn(admin_auth_guard));

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .nest("/ehr", ehr_routes)
        .nest("/webhooks", webhook_routes)
        .nest("/admin", admin_routes)
        .layer(middleware::from_fn_with_state(state.clone(), health_guard))
        .layer(cors)
        .with_state(state)
}



