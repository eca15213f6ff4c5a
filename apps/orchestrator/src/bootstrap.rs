// [apps/orchestrator/src/bootstrap.rs]
/*!
 * APARATO: SECUENCIA DE ARRANQUE (ESTRATO L0)
 * RESPONSABILIDAD: Abre el enlace a la base de datos, hidrata los nueve
 * repositorios, y conecta auth, adaptadores de vendor, transformación,
 * bulk export y telemetría en el `AppState` que el kernel sirve.
 */

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use ehr_core_auth::AuthManager;
use ehr_core_crypto_vault::TokenVault;
use ehr_domain_bulk_export::{BulkExportExecutor, BulkExportRunner};
use ehr_domain_fhir_sync::FhirSyncExecutor;
use ehr_domain_models::JobType;
use ehr_domain_notification::{NotificationDispatcher, NullNotificationDispatcher, WebhookNotificationDispatcher};
use ehr_domain_sync_orchestrator::{config::OrchestratorConfig, executor::JobExecutor, OrchestratorHandle, SyncOrchestrator};
use ehr_domain_telemetry::{config::TelemetryConfig, TelemetryRouter};
use ehr_domain_transform::TransformationEngine;
use ehr_domain_vendor_adapters::build_adapter_registry;
use ehr_infra_db::repositories::{
    BulkExportRepository, ComplianceRepository, ConflictRepository, ConnectionRepository,
    ErrorRepository, JobRepository, ResourceRepository, RuleRepository, ScheduleRepository,
};
use ehr_infra_db::DbClient;
use ehr_infra_transport::RateLimiterRegistry;
use tracing::{info, instrument};

use crate::state::{AppState, SystemMode};

/// Default per-vendor request spacing when `VENDOR_MIN_INTERVAL_MS` is unset.
const DEFAULT_VENDOR_MIN_INTERVAL_MS: u64 = 200;
/// Default per-vendor concurrency cap when `VENDOR_MAX_CONCURRENCY` is unset.
const DEFAULT_VENDOR_MAX_CONCURRENCY: usize = 4;

/// Reads `DATABASE_URL`/`TURSO_AUTH_TOKEN`/`ENCRYPTION_KEY` and every other
/// repository's dependency from the environment, wires them into an
/// [`AppState`], and returns it unstarted — the caller spawns the
/// orchestrator and binds the HTTP listener.
#[instrument]
pub async fn build_app_state() -> anyhow::Result<(AppState, OrchestratorHandle)> {
    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| "file:ehr-core.db".into());
    let access_token = std::env::var("TURSO_AUTH_TOKEN").ok();

    let db = DbClient::connect(&database_url, access_token).await?;
    info!("database link established");

    let connections = Arc::new(ConnectionRepository::new(db.connection()?));
    let jobs = Arc::new(JobRepository::new(db.connection()?));
    let resources = Arc::new(ResourceRepository::new(db.connection()?));
    let rules = Arc::new(RuleRepository::new(db.connection()?));
    let conflicts = Arc::new(ConflictRepository::new(db.connection()?));
    let errors = Arc::new(ErrorRepository::new(db.connection()?));
    let compliance = Arc::new(ComplianceRepository::new(db.connection()?));
    let bulk_exports = Arc::new(BulkExportRepository::new(db.connection()?));
    let schedules = Arc::new(ScheduleRepository::new(db.connection()?));

    let vault = TokenVault::from_env("ENCRYPTION_KEY")?;
    let auth = Arc::new(AuthManager::new(ConnectionRepository::new(db.connection()?), vault.clone()));

    let http = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;

    let vendor_min_interval_ms: u64 = std::env::var("VENDOR_MIN_INTERVAL_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_VENDOR_MIN_INTERVAL_MS);
    let vendor_max_concurrency: usize = std::env::var("VENDOR_MAX_CONCURRENCY")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_VENDOR_MAX_CONCURRENCY);
    let rate_limiters = Arc::new(RateLimiterRegistry::new(
        Duration::from_millis(vendor_min_interval_ms),
        vendor_max_concurrency,
    ));

    let adapters = Arc::new(build_adapter_registry(http, rate_limiters, Arc::clone(&auth)));

    let transform = Arc::new(TransformationEngine::new(Arc::clone(&rules), Arc::clone(&conflicts)));

    let bulk_export_runner = Arc::new(BulkExportRunner::new(
        Arc::clone(&adapters),
        Arc::clone(&connections),
        Arc::clone(&jobs),
        Arc::clone(&bulk_exports),
        Arc::clone(&resources),
        Arc::clone(&transform),
    ));

    let bulk_export_executor = Arc::new(BulkExportExecutor::new(Arc::clone(&bulk_export_runner), Arc::clone(&connections)));
    let fhir_sync_executor = Arc::new(FhirSyncExecutor::new(
        Arc::clone(&adapters),
        Arc::clone(&connections),
        Arc::clone(&resources),
        Arc::clone(&transform),
    ));

    let mut executors: HashMap<JobType, Arc<dyn JobExecutor>> = HashMap::new();
    executors.insert(JobType::BulkExport, bulk_export_executor as Arc<dyn JobExecutor>);
    for job_type in [
        JobType::Full,
        JobType::Incremental,
        JobType::Patient,
        JobType::Resource,
        JobType::Webhook,
    ] {
        executors.insert(job_type, Arc::clone(&fhir_sync_executor) as Arc<dyn JobExecutor>);
    }

    let orchestrator = Arc::new(SyncOrchestrator::new(
        Arc::clone(&jobs),
        Arc::clone(&schedules),
        executors,
        OrchestratorConfig::default(),
    ));
    let orchestrator_handle = orchestrator.spawn();

    let mut notifiers: Vec<Arc<dyn NotificationDispatcher>> = Vec::new();
    if let Ok(url) = std::env::var("SLACK_WEBHOOK_URL") {
        notifiers.push(Arc::new(WebhookNotificationDispatcher::new(url)));
    }
    if let Ok(url) = std::env::var("ALERT_WEBHOOK_URL") {
        notifiers.push(Arc::new(WebhookNotificationDispatcher::new(url)));
    }
    if notifiers.is_empty() {
        notifiers.push(Arc::new(NullNotificationDispatcher));
    }

    let telemetry = Arc::new(TelemetryRouter::new(
        Arc::clone(&errors),
        Arc::clone(&compliance),
        notifiers,
        TelemetryConfig::from_env(),
    ));

    let state = AppState {
        db,
        connections,
        jobs,
        resources,
        rules,
        conflicts,
        errors,
        compliance,
        bulk_exports,
        schedules,
        auth,
        vault,
        adapters,
        transform,
        bulk_export_runner,
        telemetry,
        orchestrator,
        mode: Arc::new(RwLock::new(SystemMode::Operational)),
    };

    Ok((state, orchestrator_handle))
}
