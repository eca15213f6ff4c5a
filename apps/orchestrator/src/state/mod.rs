// [apps/orchestrator/src/state/mod.rs]
/*!
 * APARATO: ESTADO COMPARTIDO DEL ORQUESTADOR (ESTRATO L1-APP)
 * RESPONSABILIDAD: Composition root en memoria — mantiene vivas las
 * instancias de repositorios, el gestor de autenticación, el motor de
 * transformación, el enrutador de telemetría y el facade de
 * sincronización, todas compartidas entre handlers vía `Arc`.
 */

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use ehr_core_auth::AuthManager;
use ehr_core_crypto_vault::TokenVault;
use ehr_domain_bulk_export::BulkExportRunner;
use ehr_domain_models::Vendor;
use ehr_domain_sync_orchestrator::SyncOrchestrator;
use ehr_domain_telemetry::TelemetryRouter;
use ehr_domain_transform::TransformationEngine;
use ehr_domain_vendor_adapters::VendorFhirAdapter;
use ehr_infra_db::repositories::{
    BulkExportRepository, ComplianceRepository, ConflictRepository, ConnectionRepository,
    ErrorRepository, JobRepository, ResourceRepository, RuleRepository, ScheduleRepository,
};
use ehr_infra_db::DbClient;
use tracing::{info, warn};

/// Estado de disponibilidad consultado por el guard de salud perimetral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemMode {
    /// El servicio acepta tráfico con normalidad.
    Operational,
    /// El servicio rechaza tráfico no esencial; lleva el motivo para el cuerpo 503.
    Maintenance(String),
}

/// Contenedor de estado compartido, clonado barato (todo campo es un `Arc`) e
/// inyectado en cada handler de axum vía extractor `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub db: DbClient,

    pub connections: Arc<ConnectionRepository>,
    pub jobs: Arc<JobRepository>,
    pub resources: Arc<ResourceRepository>,
    pub rules: Arc<RuleRepository>,
    pub conflicts: Arc<ConflictRepository>,
    pub errors: Arc<ErrorRepository>,
    pub compliance: Arc<ComplianceRepository>,
    pub bulk_exports: Arc<BulkExportRepository>,
    pub schedules: Arc<ScheduleRepository>,

    pub auth: Arc<AuthManager<ConnectionRepository>>,
    /// Used directly by handlers to seal a connection's client secret
    /// before it is ever persisted (`AuthManager` only ever unseals tokens
    /// it saved itself).
    pub vault: TokenVault,
    pub adapters: Arc<HashMap<Vendor, Box<dyn VendorFhirAdapter>>>,
    pub transform: Arc<TransformationEngine>,
    pub bulk_export_runner: Arc<BulkExportRunner>,
    pub telemetry: Arc<TelemetryRouter>,

    pub orchestrator: Arc<SyncOrchestrator>,

    pub mode: Arc<RwLock<SystemMode>>,
}

impl AppState {
    /// Sincroniza el modo operativo consultado por el guard de salud.
    pub fn set_mode(&self, target: SystemMode) {
        match self.mode.write() {
            Ok(mut guard) => {
                info!(?target, "system mode transition");
                *guard = target;
            }
            Err(poisoned) => {
                warn!(error = %poisoned, "system mode lock poisoned, ignoring transition");
            }
        }
    }

    /// Usado por el middleware perimetral: `Err` lleva el motivo de mantenimiento.
    pub fn is_operational(&self) -> Result<(), String> {
        let guard = self
            .mode
            .read()
            .map_err(|e| format!("system mode lock poisoned: {e}"))?;

        match &*guard {
            SystemMode::Operational => Ok(()),
            SystemMode::Maintenance(reason) => Err(reason.clone()),
        }
    }
}
