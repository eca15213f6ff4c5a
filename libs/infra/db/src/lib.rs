// [libs/infra/db/src/lib.rs]
/*!
 * APARATO: PERSISTENCE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: Único punto de acceso a libSQL para el núcleo de
 * integración EHR — conexión, esquema, mapeo de filas, y un repositorio
 * por agregado.
 */

pub mod client;
pub mod errors;
pub mod mapping;
pub mod repositories;
pub mod schema;

pub use client::DbClient;
pub use errors::DbError;
pub use repositories::{
    BulkExportFile, BulkExportFileStatus, BulkExportRepository, ComplianceRepository, ConflictRepository,
    ConnectionRepository, ErrorRepository, JobRepository, JobTemplate, ManifestFileRecord, ResourceRepository,
    RuleRepository, ScheduleRepository, SyncSchedule,
};



