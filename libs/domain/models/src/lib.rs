// [libs/domain/models/src/lib.rs]
/*!
 * APARATO: EHR DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: Single Source of Truth para las entidades del núcleo
 * de integración EHR — Connection, SyncJob, FhirResource,
 * TransformationRule, Conflict, ErrorRecord, ComplianceIncident.
 *
 * Every type here is a plain data contract shared across crates; none of
 * them hold a database connection, HTTP client, or other live resource.
 */

pub mod connection;
pub mod conflict;
pub mod job;
pub mod resource;
pub mod rule;
pub mod telemetry;
pub mod vendor;

pub use connection::{Connection, ConnectionStatus};
pub use conflict::{Conflict, ConflictResolution};
pub use job::{
    JobDirection, JobOptions, JobStatus, JobSummary, JobType, SyncJob,
};
pub use resource::{DownloadState, FhirResource};
pub use rule::{RuleDirection, RuleKind, TransformationRule};
pub use telemetry::{
    ComplianceCategory, ComplianceIncident, ErrorRecord, InvestigationStatus,
    MasterErrorCode, Severity,
};
pub use vendor::Vendor;
