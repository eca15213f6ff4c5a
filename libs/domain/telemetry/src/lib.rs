// [libs/domain/telemetry/src/lib.rs]
/*!
 * APARATO: TELEMETRY ROUTER (ESTRATO L2)
 * RESPONSABILIDAD: Clasificación de errores, deduplicación operativa por
 * ventana deslizante, y enrutamiento de eventos regulados hacia el
 * almacén inmutable de incidentes de cumplimiento.
 */

pub mod classification;
pub mod config;
pub mod errors;
pub mod fingerprint;
pub mod retention;
pub mod router;

pub use classification::{classify_compliance, classify_master_code, SubCode};
pub use config::{RetentionDays, TelemetryConfig};
pub use errors::TelemetryError;
pub use retention::{purge_operational, rotate_log_directory, rotation_due, PurgeSummary, RotationSummary};
pub use router::{ErrorEvent, RoutedOutcome, TelemetryRouter};



