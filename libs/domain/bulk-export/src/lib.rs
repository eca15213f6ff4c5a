// [libs/domain/bulk-export/src/lib.rs]
/*!
 * APARATO: BULK EXPORT (ESTRATO L2)
 * RESPONSABILIDAD: `$export` kickoff/poll/ingest para conectores FHIR, con
 * reanudación por archivo y aislamiento de fallos por archivo.
 */

pub mod backoff;
pub mod errors;
pub mod executor;
pub mod runner;

pub use backoff::PollBackoff;
pub use errors::BulkExportError;
pub use executor::BulkExportExecutor;
pub use runner::{default_max_duration, default_poll_backoff, BulkExportRunner, IngestSummary};



