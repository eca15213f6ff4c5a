// [libs/domain/fhir-sync/src/lib.rs]
/*!
 * APARATO: FHIR SYNC (ESTRATO L2)
 * RESPONSABILIDAD: `JobExecutor` para sincronizaciones FULL/INCREMENTAL/
 * PATIENT/RESOURCE/WEBHOOK — búsqueda paginada o fetch puntual contra el
 * adaptador del vendor, transformación y detección de conflictos, upsert
 * local.
 */

pub mod errors;
pub mod executor;

pub use errors::FhirSyncError;
pub use executor::FhirSyncExecutor;



