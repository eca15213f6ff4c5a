// [libs/domain/fhir-sync/src/errors.rs]
use ehr_domain_vendor_adapters::AdapterError;
use ehr_domain_transform::TransformError;
use ehr_infra_db::DbError;
use ehr_infra_transport::RetryableError;

#[derive(Debug, thiserror::Error)]
pub enum FhirSyncError {
    #[error("no adapter registered for vendor")]
    UnknownVendor,

    #[error("fhir-sync executor does not handle this job type")]
    UnsupportedJobType,

    #[error("job carries no resource type filter")]
    MissingResourceTypeFilter,

    #[error("job carries no resource id filter")]
    MissingResourceIdFilter,

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    Transform(#[from] TransformError),
}

impl FhirSyncError {
    /// Whether the worker pool should retry with backoff rather than fail
    /// the job terminally.
    pub fn is_transient(&self) -> bool {
        match self {
            FhirSyncError::Adapter(e) => e.is_transient(),
            _ => false,
        }
    }
}
