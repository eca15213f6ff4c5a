// [libs/domain/bulk-export/src/errors.rs]
use ehr_domain_vendor_adapters::AdapterError;
use ehr_infra_db::DbError;
use ehr_infra_transport::RetryableError;

#[derive(Debug, thiserror::Error)]
pub enum BulkExportError {
    #[error("no adapter registered for vendor")]
    UnknownVendor,

    #[error("connection does not support bulk export")]
    UnsupportedOperation,

    #[error("poll exceeded maximum duration")]
    PollTimeout,

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    Transform(#[from] ehr_domain_transform::TransformError),
}

impl BulkExportError {
    /// Whether the worker pool should retry with backoff rather than fail
    /// the job terminally.
    pub fn is_transient(&self) -> bool {
        match self {
            BulkExportError::Adapter(e) => e.is_transient(),
            BulkExportError::PollTimeout => true,
            _ => false,
        }
    }
}
