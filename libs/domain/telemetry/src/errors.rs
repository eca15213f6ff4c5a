// [libs/domain/telemetry/src/errors.rs]
use ehr_infra_db::DbError;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    Notification(#[from] ehr_domain_notification::NotificationError),
}
