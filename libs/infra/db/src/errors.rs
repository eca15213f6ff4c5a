// [libs/infra/db/src/errors.rs]
//! Error catalog for the persistence layer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("[L3_DB_NET_FAULT]: DATABASE_UPLINK_SEVERED -> {0}")]
    ConnectionError(String),

    #[error("[L3_DB_CONFIG_FAULT]: CONFIGURATION_INVALID -> {0}")]
    ConfigurationError(String),

    #[error("[L3_DB_QUERY_FAULT]: SQL_QUERY_REJECTED -> {0}")]
    QueryError(#[from] libsql::Error),

    #[error("[L3_DB_MAPPING_FAULT]: DATA_MAPPING_VIOLATION -> {0}")]
    MappingError(String),

    #[error("[L3_DB_FAULT]: TRANSACTION_COLLAPSE -> {0}")]
    TransactionError(String),

    #[error("[L3_CONNECTION_FAULT]: CONNECTION_NOT_FOUND")]
    ConnectionNotFound,

    #[error("[L3_JOB_FAULT]: JOB_NOT_FOUND")]
    JobNotFound,

    #[error("[L3_JOB_FAULT]: INVALID_STATE_TRANSITION")]
    InvalidJobTransition,

    #[error("[L3_RULE_FAULT]: RULE_NOT_FOUND")]
    RuleNotFound,

    #[error("[L3_COMPLIANCE_FAULT]: INCIDENT_NOT_FOUND")]
    IncidentNotFound,

    #[error("[L3_COMPLIANCE_FAULT]: IMMUTABLE_RECORD -> compliance incidents cannot be modified or deleted once written, only transitioned through investigation status")]
    ImmutableRecord,
}

/// Bridges persistence failures into the SMART Auth Manager's own error
/// type so `ConnectionRepository` can implement `ehr_core_auth::ConnectionTokenStore`
/// without that crate depending on this one.
impl From<DbError> for ehr_core_auth::AuthError {
    fn from(error: DbError) -> Self {
        ehr_core_auth::AuthError::RefreshFailed(error.to_string())
    }
}



