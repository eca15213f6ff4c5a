// [libs/domain/telemetry/src/classification.rs]
//! Master-code and compliance classification by explicit sub-code or,
//! failing that, message-keyword matching.

use ehr_domain_models::{ComplianceCategory, MasterErrorCode};

/// The closed sub-code set each master category owns. A caller may supply
/// one of these directly instead of relying on keyword matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubCode {
    DbTimeout,
    DbAuthFailed,
    DbPoolExhausted,
    DbConnectionRefused,
    DbHostUnreachable,
    DbQuerySyntax,
    DbConstraintViolation,
    ApiRateLimited,
    ApiUnauthorized,
    ApiBadResponse,
    EhrTokenExpired,
    EhrVendorUnavailable,
    EhrScopeDenied,
    EhrResourceNotFound,
    EhrInvalidFhirBundle,
    ValidationRequiredFieldMissing,
    ValidationTypeMismatch,
    AuthForbidden,
    AuthSessionExpired,
    SystemPanic,
    SystemOutOfMemory,
    FileNotFound,
    FileDiskFull,
    NetworkTimeout,
    NetworkConnectionRefused,
    NetworkDnsFailure,
}

impl SubCode {
    pub fn master_code(self) -> MasterErrorCode {
        use MasterErrorCode::*;
        match self {
            SubCode::DbTimeout | SubCode::DbAuthFailed | SubCode::DbPoolExhausted | SubCode::DbConnectionRefused | SubCode::DbHostUnreachable => DbConnectionError,
            SubCode::DbQuerySyntax | SubCode::DbConstraintViolation => DbQueryError,
            SubCode::ApiRateLimited | SubCode::ApiUnauthorized | SubCode::ApiBadResponse => ApiIntegrationError,
            SubCode::EhrTokenExpired | SubCode::EhrVendorUnavailable | SubCode::EhrScopeDenied => EhrSyncError,
            SubCode::EhrResourceNotFound | SubCode::EhrInvalidFhirBundle => EhrFhirError,
            SubCode::ValidationRequiredFieldMissing | SubCode::ValidationTypeMismatch => ValidationError,
            SubCode::AuthForbidden | SubCode::AuthSessionExpired => AuthorizationError,
            SubCode::SystemPanic | SubCode::SystemOutOfMemory => SystemError,
            SubCode::FileNotFound | SubCode::FileDiskFull => FileSystemError,
            SubCode::NetworkTimeout | SubCode::NetworkConnectionRefused | SubCode::NetworkDnsFailure => NetworkError,
        }
    }
}

/// Maps message substrings to a master code when the caller has not
/// classified the error explicitly.
pub fn classify_master_code(message: &str) -> MasterErrorCode {
    let lower = message.to_ascii_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["timeout", "connection refused", "dns", "unreachable", "econnreset"]) {
        MasterErrorCode::NetworkError
    } else if has(&["connection pool", "db connection", "database connection", "pool exhausted"]) {
        MasterErrorCode::DbConnectionError
    } else if has(&["sql", "query failed", "constraint violation", "syntax error"]) {
        MasterErrorCode::DbQueryError
    } else if has(&["fhir", "bundle", "resource not found", "nct code"]) {
        MasterErrorCode::EhrFhirError
    } else if has(&["token expired", "vendor unavailable", "ehr sync", "smart-on-fhir"]) {
        MasterErrorCode::EhrSyncError
    } else if has(&["rate limit", "429", "503", "bad gateway", "502", "upstream"]) {
        MasterErrorCode::ApiIntegrationError
    } else if has(&["unauthorized", "401", "forbidden", "403", "permission denied"]) {
        MasterErrorCode::AuthorizationError
    } else if has(&["required field", "invalid value", "validation failed", "schema"]) {
        MasterErrorCode::ValidationError
    } else if has(&["enoent", "no such file", "disk full", "file system"]) {
        MasterErrorCode::FileSystemError
    } else {
        MasterErrorCode::SystemError
    }
}

/// Keyword families for each regulated category.
const COMPLIANCE_KEYWORDS: &[(&[&str], ComplianceCategory)] = &[
    (&["unauthorized access to patient", "unauthorized access"], ComplianceCategory::UnauthorizedAccess),
    (&["protected health information", "phi disclosure", "phi exposed"], ComplianceCategory::PhiDisclosure),
    (&["encryption failure", "insufficient encryption", "unencrypted token"], ComplianceCategory::InsufficientEncryption),
    (&["audit log failure", "missing audit log"], ComplianceCategory::MissingAuditLogs),
    (&["inadequate access control"], ComplianceCategory::InadequateAccessControls),
    (&["breach notification"], ComplianceCategory::BreachNotificationFailure),
    (&["business associate"], ComplianceCategory::BusinessAssociateViolation),
    (&["minimum necessary"], ComplianceCategory::MinimumNecessaryViolation),
    (&["patient rights"], ComplianceCategory::PatientRightsViolation),
    (&["security risk analysis"], ComplianceCategory::SecurityRiskAnalysisFailure),
    (&["hipaa", "hitech", "gdpr", "compliance violation"], ComplianceCategory::ComplianceViolation),
];

/// Whether `message` matches a compliance keyword family, and which
/// category it falls under if so.
pub fn classify_compliance(message: &str) -> Option<ComplianceCategory> {
    let lower = message.to_ascii_lowercase();
    COMPLIANCE_KEYWORDS.iter().find(|(needles, _)| needles.iter().any(|n| lower.contains(n))).map(|(_, category)| *category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_match_picks_network_error() {
        assert_eq!(classify_master_code("upstream request timeout"), MasterErrorCode::NetworkError);
    }

    #[test]
    fn unmatched_message_falls_back_to_system_error() {
        assert_eq!(classify_master_code("something odd happened"), MasterErrorCode::SystemError);
    }

    #[test]
    fn detects_unauthorized_access_to_patient_records() {
        assert_eq!(classify_compliance("unauthorized access to patient medical records"), Some(ComplianceCategory::UnauthorizedAccess));
    }

    #[test]
    fn benign_message_is_not_compliance_relevant() {
        assert_eq!(classify_compliance("connection timed out"), None);
    }

    #[test]
    fn sub_code_maps_to_its_owning_master_category() {
        assert_eq!(SubCode::DbPoolExhausted.master_code(), MasterErrorCode::DbConnectionError);
    }
}
