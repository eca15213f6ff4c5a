// [libs/domain/models/src/telemetry.rs]
//! Operational error records and regulated compliance incidents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("UNKNOWN_SEVERITY: {other}")),
        }
    }
}

/// The ten operational master categories.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MasterErrorCode {
    DbConnectionError,
    DbQueryError,
    ApiIntegrationError,
    EhrSyncError,
    EhrFhirError,
    ValidationError,
    AuthorizationError,
    SystemError,
    FileSystemError,
    NetworkError,
}

impl MasterErrorCode {
    /// Transient master codes are eligible for retry.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            MasterErrorCode::NetworkError
            | MasterErrorCode::DbConnectionError
            | MasterErrorCode::ApiIntegrationError
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub fingerprint: String,
    pub master_code: MasterErrorCode,
    pub severity: Severity,
    pub message: String,
    pub endpoint: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub occurrence_count: u64,
    pub sample_stack_traces: Vec<String>,
}

/// The eleven regulated categories.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceCategory {
    UnauthorizedAccess,
    PhiDisclosure,
    InsufficientEncryption,
    MissingAuditLogs,
    InadequateAccessControls,
    BreachNotificationFailure,
    BusinessAssociateViolation,
    MinimumNecessaryViolation,
    PatientRightsViolation,
    SecurityRiskAnalysisFailure,
    ComplianceViolation,
}

impl std::str::FromStr for ComplianceCategory {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_uppercase().replace(['-', ' '], "_").as_str() {
            "UNAUTHORIZED_ACCESS" => Ok(ComplianceCategory::UnauthorizedAccess),
            "PHI_DISCLOSURE" => Ok(ComplianceCategory::PhiDisclosure),
            "INSUFFICIENT_ENCRYPTION" => Ok(ComplianceCategory::InsufficientEncryption),
            "MISSING_AUDIT_LOGS" => Ok(ComplianceCategory::MissingAuditLogs),
            "INADEQUATE_ACCESS_CONTROLS" => Ok(ComplianceCategory::InadequateAccessControls),
            "BREACH_NOTIFICATION_FAILURE" => Ok(ComplianceCategory::BreachNotificationFailure),
            "BUSINESS_ASSOCIATE_VIOLATION" => Ok(ComplianceCategory::BusinessAssociateViolation),
            "MINIMUM_NECESSARY_VIOLATION" => Ok(ComplianceCategory::MinimumNecessaryViolation),
            "PATIENT_RIGHTS_VIOLATION" => Ok(ComplianceCategory::PatientRightsViolation),
            "SECURITY_RISK_ANALYSIS_FAILURE" => Ok(ComplianceCategory::SecurityRiskAnalysisFailure),
            "COMPLIANCE_VIOLATION" => Ok(ComplianceCategory::ComplianceViolation),
            other => Err(format!("UNKNOWN_COMPLIANCE_CATEGORY: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvestigationStatus {
    Detected,
    Acknowledged,
    Investigating,
    Contained,
    Reported,
    Remediated,
    Closed,
}

impl std::str::FromStr for InvestigationStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_uppercase().as_str() {
            "DETECTED" => Ok(InvestigationStatus::Detected),
            "ACKNOWLEDGED" => Ok(InvestigationStatus::Acknowledged),
            "INVESTIGATING" => Ok(InvestigationStatus::Investigating),
            "CONTAINED" => Ok(InvestigationStatus::Contained),
            "REPORTED" => Ok(InvestigationStatus::Reported),
            "REMEDIATED" => Ok(InvestigationStatus::Remediated),
            "CLOSED" => Ok(InvestigationStatus::Closed),
            other => Err(format!("UNKNOWN_INVESTIGATION_STATUS: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceIncident {
    /// Format `PREFIX-YYYY-NNNN`, monotonically assigned per year.
    pub incident_number: String,
    pub severity: Severity,
    pub category: ComplianceCategory,
    pub description: String,
    pub regulated_data_exposed: bool,
    pub records_affected: u64,
    pub investigation_status: InvestigationStatus,
    pub assigned_to: Option<String>,
    pub reported_to_regulator_at: Option<DateTime<Utc>>,
    pub breach_notification_sent_at: Option<DateTime<Utc>>,
    pub audit_log_reference: String,
    pub created_at: DateTime<Utc>,
}



