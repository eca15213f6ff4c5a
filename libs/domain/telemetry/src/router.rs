// [libs/domain/telemetry/src/router.rs]
/*!
 * APARATO: TELEMETRY ROUTER (ESTRATO L2)
 * RESPONSABILIDAD: Clasifica, deduplica y enruta errores entre el
 * almacén operativo y el almacén inmutable de incidentes regulados.
 */

use std::sync::Arc;

use chrono::Utc;
use ehr_domain_models::{ComplianceCategory, ComplianceIncident, ErrorRecord, InvestigationStatus, MasterErrorCode, Severity};
use ehr_domain_notification::{Notification, NotificationDispatcher, NotificationSeverity};
use ehr_infra_db::{ComplianceRepository, ErrorRepository};
use tracing::{info, instrument, warn};

use crate::classification::{classify_compliance, classify_master_code, SubCode};
use crate::config::TelemetryConfig;
use crate::errors::TelemetryError;
use crate::fingerprint;

/// One error as submitted by any component in the core, before
/// classification.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    pub message: String,
    pub sub_code: Option<SubCode>,
    pub endpoint: Option<String>,
    pub severity: Severity,
    pub stack_trace: Option<String>,
    /// Caller-asserted compliance classification; bypasses keyword
    /// matching when present.
    pub explicit_compliance: Option<ComplianceCategory>,
    pub regulated_data_exposed: bool,
    pub records_affected: u64,
}

impl ErrorEvent {
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            sub_code: None,
            endpoint: None,
            severity,
            stack_trace: None,
            explicit_compliance: None,
            regulated_data_exposed: false,
            records_affected: 0,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_sub_code(mut self, sub_code: SubCode) -> Self {
        self.sub_code = Some(sub_code);
        self
    }

    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }

    pub fn as_compliance(mut self, category: ComplianceCategory) -> Self {
        self.explicit_compliance = Some(category);
        self
    }
}

#[derive(Debug, Clone)]
pub enum RoutedOutcome {
    Operational(ErrorRecord),
    Compliance(ComplianceIncident),
}

pub struct TelemetryRouter {
    errors: Arc<ErrorRepository>,
    compliance: Arc<ComplianceRepository>,
    notifiers: Vec<Arc<dyn NotificationDispatcher>>,
    config: TelemetryConfig,
}

impl TelemetryRouter {
    pub fn new(errors: Arc<ErrorRepository>, compliance: Arc<ComplianceRepository>, notifiers: Vec<Arc<dyn NotificationDispatcher>>, config: TelemetryConfig) -> Self {
        Self { errors, compliance, notifiers, config }
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    pub fn errors(&self) -> &Arc<ErrorRepository> {
        &self.errors
    }

    /// Classifies `event` and routes it. Compliance-relevant
    /// events never touch the deduplication path; everything else is
    /// merged into its fingerprint's running record.
    #[instrument(skip(self, event), fields(severity = ?event.severity))]
    pub async fn report(&self, event: ErrorEvent) -> Result<RoutedOutcome, TelemetryError> {
        let category = event.explicit_compliance.or_else(|| classify_compliance(&event.message));

        if let Some(category) = category {
            return self.route_compliance(event, category).await.map(RoutedOutcome::Compliance);
        }

        let master_code = event.sub_code.map(SubCode::master_code).unwrap_or_else(|| classify_master_code(&event.message));
        let fp = fingerprint::compute(&event.message, master_code, event.endpoint.as_deref());
        let window = chrono::Duration::from_std(self.config.dedup_window).unwrap_or(chrono::Duration::minutes(5));

        let record = self
            .errors
            .record_occurrence(
            &fp,
            master_code,
            event.severity,
            &event.message,
            event.endpoint.as_deref(),
            Utc::now(),
            window,
            self.config.max_sample_stack_traces,
            event.stack_trace.as_deref(),
        )
            .await?;
        Ok(RoutedOutcome::Operational(record))
    }

    async fn route_compliance(&self, event: ErrorEvent, category: ComplianceCategory) -> Result<ComplianceIncident, TelemetryError> {
        let incident = ComplianceIncident {
            incident_number: String::new(),
            severity: event.severity,
            category,
            description: event.message.clone(),
            regulated_data_exposed: event.regulated_data_exposed,
            records_affected: event.records_affected,
            investigation_status: InvestigationStatus::Detected,
            assigned_to: None,
            reported_to_regulator_at: None,
            breach_notification_sent_at: None,
            audit_log_reference: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
        };
        let incident_number = self.compliance.record(&incident).await?;
        let mut recorded = incident;
        recorded.incident_number = incident_number.clone();

        info!(incident_number = %incident_number, ?category, "compliance incident recorded");
        self.notify(&recorded).await;
        Ok(recorded)
    }

    /// Fans out to every configured sink; an individual transport failure
    /// is logged but never aborts incident recording — the incident is
    /// already durable by the time dispatch runs.
    async fn notify(&self, incident: &ComplianceIncident) {
        let notification = Notification::for_incident(
            &incident.incident_number,
            NotificationSeverity::Critical,
            "Compliance incident detected",
            &incident.description,
        );
        for notifier in &self.notifiers {
            if let Err(error) = notifier.dispatch(&notification).await {
                warn!(incident_number = %incident.incident_number, %error, "notification dispatch failed");
            }
        }
    }
}

/// Whether a master code is eligible for retry.
pub fn is_transient(master_code: MasterErrorCode) -> bool {
    master_code.is_transient()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_event_builder_sets_endpoint_and_subcode() {
        let event = ErrorEvent::new("db pool exhausted", Severity::High).with_endpoint("/ehr/sync").with_sub_code(SubCode::DbPoolExhausted);
        assert_eq!(event.endpoint.as_deref(), Some("/ehr/sync"));
        assert_eq!(event.sub_code, Some(SubCode::DbPoolExhausted));
    }
}



