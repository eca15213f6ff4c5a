// [libs/infra/db/src/repositories/compliance_repository.rs]
/*!
 * APARATO: COMPLIANCE INCIDENT REPOSITORY (ESTRATO L3)
 * RESPONSABILIDAD: Registro inmutable de incidentes regulados con
 * numeración monotónica por año. Ninguna fila de
 * `compliance_incidents` se borra nunca.
 */

use crate::errors::DbError;
use crate::mapping::{enum_to_text, opt_rfc3339, parse_opt_rfc3339, parse_rfc3339, text_to_enum, to_rfc3339};
use chrono::{DateTime, Datelike, Utc};
use ehr_domain_models::{ComplianceCategory, ComplianceIncident, InvestigationStatus, Severity};
use libsql::{params, Connection, Row};
use tracing::instrument;

const INCIDENT_NUMBER_PREFIX: &str = "EHR";

pub struct ComplianceRepository {
    connection: Connection,
}

impl ComplianceRepository {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    /// Reserves the next sequence number for `year` and formats it as
    /// `PREFIX-YYYY-NNNN`. The counter row is updated inside
    /// the same transaction as the incident insert so the numbering stays
    /// gap-free and monotonic even under concurrent reporters.
    #[instrument(skip(self, incident))]
    pub async fn record(&self, incident: &ComplianceIncident) -> Result<String, DbError> {
        let year = incident.created_at.year();
        let transaction = self
            .connection
            .transaction()
            .await
            .map_err(|e| DbError::TransactionError(e.to_string()))?;

        transaction
            .execute(
            r#"INSERT INTO compliance_incident_counters (incident_year, last_sequence)
                VALUES (?1, 1)
                ON CONFLICT(incident_year) DO UPDATE SET last_sequence = last_sequence + 1"#,
            params![year as i64],
        )
            .await?;

        let mut rows = transaction
            .query(
            "SELECT last_sequence FROM compliance_incident_counters WHERE incident_year = ?1",
            params![year as i64],
        )
            .await?;
        let row = rows.next().await?.ok_or_else(|| DbError::MappingError("counter row vanished".into()))?;
        let sequence: i64 = row.get(0)?;
        let incident_number = format!("{INCIDENT_NUMBER_PREFIX}-{year}-{sequence:04}");

        transaction
            .execute(
            r#"INSERT INTO compliance_incidents (
                incident_number, severity, category, description, regulated_data_exposed,
                record_count_affected, investigation_status, assigned_to,
                reported_to_regulator_at, breach_notification_at, audit_log_ref, created_at
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)"#,
            params![
                incident_number.clone(),
                enum_to_text(&incident.severity)?,
                enum_to_text(&incident.category)?,
                incident.description.clone(),
                incident.regulated_data_exposed as i64,
                incident.records_affected as i64,
                enum_to_text(&incident.investigation_status)?,
                incident.assigned_to.clone(),
                opt_rfc3339(incident.reported_to_regulator_at),
                opt_rfc3339(incident.breach_notification_sent_at),
                incident.audit_log_reference.clone(),
                to_rfc3339(incident.created_at),
            ],
        )
            .await?;

        transaction.commit().await.map_err(|e| DbError::TransactionError(e.to_string()))?;
        Ok(incident_number)
    }

    /// Advances `investigation_status` and, where applicable, the regulator
    /// notification timestamps. The row's other fields are never mutated —
    /// compliance incidents are append-only except for this status trail.
    #[instrument(skip(self))]
    pub async fn advance_status(
        &self,
        incident_number: &str,
        status: InvestigationStatus,
        reported_to_regulator_at: Option<DateTime<Utc>>,
        breach_notification_sent_at: Option<DateTime<Utc>>,
    ) -> Result<(), DbError> {
        let affected = self
            .connection
            .execute(
            r#"UPDATE compliance_incidents SET
                investigation_status = ?1,
                reported_to_regulator_at = COALESCE(?2, reported_to_regulator_at),
                breach_notification_at = COALESCE(?3, breach_notification_at)
                WHERE incident_number = ?4"#,
            params![
                enum_to_text(&status)?,
                opt_rfc3339(reported_to_regulator_at),
                opt_rfc3339(breach_notification_sent_at),
                incident_number,
            ],
        )
            .await?;
        if affected == 0 {
            return Err(DbError::IncidentNotFound);
        }
        Ok(())
    }

    pub async fn find(&self, incident_number: &str) -> Result<ComplianceIncident, DbError> {
        let mut rows = self
            .connection
            .query(
            "SELECT * FROM compliance_incidents WHERE incident_number = ?1",
            params![incident_number],
        )
            .await?;
        let row = rows.next().await?.ok_or(DbError::IncidentNotFound)?;
        row_to_incident(&row)
    }

    pub async fn list_open(&self) -> Result<Vec<ComplianceIncident>, DbError> {
        let mut rows = self
            .connection
            .query(
            "SELECT * FROM compliance_incidents WHERE investigation_status != 'CLOSED' ORDER BY created_at ASC",
            (),
        )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_incident(&row)?);
        }
        Ok(out)
    }
}

fn row_to_incident(row: &Row) -> Result<ComplianceIncident, DbError> {
    let severity: String = row.get(1)?;
    let category: String = row.get(2)?;
    let investigation_status: String = row.get(6)?;
    let reported_to_regulator_at: Option<String> = row.get(8)?;
    let breach_notification_sent_at: Option<String> = row.get(9)?;
    let created_at: String = row.get(11)?;

    Ok(ComplianceIncident {
            incident_number: row.get(0)?,
            severity: text_to_enum::<Severity>(&severity)?,
            category: text_to_enum::<ComplianceCategory>(&category)?,
            description: row.get(3)?,
            regulated_data_exposed: row.get::<i64>(4)? != 0,
            records_affected: row.get::<i64>(5)? as u64,
            investigation_status: text_to_enum::<InvestigationStatus>(&investigation_status)?,
            assigned_to: row.get(7)?,
            reported_to_regulator_at: parse_opt_rfc3339(reported_to_regulator_at)?,
            breach_notification_sent_at: parse_opt_rfc3339(breach_notification_sent_at)?,
            audit_log_reference: row.get(10)?,
            created_at: parse_rfc3339(&created_at)?,
        })
}



