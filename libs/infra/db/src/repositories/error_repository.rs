// [libs/infra/db/src/repositories/error_repository.rs]
/*!
 * APARATO: ERROR RECORD REPOSITORY (ESTRATO L3)
 * RESPONSABILIDAD: Deduplicación de errores operativos por huella digital
 * dentro de la ventana deslizante.
 */

use crate::errors::DbError;
use crate::mapping::{enum_to_text, from_json, parse_rfc3339, text_to_enum, to_json};
use chrono::{DateTime, Duration, Utc};
use ehr_domain_models::{ErrorRecord, MasterErrorCode, Severity};
use libsql::{params, Connection, Row};
use tracing::instrument;

pub struct ErrorRepository {
    connection: Connection,
}

impl ErrorRepository {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    /// Merges into the existing fingerprint if its `last_seen` falls within
    /// `window`, appending `stack_trace` only while fewer than
    /// `max_samples` are already stored; otherwise starts a fresh record.
    /// Read-then-write runs inside one
    /// transaction so concurrent occurrences of the same fingerprint don't
    /// race each other's sample append.
    #[instrument(skip(self, stack_trace))]
    #[allow(clippy::too_many_arguments)]
    pub async fn record_occurrence(
        &self,
        fingerprint: &str,
        master_code: MasterErrorCode,
        severity: Severity,
        message: &str,
        endpoint: Option<&str>,
        now: DateTime<Utc>,
        window: Duration,
        max_samples: usize,
        stack_trace: Option<&str>,
    ) -> Result<ErrorRecord, DbError> {
        let transaction = self
            .connection
            .transaction()
            .await
            .map_err(|e| DbError::TransactionError(e.to_string()))?;

        let mut rows = transaction
            .query("SELECT * FROM error_records WHERE fingerprint = ?1", params![fingerprint])
            .await?;
        let existing = match rows.next().await? {
            Some(row) => Some(row_to_error_record(&row)?),
            None => None,
        };
        drop(rows);

        let merged = match existing {
            Some(mut record) if now - record.last_seen <= window => {
                record.last_seen = now;
                record.occurrence_count += 1;
                if let Some(trace) = stack_trace {
                    if record.sample_stack_traces.len() < max_samples {
                        record.sample_stack_traces.push(trace.to_string());
                    }
                }
                transaction
                    .execute(
                    r#"UPDATE error_records SET
                        last_seen = ?1, occurrence_count = ?2, sample_stack_traces_json = ?3
                        WHERE fingerprint = ?4"#,
                    params![record.last_seen.to_rfc3339(), record.occurrence_count as i64, to_json(&record.sample_stack_traces)?, fingerprint],
                )
                    .await?;
                record
            }
            _ => {
                let record = ErrorRecord {
                    fingerprint: fingerprint.to_string(),
                    master_code,
                    severity,
                    message: message.to_string(),
                    endpoint: endpoint.map(str::to_string),
                    first_seen: now,
                    last_seen: now,
                    occurrence_count: 1,
                    sample_stack_traces: stack_trace.into_iter().map(str::to_string).collect(),
                };
                transaction
                    .execute(
                    r#"INSERT INTO error_records (
                        fingerprint, master_code, severity, message, endpoint,
                        first_seen, last_seen, occurrence_count, sample_stack_traces_json
                        ) VALUES (?1,?2,?3,?4,?5,?6,?7,1,?8)
                        ON CONFLICT(fingerprint) DO UPDATE SET
                        master_code = excluded.master_code,
                        severity = excluded.severity,
                        message = excluded.message,
                        endpoint = excluded.endpoint,
                        first_seen = excluded.first_seen,
                        last_seen = excluded.last_seen,
                        occurrence_count = 1,
                        sample_stack_traces_json = excluded.sample_stack_traces_json"#,
                    params![
                        record.fingerprint.clone(),
                        enum_to_text(&record.master_code)?,
                        enum_to_text(&record.severity)?,
                        record.message.clone(),
                        record.endpoint.clone(),
                        record.first_seen.to_rfc3339(),
                        record.last_seen.to_rfc3339(),
                        to_json(&record.sample_stack_traces)?,
                    ],
                )
                    .await?;
                record
            }
        };

        transaction.commit().await.map_err(|e| DbError::TransactionError(e.to_string()))?;
        Ok(merged)
    }

    /// Deletes operational records older than `before` for `severity`.
    /// Never applies to compliance
    /// incidents, which live in a separate table entirely.
    pub async fn purge_older_than(&self, severity: Severity, before: DateTime<Utc>) -> Result<u64, DbError> {
        let affected = self
            .connection
            .execute(
            "DELETE FROM error_records WHERE severity = ?1 AND last_seen < ?2",
            params![enum_to_text(&severity)?, before.to_rfc3339()],
        )
            .await?;
        Ok(affected)
    }

    pub async fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<ErrorRecord>, DbError> {
        let mut rows = self
            .connection
            .query("SELECT * FROM error_records WHERE fingerprint = ?1", params![fingerprint])
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_error_record(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn recent_by_severity(&self, minimum_severity: Severity, since: DateTime<Utc>) -> Result<Vec<ErrorRecord>, DbError> {
        let mut rows = self
            .connection
            .query(
            "SELECT * FROM error_records WHERE last_seen >= ?1 ORDER BY last_seen DESC",
            params![since.to_rfc3339()],
        )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            let record = row_to_error_record(&row)?;
            if record.severity >= minimum_severity {
                out.push(record);
            }
        }
        Ok(out)
    }

    /// Collapses records whose dedup window has already lapsed (`last_seen`
    /// older than `window`) and that share a `(master_code, endpoint)` pair —
    /// the fingerprint differs only because the message text drifted across
    /// separate windows (a transient error recurring over days, each
    /// occurrence reported with a slightly different context string). The
    /// survivor is the row with the latest `last_seen`; its occurrence count
    /// absorbs the others', its `first_seen` widens to the earliest, and its
    /// sample traces are topped up from the merged rows up to `max_samples`.
    /// Live (in-window) records are never touched.
    #[instrument(skip(self))]
    pub async fn consolidate_expired(&self, now: DateTime<Utc>, window: Duration, max_samples: usize) -> Result<u64, DbError> {
        let threshold = now - window;
        let mut rows = self
            .connection
            .query("SELECT * FROM error_records WHERE last_seen < ?1", params![threshold.to_rfc3339()])
            .await?;

        let mut expired = Vec::new();
        while let Some(row) = rows.next().await? {
            expired.push(row_to_error_record(&row)?);
        }
        drop(rows);

        let mut groups: std::collections::HashMap<(MasterErrorCode, Option<String>), Vec<ErrorRecord>> = std::collections::HashMap::new();
        for record in expired {
            groups.entry((record.master_code, record.endpoint.clone())).or_default().push(record);
        }

        let mut merged_groups = 0;
        for (_, mut group) in groups {
            if group.len() < 2 {
                continue;
            }
            group.sort_by_key(|r| r.last_seen);
            let mut survivor = group.pop().expect("group has at least 2 records");
            for stale in &group {
                survivor.occurrence_count += stale.occurrence_count;
                survivor.first_seen = survivor.first_seen.min(stale.first_seen);
                for trace in &stale.sample_stack_traces {
                    if survivor.sample_stack_traces.len() >= max_samples {
                        break;
                    }
                    survivor.sample_stack_traces.push(trace.clone());
                }
            }

            let transaction = self.connection.transaction().await.map_err(|e| DbError::TransactionError(e.to_string()))?;
            for stale in &group {
                transaction.execute("DELETE FROM error_records WHERE fingerprint = ?1", params![stale.fingerprint.clone()]).await?;
            }
            transaction
                .execute(
                r#"UPDATE error_records SET
                    occurrence_count = ?1, first_seen = ?2, sample_stack_traces_json = ?3
                    WHERE fingerprint = ?4"#,
                params![
                    survivor.occurrence_count as i64,
                    survivor.first_seen.to_rfc3339(),
                    to_json(&survivor.sample_stack_traces)?,
                    survivor.fingerprint.clone(),
                ],
            )
                .await?;
            transaction.commit().await.map_err(|e| DbError::TransactionError(e.to_string()))?;
            merged_groups += 1;
        }

        Ok(merged_groups)
    }
}

fn row_to_error_record(row: &Row) -> Result<ErrorRecord, DbError> {
    let master_code: String = row.get(1)?;
    let severity: String = row.get(2)?;
    let first_seen: String = row.get(5)?;
    let last_seen: String = row.get(6)?;
    let sample_stack_traces_json: String = row.get(8)?;

    Ok(ErrorRecord {
            fingerprint: row.get(0)?,
            master_code: text_to_enum::<MasterErrorCode>(&master_code)?,
            severity: text_to_enum::<Severity>(&severity)?,
            message: row.get(3)?,
            endpoint: row.get(4)?,
            first_seen: parse_rfc3339(&first_seen)?,
            last_seen: parse_rfc3339(&last_seen)?,
            occurrence_count: row.get::<i64>(7)? as u64,
            sample_stack_traces: from_json(&sample_stack_traces_json)?,
        })
}



