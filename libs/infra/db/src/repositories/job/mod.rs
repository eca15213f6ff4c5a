// [libs/infra/db/src/repositories/job/mod.rs]
/*!
 * APARATO: JOB REPOSITORY (ESTRATO L3)
 * RESPONSABILIDAD: Ciclo de vida del job de sincronización — cola
 * durable, asignación atómica, reclamación de zombies, reintentos.
 */

pub mod queries;

use crate::errors::DbError;
use crate::mapping::{enum_to_text, from_json, parse_opt_rfc3339, parse_rfc3339, text_to_enum, to_json, to_rfc3339};
use chrono::{Duration, Utc};
use ehr_domain_models::{JobStatus, JobSummary, SyncJob};
use libsql::{params, Connection, Row};
use queries as sql;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Twice the default heartbeat interval of 5 minutes.
const ZOMBIE_THRESHOLD_MINUTES: i64 = 10;

pub struct JobRepository {
    connection: Connection,
}

impl JobRepository {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    #[instrument(skip(self, job))]
    pub async fn enqueue(&self, job: &SyncJob) -> Result<(), DbError> {
        self.connection
            .execute(
            sql::INSERT_JOB,
            params![
                job.job_id.clone(),
                enum_to_text(&job.job_type)?,
                enum_to_text(&job.direction)?,
                job.priority as i64,
                job.connection_id.clone(),
                job.resource_type_filter.clone(),
                job.resource_id_filter.as_ref().map(to_json).transpose()?,
                to_json(&job.filter)?,
                to_json(&job.options)?,
                to_rfc3339(job.created_at),
            ],
        )
            .await?;
        self.connection.execute(sql::MARK_QUEUED, params![job.job_id.clone()]).await?;
        info!(job_id = %job.job_id, "job enqueued");
        Ok(())
    }

    /// Atomically claims the next eligible job for `worker_id`, honoring
    /// priority/creation-time/job-id ordering and per-connection
    /// serialization.
    #[instrument(skip(self))]
    pub async fn claim_next(&self, worker_id: &str) -> Result<Option<SyncJob>, DbError> {
        let transaction = self
            .connection
            .transaction()
            .await
            .map_err(|e| DbError::TransactionError(e.to_string()))?;

        let mut candidate_rows = transaction.query(sql::FIND_NEXT_QUEUED, ()).await?;
        let Some(row) = candidate_rows.next().await? else {
            transaction.commit().await.map_err(|e| DbError::TransactionError(e.to_string()))?;
            return Ok(None);
        };
        let job_id: String = row.get(0)?;

        let claimed = transaction
            .execute(sql::CLAIM_JOB, params![job_id.clone(), worker_id])
            .await?;
        if claimed == 0 {
            // Lost the race to another worker between SELECT and UPDATE.
            transaction.commit().await.map_err(|e| DbError::TransactionError(e.to_string()))?;
            return Ok(None);
        }

        transaction.commit().await.map_err(|e| DbError::TransactionError(e.to_string()))?;
        self.find_by_id(&job_id).await.map(Some)
    }

    /// Requeues jobs abandoned by a dead worker without incrementing
    /// `retry_count`.
    #[instrument(skip(self))]
    pub async fn reclaim_zombies(&self) -> Result<Vec<String>, DbError> {
        let threshold = Utc::now() - Duration::minutes(ZOMBIE_THRESHOLD_MINUTES);
        let mut rows = self
            .connection
            .query(sql::FIND_RECLAIMABLE, params![to_rfc3339(threshold)])
            .await?;

        let mut reclaimed = Vec::new();
        while let Some(row) = rows.next().await? {
            let job_id: String = row.get(0)?;
            let affected = self.connection.execute(sql::RECLAIM_JOB, params![job_id.clone()]).await?;
            if affected > 0 {
                warn!(job_id = %job_id, "reclaimed zombie job");
                reclaimed.push(job_id);
            }
        }
        Ok(reclaimed)
    }

    pub async fn renew_heartbeat(&self, job_id: &str) -> Result<(), DbError> {
        let affected = self.connection.execute(sql::RENEW_HEARTBEAT, params![job_id]).await?;
        if affected == 0 {
            return Err(DbError::JobNotFound);
        }
        Ok(())
    }

    /// Only non-terminal jobs may be cancelled;
    /// cancellation of a `PROCESSING` job is cooperative — this call only
    /// flips the row, the worker observes it at its next suspension point.
    #[instrument(skip(self))]
    pub async fn cancel(&self, job_id: &str) -> Result<(), DbError> {
        let affected = self.connection.execute(sql::CANCEL_JOB, params![job_id]).await?;
        if affected == 0 {
            return Err(DbError::InvalidJobTransition);
        }
        Ok(())
    }

    /// Only a `FAILED` job may be retried manually.
    #[instrument(skip(self))]
    pub async fn retry(&self, job_id: &str) -> Result<(), DbError> {
        let affected = self.connection.execute(sql::RETRY_JOB, params![job_id]).await?;
        if affected == 0 {
            return Err(DbError::InvalidJobTransition);
        }
        self.connection.execute(sql::MARK_QUEUED_AFTER_RETRY, params![job_id]).await?;
        Ok(())
    }

    #[instrument(skip(self, summary))]
    pub async fn complete(
        &self,
        job_id: &str,
        terminal_status: JobStatus,
        processed: u64,
        succeeded: u64,
        failed: u64,
        skipped: u64,
        summary: &JobSummary,
    ) -> Result<(), DbError> {
        let affected = self
            .connection
            .execute(
            sql::COMPLETE_JOB,
            params![
                job_id,
                enum_to_text(&terminal_status)?,
                processed as i64,
                succeeded as i64,
                failed as i64,
                skipped as i64,
                to_json(summary)?
            ],
        )
            .await?;
        if affected == 0 {
            return Err(DbError::InvalidJobTransition);
        }
        Ok(())
    }

    pub async fn update_progress(
        &self,
        job_id: &str,
        processed: u64,
        succeeded: u64,
        failed: u64,
        skipped: u64,
        summary: &JobSummary,
    ) -> Result<(), DbError> {
        self.connection
            .execute(
            sql::UPDATE_PROGRESS,
            params![
                job_id,
                processed as i64,
                succeeded as i64,
                failed as i64,
                skipped as i64,
                to_json(summary)?
            ],
        )
            .await?;
        Ok(())
    }

    pub async fn set_status_url(&self, job_id: &str, status_url: &str) -> Result<(), DbError> {
        self.connection.execute(sql::SET_STATUS_URL, params![job_id, status_url]).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, job_id: &str) -> Result<SyncJob, DbError> {
        let mut rows = self.connection.query(sql::FIND_BY_ID, params![job_id]).await?;
        let row = rows.next().await?.ok_or(DbError::JobNotFound)?;
        row_to_job(&row)
    }

    pub async fn history(&self, connection_id: &str, limit: u32, offset: u32) -> Result<Vec<SyncJob>, DbError> {
        let mut rows = self
            .connection
            .query(
            sql::HISTORY_FOR_CONNECTION,
            params![connection_id, limit as i64, offset as i64],
        )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_job(&row)?);
        }
        Ok(out)
    }

    /// Count of jobs not yet terminal, across all connections — the
    /// backpressure gate `Enqueue` checks before admitting new work.
    pub async fn count_active(&self) -> Result<u64, DbError> {
        let mut rows = self.connection.query(sql::COUNT_ACTIVE, ()).await?;
        let row = rows.next().await?.ok_or_else(|| DbError::MappingError("COUNT(*) returned no row".into()))?;
        Ok(row.get::<i64>(0)? as u64)
    }

    pub async fn stats(&self, connection_id: &str, window: Duration) -> Result<Vec<(JobStatus, u64)>, DbError> {
        let since = Utc::now() - window;
        let mut rows = self
            .connection
            .query(sql::STATS_FOR_CONNECTION, params![connection_id, to_rfc3339(since)])
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            let status_text: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            out.push((text_to_enum(&status_text)?, count as u64));
        }
        Ok(out)
    }
}

pub fn new_job_id() -> String {
    Uuid::new_v4().to_string()
}

fn row_to_job(row: &Row) -> Result<SyncJob, DbError> {
    let job_type: String = row.get(1)?;
    let direction: String = row.get(2)?;
    let status: String = row.get(4)?;
    let resource_id_filter: Option<String> = row.get(7)?;
    let filter_json: String = row.get(8)?;
    let options_json: String = row.get(9)?;
    let started_at: Option<String> = row.get(10)?;
    let ended_at: Option<String> = row.get(11)?;
    let summary_json: String = row.get(16)?;
    let heartbeat_at: Option<String> = row.get(20)?;
    let created_at: String = row.get(21)?;
    let updated_at: String = row.get(22)?;

    Ok(SyncJob {
            job_id: row.get(0)?,
            job_type: text_to_enum(&job_type)?,
            direction: text_to_enum(&direction)?,
            priority: row.get::<i64>(3)? as u8,
            status: text_to_enum(&status)?,
            connection_id: row.get(5)?,
            resource_type_filter: row.get(6)?,
            resource_id_filter: resource_id_filter.map(|s| from_json(&s)).transpose()?,
            filter: from_json(&filter_json)?,
            options: from_json(&options_json)?,
            started_at: parse_opt_rfc3339(started_at)?,
            ended_at: parse_opt_rfc3339(ended_at)?,
            processed_count: row.get::<i64>(12)? as u64,
            succeeded_count: row.get::<i64>(13)? as u64,
            failed_count: row.get::<i64>(14)? as u64,
            skipped_count: row.get::<i64>(15)? as u64,
            summary: from_json(&summary_json)?,
            retry_count: row.get::<i64>(17)? as u32,
            status_url: row.get(18)?,
            worker_id: row.get(19)?,
            heartbeat_at: parse_opt_rfc3339(heartbeat_at)?,
            created_at: parse_rfc3339(&created_at)?,
            updated_at: parse_rfc3339(&updated_at)?,
        })
}



