// [libs/infra/db/src/repositories/schedule_repository.rs]
/*!
 * APARATO: SCHEDULE & LEADER LEASE REPOSITORY (ESTRATO L3)
 * RESPONSABILIDAD: Descriptores de jobs recurrentes y arrendamiento de
 * liderazgo para que un único proceso dispare cada tick.
 */

use crate::errors::DbError;
use crate::mapping::{from_json, opt_rfc3339, parse_opt_rfc3339, to_json};
use chrono::{DateTime, Duration, Utc};
use libsql::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobTemplate {
    pub job_type: String,
    pub direction: String,
    pub priority: u8,
    pub resource_type_filter: Option<String>,
    pub filter: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct SyncSchedule {
    pub schedule_id: String,
    pub connection_id: String,
    pub cron_spec: String,
    pub job_template: JobTemplate,
    pub next_tick_at: Option<DateTime<Utc>>,
}

pub struct ScheduleRepository {
    connection: Connection,
}

impl ScheduleRepository {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    #[instrument(skip(self, schedule))]
    pub async fn create(&self, schedule: &SyncSchedule) -> Result<(), DbError> {
        self.connection
            .execute(
                "INSERT INTO sync_schedules (schedule_id, connection_id, cron_spec, job_template_json, next_tick_at) VALUES (?1,?2,?3,?4,?5)",
                params![
                    schedule.schedule_id.clone(),
                    schedule.connection_id.clone(),
                    schedule.cron_spec.clone(),
                    to_json(&schedule.job_template)?,
                    opt_rfc3339(schedule.next_tick_at),
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn due(&self, as_of: DateTime<Utc>) -> Result<Vec<SyncSchedule>, DbError> {
        let mut rows = self
            .connection
            .query(
                "SELECT * FROM sync_schedules WHERE next_tick_at IS NOT NULL AND next_tick_at <= ?1",
                params![as_of.to_rfc3339()],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_schedule(&row)?);
        }
        Ok(out)
    }

    pub async fn reschedule(&self, schedule_id: &str, next_tick_at: DateTime<Utc>) -> Result<(), DbError> {
        self.connection
            .execute(
                "UPDATE sync_schedules SET next_tick_at = ?1 WHERE schedule_id = ?2",
                params![next_tick_at.to_rfc3339(), schedule_id],
            )
            .await?;
        Ok(())
    }

    /// Attempts to acquire or renew `lease_name` for `holder_id`; succeeds
    /// only if unheld or already held by `holder_id` (single-leader
    /// scheduling).
    #[instrument(skip(self))]
    pub async fn acquire_lease(&self, lease_name: &str, holder_id: &str, ttl: Duration) -> Result<bool, DbError> {
        let now = Utc::now();
        let expires_at = now + ttl;
        let affected = self
            .connection
            .execute(
                r#"INSERT INTO leader_leases (lease_name, holder_id, expires_at) VALUES (?1,?2,?3)
                   ON CONFLICT(lease_name) DO UPDATE SET
                       holder_id = excluded.holder_id,
                       expires_at = excluded.expires_at
                   WHERE leader_leases.holder_id = excluded.holder_id OR leader_leases.expires_at < ?4"#,
                params![lease_name, holder_id, expires_at.to_rfc3339(), now.to_rfc3339()],
            )
            .await?;
        Ok(affected > 0)
    }

    pub async fn release_lease(&self, lease_name: &str, holder_id: &str) -> Result<(), DbError> {
        self.connection
            .execute(
                "DELETE FROM leader_leases WHERE lease_name = ?1 AND holder_id = ?2",
                params![lease_name, holder_id],
            )
            .await?;
        Ok(())
    }
}

pub fn new_schedule_id() -> String {
    Uuid::new_v4().to_string()
}

fn row_to_schedule(row: &Row) -> Result<SyncSchedule, DbError> {
    let job_template_json: String = row.get(3)?;
    let next_tick_at: Option<String> = row.get(4)?;

    Ok(SyncSchedule {
        schedule_id: row.get(0)?,
        connection_id: row.get(1)?,
        cron_spec: row.get(2)?,
        job_template: from_json(&job_template_json)?,
        next_tick_at: parse_opt_rfc3339(next_tick_at)?,
    })
}
