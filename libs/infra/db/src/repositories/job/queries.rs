// [libs/infra/db/src/repositories/job/queries.rs]
//! SQL text for the job queue.

pub const INSERT_JOB: &str = r#"
    INSERT INTO jobs (
    job_id, job_type, direction, priority, status, connection_id,
    resource_type_filter, resource_id_filter, filter_json, options_json,
    retry_count, created_at, updated_at
    ) VALUES (?1,?2,?3,?4,'PENDING',?5,?6,?7,?8,?9,0,?10,?10)
    "#;

pub const MARK_QUEUED: &str = "UPDATE jobs SET status = 'QUEUED', updated_at = CURRENT_TIMESTAMP WHERE job_id = ?1 AND status = 'PENDING'";

/// Selects the next eligible job respecting priority ascending, then
/// creation time, then job id as the final tie-break, skipping any connection that already has a
/// `PROCESSING` job.
pub const FIND_NEXT_QUEUED: &str = r#"
    SELECT job_id FROM jobs
    WHERE status = 'QUEUED'
    AND connection_id NOT IN (SELECT connection_id FROM jobs WHERE status = 'PROCESSING')
    ORDER BY priority ASC, created_at ASC, job_id ASC
    LIMIT 1
    "#;

pub const CLAIM_JOB: &str = r#"
    UPDATE jobs SET
    status = 'PROCESSING',
    worker_id = ?2,
    started_at = CURRENT_TIMESTAMP,
    heartbeat_at = CURRENT_TIMESTAMP,
    updated_at = CURRENT_TIMESTAMP
    WHERE job_id = ?1 AND status = 'QUEUED'
    "#;

/// Jobs whose heartbeat has not been renewed within twice the heartbeat
/// interval are reclaimable. `?1` is that staleness
/// threshold as an RFC3339 timestamp.
pub const FIND_RECLAIMABLE: &str = r#"
    SELECT job_id FROM jobs
    WHERE status = 'PROCESSING' AND (heartbeat_at IS NULL OR heartbeat_at < ?1)
    "#;

/// Reclamation itself does not increment `retry_count`.
pub const RECLAIM_JOB: &str = r#"
    UPDATE jobs SET
    status = 'QUEUED',
    worker_id = NULL,
    heartbeat_at = NULL,
    updated_at = CURRENT_TIMESTAMP
    WHERE job_id = ?1 AND status = 'PROCESSING'
    "#;

pub const RENEW_HEARTBEAT: &str = "UPDATE jobs SET heartbeat_at = CURRENT_TIMESTAMP WHERE job_id = ?1 AND status = 'PROCESSING'";

pub const CANCEL_JOB: &str = r#"
    UPDATE jobs SET status = 'CANCELLED', ended_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP
    WHERE job_id = ?1 AND status IN ('PENDING', 'QUEUED', 'PROCESSING')
    "#;

pub const RETRY_JOB: &str = r#"
    UPDATE jobs SET
    status = 'RETRYING',
    retry_count = retry_count + 1,
    processed_count = 0, succeeded_count = 0, failed_count = 0, skipped_count = 0,
    started_at = NULL, ended_at = NULL,
    updated_at = CURRENT_TIMESTAMP
    WHERE job_id = ?1 AND status = 'FAILED'
    "#;

pub const MARK_QUEUED_AFTER_RETRY: &str = "UPDATE jobs SET status = 'QUEUED', updated_at = CURRENT_TIMESTAMP WHERE job_id = ?1 AND status = 'RETRYING'";

pub const COMPLETE_JOB: &str = r#"
    UPDATE jobs SET
    status = ?2,
    ended_at = CURRENT_TIMESTAMP,
    processed_count = ?3, succeeded_count = ?4, failed_count = ?5, skipped_count = ?6,
    summary_json = ?7,
    updated_at = CURRENT_TIMESTAMP
    WHERE job_id = ?1 AND status = 'PROCESSING'
    "#;

pub const UPDATE_PROGRESS: &str = r#"
    UPDATE jobs SET
    processed_count = ?2, succeeded_count = ?3, failed_count = ?4, skipped_count = ?5,
    summary_json = ?6, updated_at = CURRENT_TIMESTAMP
    WHERE job_id = ?1
    "#;

/// Stashes the vendor's bulk export polling URL (`Content-Location` from
/// kickoff) so a restarted runner can resume polling without re-kicking
/// off the export.
pub const SET_STATUS_URL: &str = "UPDATE jobs SET status_url = ?2, updated_at = CURRENT_TIMESTAMP WHERE job_id = ?1";

pub const FIND_BY_ID: &str = "SELECT * FROM jobs WHERE job_id = ?1";

pub const HISTORY_FOR_CONNECTION: &str = r#"
    SELECT * FROM jobs WHERE connection_id = ?1 ORDER BY created_at DESC LIMIT ?2 OFFSET ?3
    "#;

pub const STATS_FOR_CONNECTION: &str = r#"
    SELECT status, COUNT(*) FROM jobs
    WHERE connection_id = ?1 AND created_at >= ?2
    GROUP BY status
    "#;

/// Backpressure gate for `Enqueue`.
pub const COUNT_ACTIVE: &str = "SELECT COUNT(*) FROM jobs WHERE status IN ('PENDING', 'QUEUED', 'PROCESSING')";



