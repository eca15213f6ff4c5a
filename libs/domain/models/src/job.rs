// [libs/domain/models/src/job.rs]
//! One unit of orchestrated work and its state
//! machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobType {
    Full,
    Incremental,
    Patient,
    Resource,
    Webhook,
    BulkExport,
}

impl std::str::FromStr for JobType {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_uppercase().as_str() {
            "FULL" => Ok(JobType::Full),
            "INCREMENTAL" => Ok(JobType::Incremental),
            "PATIENT" => Ok(JobType::Patient),
            "RESOURCE" => Ok(JobType::Resource),
            "WEBHOOK" => Ok(JobType::Webhook),
            "BULK_EXPORT" => Ok(JobType::BulkExport),
            other => Err(format!("UNKNOWN_JOB_TYPE: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobDirection {
    Inbound,
    Outbound,
    Bidirectional,
}

impl std::str::FromStr for JobDirection {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_uppercase().as_str() {
            "INBOUND" => Ok(JobDirection::Inbound),
            "OUTBOUND" => Ok(JobDirection::Outbound),
            "BIDIRECTIONAL" => Ok(JobDirection::Bidirectional),
            other => Err(format!("UNKNOWN_JOB_DIRECTION: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Retrying,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }

    /// Legal successor states per the job state machine:
    /// `PENDING -> QUEUED -> PROCESSING -> {COMPLETED|FAILED|CANCELLED|RETRYING -> QUEUED}`.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Queued)
            | (Queued, Processing)
            | (Queued, Cancelled)
            | (Pending, Cancelled)
            | (Processing, Completed)
            | (Processing, Failed)
            | (Processing, Cancelled)
            | (Processing, Retrying)
            | (Retrying, Queued)
            | (Failed, Retrying)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOptions {
    pub batch_size: u32,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub timeout_ms: u64,
    pub validate_output: bool,
    pub resolve_conflicts: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_retries: 3,
            retry_delay_ms: 250,
            timeout_ms: 5 * 60 * 1000,
            validate_output: false,
            resolve_conflicts: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobSummary {
    pub created: u64,
    pub updated: u64,
    pub deleted: u64,
    pub bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncJob {
    pub job_id: String,
    pub job_type: JobType,
    pub direction: JobDirection,
    /// 1 = critical... 5 = background.
    pub priority: u8,
    pub status: JobStatus,
    pub connection_id: String,
    pub resource_type_filter: Option<String>,
    pub resource_id_filter: Option<Vec<String>>,
    pub filter: HashMap<String, String>,
    pub options: JobOptions,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub processed_count: u64,
    pub succeeded_count: u64,
    pub failed_count: u64,
    pub skipped_count: u64,
    pub summary: JobSummary,
    pub retry_count: u32,
    pub status_url: Option<String>,
    pub worker_id: Option<String>,
    pub heartbeat_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SyncJob {
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}



