// [libs/domain/sync-orchestrator/src/orchestrator.rs]
//! `SyncOrchestrator`: the facade over the durable job queue — `Enqueue`,
//! `Cancel`, `Retry`, `Schedule`, `Status`, `History`, `Stats` — backed by
//! the durable queue in `ehr-infra-db` and a worker pool this crate drives.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use ehr_domain_models::{JobDirection, JobOptions, JobStatus, JobType, SyncJob};
use ehr_infra_db::{JobRepository, ScheduleRepository};
use tracing::info;
use uuid::Uuid;

use crate::config::OrchestratorConfig;
use crate::errors::OrchestratorError;
use crate::executor::JobExecutor;
use crate::scheduler::ScheduleTicker;
use crate::worker::WorkerPool;

/// What a caller supplies to enqueue new work.
#[derive(Debug, Clone)]
pub struct EnqueueRequest {
    pub job_type: JobType,
    pub direction: JobDirection,
    pub priority: u8,
    pub connection_id: String,
    pub resource_type_filter: Option<String>,
    pub resource_id_filter: Option<Vec<String>>,
    pub filter: HashMap<String, String>,
    pub options: JobOptions,
}

pub struct SyncOrchestrator {
    jobs: Arc<JobRepository>,
    schedules: Arc<ScheduleRepository>,
    executors: Arc<HashMap<JobType, Arc<dyn JobExecutor>>>,
    config: OrchestratorConfig,
}

/// Handle returned by [`SyncOrchestrator::spawn`]; dropping it does not
/// stop anything — call [`OrchestratorHandle::shutdown`] explicitly.
pub struct OrchestratorHandle {
    worker_pool: WorkerPool,
    scheduler: ScheduleTicker,
}

impl OrchestratorHandle {
    /// Stops intake, signals every in-flight job's cancellation token, and
    /// waits up to `shutdown_grace_period` for workers to drain before
    /// returning.
    pub async fn shutdown(self) {
        self.scheduler.stop().await;
        self.worker_pool.shutdown().await;
    }
}

impl SyncOrchestrator {
    pub fn new(
        jobs: Arc<JobRepository>,
        schedules: Arc<ScheduleRepository>,
        executors: HashMap<JobType, Arc<dyn JobExecutor>>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            jobs,
            schedules,
            executors: Arc::new(executors),
            config,
        }
    }

    /// Starts the worker pool and the schedule ticker as background tasks.
    pub fn spawn(&self) -> OrchestratorHandle {
        let worker_pool = WorkerPool::spawn(
            Arc::clone(&self.jobs),
            Arc::clone(&self.executors),
            self.config.clone(),
        );
        let scheduler = ScheduleTicker::spawn(
            Arc::clone(&self.jobs),
            Arc::clone(&self.schedules),
            self.config.clone(),
        );
        OrchestratorHandle { worker_pool, scheduler }
    }

    /// `Enqueue`; refuses admission once the active job count
    /// reaches the configured high-water mark.
    pub async fn enqueue(&self, request: EnqueueRequest) -> Result<SyncJob, OrchestratorError> {
        let active = self.jobs.count_active().await?;
        if active >= self.config.queue_high_water_mark {
            return Err(OrchestratorError::QueueFull {
                    active,
                    high_water_mark: self.config.queue_high_water_mark,
                });
        }

        let job = SyncJob {
            job_id: Uuid::new_v4().to_string(),
            job_type: request.job_type,
            direction: request.direction,
            priority: request.priority,
            status: JobStatus::Pending,
            connection_id: request.connection_id,
            resource_type_filter: request.resource_type_filter,
            resource_id_filter: request.resource_id_filter,
            filter: request.filter,
            options: request.options,
            started_at: None,
            ended_at: None,
            processed_count: 0,
            succeeded_count: 0,
            failed_count: 0,
            skipped_count: 0,
            summary: Default::default(),
            retry_count: 0,
            status_url: None,
            worker_id: None,
            heartbeat_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.jobs.enqueue(&job).await?;
        info!(job_id = %job.job_id, job_type = ?job.job_type, "job enqueued");
        self.jobs.find_by_id(&job.job_id).await.map_err(Into::into)
    }

    /// `Cancel`. Cooperative: a `PROCESSING` job only stops at
    /// its next suspension point, once the worker observes the token.
    pub async fn cancel(&self, job_id: &str) -> Result<(), OrchestratorError> {
        self.jobs.cancel(job_id).await.map_err(|e| match e {
                ehr_infra_db::DbError::InvalidJobTransition => OrchestratorError::InvalidTransition,
                other => other.into(),
            })
    }

    /// `Retry`: manual retry of a terminally `FAILED` job.
    pub async fn retry(&self, job_id: &str) -> Result<(), OrchestratorError> {
        self.jobs.retry(job_id).await.map_err(|e| match e {
                ehr_infra_db::DbError::InvalidJobTransition => OrchestratorError::InvalidTransition,
                other => other.into(),
            })
    }

    /// `Schedule`: registers a recurring job descriptor. The
    /// first tick time is computed immediately from `cron_spec` so the
    /// ticker has something to compare against right away.
    pub async fn schedule(
        &self,
        connection_id: String,
        cron_spec: String,
        job_template: ehr_infra_db::JobTemplate,
    ) -> Result<ehr_infra_db::SyncSchedule, OrchestratorError> {
        let next_tick_at = crate::cron_spec::next_tick_after(&cron_spec, Utc::now());
        let schedule = ehr_infra_db::SyncSchedule {
            schedule_id: Uuid::new_v4().to_string(),
            connection_id,
            cron_spec,
            job_template,
            next_tick_at,
        };
        self.schedules.create(&schedule).await?;
        Ok(schedule)
    }

    pub async fn status(&self, job_id: &str) -> Result<SyncJob, OrchestratorError> {
        self.jobs.find_by_id(job_id).await.map_err(|e| match e {
                ehr_infra_db::DbError::JobNotFound => OrchestratorError::JobNotFound,
                other => other.into(),
            })
    }

    pub async fn history(&self, connection_id: &str, limit: u32, offset: u32) -> Result<Vec<SyncJob>, OrchestratorError> {
        self.jobs.history(connection_id, limit, offset).await.map_err(Into::into)
    }

    pub async fn stats(&self, connection_id: &str, window: ChronoDuration) -> Result<Vec<(JobStatus, u64)>, OrchestratorError> {
        self.jobs.stats(connection_id, window).await.map_err(Into::into)
    }
}



