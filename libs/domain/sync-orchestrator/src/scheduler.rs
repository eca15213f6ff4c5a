// [libs/domain/sync-orchestrator/src/scheduler.rs]
//! The recurring-schedule ticker. A single
//! leader holds `leader_leases` and creates fresh jobs from due
//! `SyncSchedule` templates; every other replica sits idle so a tick is
//! never fired twice.

use std::sync::Arc;

use chrono::Utc;
use ehr_infra_db::{JobRepository, ScheduleRepository};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::OrchestratorConfig;
use crate::cron_spec::next_tick_after;

const LEASE_NAME: &str = "schedule-ticker";

pub struct ScheduleTicker {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ScheduleTicker {
    pub fn spawn(jobs: Arc<JobRepository>, schedules: Arc<ScheduleRepository>, config: OrchestratorConfig) -> Self {
        let (stop, mut stop_rx) = watch::channel(false);
        let holder_id = Uuid::new_v4().to_string();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.schedule_tick_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = tick_once(&jobs, &schedules, &holder_id, &config).await {
                            error!(error = %err, "schedule tick failed");
                        }
                    }
                    _ = stop_rx.changed() => {
                        if *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        Self { stop, handle }
    }

    pub async fn stop(self) {
        let _ = self.stop.send(true);
        let _ = self.handle.await;
    }
}

async fn tick_once(
    jobs: &Arc<JobRepository>,
    schedules: &Arc<ScheduleRepository>,
    holder_id: &str,
    config: &OrchestratorConfig,
) -> Result<(), ehr_infra_db::DbError> {
    let acquired = schedules
        .acquire_lease(LEASE_NAME, holder_id, chrono::Duration::from_std(config.schedule_lease_ttl).unwrap())
        .await?;
    if !acquired {
        return Ok(());
    }

    let now = Utc::now();
    let due = schedules.due(now).await?;
    for schedule in due {
        let job = ehr_domain_models::SyncJob {
            job_id: Uuid::new_v4().to_string(),
            job_type: schedule.job_template.job_type.parse().unwrap_or(ehr_domain_models::JobType::Incremental),
            direction: schedule.job_template.direction.parse().unwrap_or(ehr_domain_models::JobDirection::Inbound),
            priority: schedule.job_template.priority,
            status: ehr_domain_models::JobStatus::Pending,
            connection_id: schedule.connection_id.clone(),
            resource_type_filter: schedule.job_template.resource_type_filter.clone(),
            resource_id_filter: None,
            filter: schedule.job_template.filter.clone(),
            options: Default::default(),
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
            created_at: now,
            updated_at: now,
        };
        jobs.enqueue(&job).await?;
        info!(schedule_id = %schedule.schedule_id, job_id = %job.job_id, "schedule fired");

        match next_tick_after(&schedule.cron_spec, now) {
            Some(next) => schedules.reschedule(&schedule.schedule_id, next).await?,
            None => warn!(schedule_id = %schedule.schedule_id, cron_spec = %schedule.cron_spec, "schedule has no future tick, leaving as-is"),
        }
    }

    Ok(())
}
