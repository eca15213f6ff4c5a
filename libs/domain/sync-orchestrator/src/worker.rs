// [libs/domain/sync-orchestrator/src/worker.rs]
//! The claim-execute-complete loop plus
//! the zombie reaper. Each worker is its own `tokio::task`; they share
//! nothing but the repository and the executor table.

use std::collections::HashMap;
use std::sync::Arc;

use ehr_domain_models::{JobStatus, JobType, SyncJob};
use ehr_infra_db::JobRepository;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::cancellation::CancellationToken;
use crate::config::OrchestratorConfig;
use crate::errors::JobExecutionError;
use crate::executor::{JobExecutor, ProgressReporter};

pub struct WorkerPool {
    stop: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
    reaper: JoinHandle<()>,
}

impl WorkerPool {
    pub fn spawn(
        jobs: Arc<JobRepository>,
        executors: Arc<HashMap<JobType, Arc<dyn JobExecutor>>>,
        config: OrchestratorConfig,
    ) -> Self {
        let (stop, stop_rx) = watch::channel(false);

        let handles = (0..config.worker_count)
            .map(|index| {
                let worker_id = format!("worker-{}-{}", index, Uuid::new_v4());
                tokio::spawn(worker_loop(
                        worker_id,
                        Arc::clone(&jobs),
                        Arc::clone(&executors),
                        config.clone(),
                        stop_rx.clone(),
                    ))
            })
            .collect();

        let reaper = tokio::spawn(zombie_reaper_loop(Arc::clone(&jobs), config.zombie_scan_interval, stop_rx));

        Self { stop, handles, reaper }
    }

    /// Stops intake immediately and waits up to `shutdown_grace_period` for
    /// in-flight jobs to observe cancellation and drain.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        let drain = futures_util::future::join_all(self.handles);
        let _ = tokio::time::timeout(std::time::Duration::from_secs(30), drain).await;
        let _ = self.reaper.await;
    }
}

async fn zombie_reaper_loop(jobs: Arc<JobRepository>, interval: std::time::Duration, mut stop_rx: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match jobs.reclaim_zombies().await {
                    Ok(reclaimed) if !reclaimed.is_empty() => {
                        warn!(count = reclaimed.len(), "reclaimed zombie jobs");
                    }
                    Ok(_) => {}
                    Err(err) => error!(error = %err, "zombie scan failed"),
                }
            }
            _ = stop_rx.changed() => {
                if *stop_rx.borrow() {
                    break;
                }
            }
        }
    }
}

async fn worker_loop(
    worker_id: String,
    jobs: Arc<JobRepository>,
    executors: Arc<HashMap<JobType, Arc<dyn JobExecutor>>>,
    config: OrchestratorConfig,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        if *stop_rx.borrow() {
            break;
        }

        let claimed = tokio::select! {
            result = jobs.claim_next(&worker_id) => result,
            _ = stop_rx.changed() => {
                if *stop_rx.borrow() { break; }
                continue;
            }
        };

        let job = match claimed {
            Ok(Some(job)) => job,
            Ok(None) => {
                tokio::select! {
                    _ = tokio::time::sleep(config.poll_interval) => {}
                    _ = stop_rx.changed() => {}
                }
                continue;
            }
            Err(err) => {
                error!(worker_id = %worker_id, error = %err, "claim_next failed");
                tokio::time::sleep(config.poll_interval).await;
                continue;
            }
        };

        run_job(&worker_id, &jobs, &executors, &config, job).await;
    }
}

#[instrument(skip(jobs, executors, config, job), fields(job_id = %job.job_id, job_type = ?job.job_type))]
async fn run_job(
    worker_id: &str,
    jobs: &Arc<JobRepository>,
    executors: &Arc<HashMap<JobType, Arc<dyn JobExecutor>>>,
    config: &OrchestratorConfig,
    job: SyncJob,
) {
    let Some(executor) = executors.get(&job.job_type).cloned() else {
        error!(job_id = %job.job_id, job_type = ?job.job_type, "no executor registered for job type");
        let _ = jobs
            .complete(&job.job_id, JobStatus::Failed, 0, 0, 0, 0, &Default::default())
            .await;
        return;
    };

    let cancellation = CancellationToken::new();
    let progress = ProgressReporter::new(Arc::clone(jobs), job.job_id.clone());

    let heartbeat_handle = spawn_heartbeat(Arc::clone(jobs), job.job_id.clone(), config.heartbeat_interval);

    let outcome = executor.execute(&job, cancellation.clone(), &progress).await;
    heartbeat_handle.abort();

    match outcome {
        Ok(result) => {
            info!(worker_id, processed = result.processed, succeeded = result.succeeded, "job completed");
            let _ = jobs
                .complete(
                    &job.job_id,
                    JobStatus::Completed,
                    result.processed,
                    result.succeeded,
                    result.failed,
                    result.skipped,
                    &result.summary,
                )
                .await;
        }
        Err(JobExecutionError::Cancelled) => {
            info!(worker_id, "job observed cancellation");
            // The row was already flipped to CANCELLED by `Cancel`; nothing
            // further to persist here.
        }
        Err(JobExecutionError::Transient(message)) if job.retry_count < job.options.max_retries => {
            warn!(worker_id, %message, retry_count = job.retry_count, "job failed transiently, will retry");
            let _ = jobs
                .complete(&job.job_id, JobStatus::Failed, 0, 0, 0, 0, &Default::default())
                .await;
            tokio::time::sleep(config.retry_backoff.delay_for_attempt(job.retry_count)).await;
            let _ = jobs.retry(&job.job_id).await;
        }
        Err(other) => {
            warn!(worker_id, error = %other, "job failed terminally");
            let _ = jobs
                .complete(&job.job_id, JobStatus::Failed, 0, 0, 0, 0, &Default::default())
                .await;
        }
    }
}

fn spawn_heartbeat(jobs: Arc<JobRepository>, job_id: String, interval: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately; skip it, claim_next already stamped one
        loop {
            ticker.tick().await;
            if jobs.renew_heartbeat(&job_id).await.is_err() {
                break;
            }
        }
    })
}



