// [libs/domain/bulk-export/src/executor.rs]
//! Registers the bulk export runner as a `JobExecutor` for `JobType::BulkExport`
//! so the sync orchestrator's worker pool drives `PollExport`/`IngestExport`
//! to completion without knowing anything about FHIR.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use ehr_domain_models::SyncJob;
use ehr_domain_sync_orchestrator::{BoxFuture, CancellationToken, JobExecutionError, JobExecutor, JobProgress, ProgressReporter};
use ehr_domain_vendor_adapters::PollOutcome;
use ehr_infra_db::ConnectionRepository;
use tracing::{info, instrument, warn};

use crate::backoff::PollBackoff;
use crate::runner::{default_max_duration, BulkExportRunner};

pub struct BulkExportExecutor {
    runner: Arc<BulkExportRunner>,
    connections: Arc<ConnectionRepository>,
}

impl BulkExportExecutor {
    pub fn new(runner: Arc<BulkExportRunner>, connections: Arc<ConnectionRepository>) -> Self {
        Self { runner, connections }
    }
}

impl JobExecutor for BulkExportExecutor {
    fn execute<'a>(&'a self, job: &'a SyncJob, cancellation: CancellationToken, progress: &'a ProgressReporter) -> BoxFuture<'a, Result<JobProgress, JobExecutionError>> {
        Box::pin(self.run(job, cancellation, progress))
    }
}

impl BulkExportExecutor {
    #[instrument(skip(self, job, cancellation, progress))]
    async fn run(&self, job: &SyncJob, cancellation: CancellationToken, progress: &ProgressReporter) -> Result<JobProgress, JobExecutionError> {
        let connection = self
            .connections
            .find_by_id(&job.connection_id)
            .await
            .map_err(|e| JobExecutionError::Permanent(e.to_string()))?;
        let status_url = job.status_url.clone().ok_or_else(|| JobExecutionError::Permanent("bulk export job missing status_url".into()))?;

        let deadline = job.created_at + default_max_duration();
        let mut backoff = PollBackoff::default();

        let manifest = loop {
            if cancellation.is_cancelled() {
                return Err(JobExecutionError::Cancelled);
            }
            if chrono::Utc::now() > deadline {
                return Err(JobExecutionError::Permanent("JOB_TIMEOUT: bulk export poll exceeded maximum duration".into()));
            }

            match self.runner.poll_once(&connection, &status_url).await {
                Ok(PollOutcome::Complete(manifest)) => break manifest,
                Ok(PollOutcome::InProgress { progress: hint, retry_after }) => {
                    if let Some(hint) = hint {
                        info!(job_id = %job.job_id, hint, "bulk export in progress");
                    }
                    let delay = backoff.next_delay(retry_after);
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancellation.cancelled() => return Err(JobExecutionError::Cancelled),
                    }
                }
                Err(error) if error.is_transient() => {
                    warn!(job_id = %job.job_id, %error, "transient poll failure, backing off");
                    tokio::time::sleep(StdDuration::from_secs(5)).await;
                }
                Err(error) => return Err(JobExecutionError::Permanent(error.to_string())),
            }
        };

        let summary = self
            .runner
            .ingest_export(&connection, job, &manifest, &cancellation)
            .await
            .map_err(|e| JobExecutionError::Permanent(e.to_string()))?;

        progress.report(&summary.progress).await.map_err(|e| JobExecutionError::Transient(e.to_string()))?;

        if summary.files_failed > 0 && summary.files_processed == 0 {
            return Err(JobExecutionError::Permanent(format!("all {} bulk export files failed", summary.files_failed)));
        }
        Ok(summary.progress)
    }
}



