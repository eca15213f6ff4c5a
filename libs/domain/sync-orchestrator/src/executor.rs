// [libs/domain/sync-orchestrator/src/executor.rs]
//! The seam between the queue and the work itself. `ehr-domain-sync-orchestrator`
//! knows nothing about FHIR, vendors, or transformation rules — it drives
//! whatever `JobExecutor` the host application wires in, keyed by job type.
//! This mirrors
//! the boxed-future trait-object pattern `VendorFhirAdapter` uses, since the
//! worker pool needs to hold one executor behind `Arc<dyn JobExecutor>`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use ehr_domain_models::{JobSummary, SyncJob};
use ehr_infra_db::JobRepository;

use crate::cancellation::CancellationToken;
use crate::errors::JobExecutionError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Incremental progress a long-running job reports back through so the
/// worker can persist partial counts without waiting for completion.
#[derive(Debug, Clone, Default)]
pub struct JobProgress {
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
    pub summary: JobSummary,
}

/// Handed to an executor so it can flush `JobProgress` mid-run without
/// holding a reference back into the worker pool itself.
#[derive(Clone)]
pub struct ProgressReporter {
    jobs: Arc<JobRepository>,
    job_id: String,
}

impl ProgressReporter {
    pub fn new(jobs: Arc<JobRepository>, job_id: String) -> Self {
        Self { jobs, job_id }
    }

    pub async fn report(&self, progress: &JobProgress) -> Result<(), ehr_infra_db::DbError> {
        self.jobs
            .update_progress(
            &self.job_id,
            progress.processed,
            progress.succeeded,
            progress.failed,
            progress.skipped,
            &progress.summary,
        )
            .await
    }
}

/// Callers implement this per job type (full sync, incremental, bulk
/// export...) and register it with the orchestrator; the worker pool calls
/// it for every claimed job, passing a `CancellationToken` it must observe
/// between resources (never mid-request).
pub trait JobExecutor: Send + Sync {
    fn execute<'a>(
        &'a self,
        job: &'a SyncJob,
        cancellation: CancellationToken,
        progress: &'a ProgressReporter,
    ) -> BoxFuture<'a, Result<JobProgress, JobExecutionError>>;
}



