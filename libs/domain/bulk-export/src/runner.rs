// [libs/domain/bulk-export/src/runner.rs]
/*!
 * APARATO: BULK EXPORT RUNNER (ESTRATO L2)
 * RESPONSABILIDAD: Kickoff, poll y descarga/ingesta de `$export` por
 * vendor, con reanudación por archivo.
 */

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ehr_domain_models::{Connection, DownloadState, FhirResource, JobDirection, JobOptions, JobSummary, JobType, SyncJob, Vendor};
use ehr_domain_sync_orchestrator::{CancellationToken, JobProgress};
use ehr_domain_transform::{ConflictPolicy, TransformOutcome, TransformationEngine};
use ehr_domain_vendor_adapters::{BulkExportManifest, BulkExportScope, PollOutcome, VendorFhirAdapter};
use ehr_infra_db::{repositories::resource_repository, BulkExportFileStatus, BulkExportRepository, ConnectionRepository, JobRepository, ManifestFileRecord, ResourceRepository};
use futures_util::StreamExt;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::backoff::PollBackoff;
use crate::errors::BulkExportError;

/// Defaults for a newly enqueued bulk export job.
const DEFAULT_BATCH_SIZE: u32 = 100;
const DEFAULT_MAX_DURATION_SECS: i64 = 2 * 60 * 60;

pub struct BulkExportRunner {
    adapters: Arc<HashMap<Vendor, Box<dyn VendorFhirAdapter>>>,
    connections: Arc<ConnectionRepository>,
    jobs: Arc<JobRepository>,
    bulk: Arc<BulkExportRepository>,
    resources: Arc<ResourceRepository>,
    transform: Arc<TransformationEngine>,
    required_fields_by_type: HashMap<String, Vec<String>>,
    remote_authoritative_fields: HashSet<String>,
}

pub struct IngestSummary {
    pub files_processed: u64,
    pub files_failed: u64,
    pub progress: JobProgress,
}

impl BulkExportRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        adapters: Arc<HashMap<Vendor, Box<dyn VendorFhirAdapter>>>,
        connections: Arc<ConnectionRepository>,
        jobs: Arc<JobRepository>,
        bulk: Arc<BulkExportRepository>,
        resources: Arc<ResourceRepository>,
        transform: Arc<TransformationEngine>,
    ) -> Self {
        Self {
            adapters,
            connections,
            jobs,
            bulk,
            resources,
            transform,
            required_fields_by_type: HashMap::new(),
            remote_authoritative_fields: HashSet::new(),
        }
    }

    pub fn with_required_fields(mut self, resource_type: impl Into<String>, fields: Vec<String>) -> Self {
        self.required_fields_by_type.insert(resource_type.into(), fields);
        self
    }

    /// `StartExport`: issues the kickoff request and enqueues the `SyncJob`
    /// that the worker pool drives to completion.
    #[instrument(skip(self))]
    pub async fn start_export(
        &self,
        connection_id: &str,
        scope: BulkExportScope,
        resource_types: Option<Vec<String>>,
        since: Option<DateTime<Utc>>,
    ) -> Result<SyncJob, BulkExportError> {
        let connection = self.connections.find_by_id(connection_id).await?;
        let adapter = self.adapters.get(&connection.vendor).ok_or(BulkExportError::UnknownVendor)?;

        let status_url = adapter.start_bulk_export(&connection, scope, resource_types.as_deref(), since).await?;

        let now = Utc::now();
        let job = SyncJob {
            job_id: Uuid::new_v4().to_string(),
            job_type: JobType::BulkExport,
            direction: JobDirection::Inbound,
            priority: 3,
            status: ehr_domain_models::JobStatus::Pending,
            connection_id: connection.connection_id.clone(),
            resource_type_filter: resource_types.map(|types| types.join(",")),
            resource_id_filter: None,
            filter: HashMap::new(),
            options: JobOptions { timeout_ms: (DEFAULT_MAX_DURATION_SECS * 1000) as u64, batch_size: DEFAULT_BATCH_SIZE, ..JobOptions::default() },
            started_at: None,
            ended_at: None,
            processed_count: 0,
            succeeded_count: 0,
            failed_count: 0,
            skipped_count: 0,
            summary: JobSummary::default(),
            retry_count: 0,
            status_url: Some(status_url.clone()),
            worker_id: None,
            heartbeat_at: None,
            created_at: now,
            updated_at: now,
        };
        self.jobs.enqueue(&job).await?;
        self.jobs.set_status_url(&job.job_id, &status_url).await?;
        info!(job_id = %job.job_id, connection_id, "bulk export started");
        Ok(job)
    }

    /// `PollExport`: one status check. Callers loop this themselves (the
    /// `JobExecutor` in `executor.rs` does) so cancellation can be observed
    /// between polls.
    pub async fn poll_once(&self, connection: &Connection, status_url: &str) -> Result<PollOutcome, BulkExportError> {
        let adapter = self.adapters.get(&connection.vendor).ok_or(BulkExportError::UnknownVendor)?;
        Ok(adapter.poll_bulk_export(connection, status_url).await?)
    }

    /// `IngestExport`: downloads and transforms every manifest file not
    /// already `COMPLETE`, resuming each from its stored line offset.
    /// A file failure is isolated — it does not abort
    /// ingestion of the remaining files.
    #[instrument(skip(self, manifest, cancellation))]
    pub async fn ingest_export(
        &self,
        connection: &Connection,
        job: &SyncJob,
        manifest: &BulkExportManifest,
        cancellation: &CancellationToken,
    ) -> Result<IngestSummary, BulkExportError> {
        let output: Vec<ManifestFileRecord> =
        manifest.output.iter().map(|f| ManifestFileRecord { resource_type: f.resource_type.clone(), url: f.url.clone(), count: f.count }).collect();
        let error: Vec<ManifestFileRecord> =
        manifest.error.iter().map(|f| ManifestFileRecord { resource_type: f.resource_type.clone(), url: f.url.clone(), count: f.count }).collect();
        self.bulk.save_manifest(&job.job_id, manifest.transaction_time.as_deref(), &output, &error).await?;

        let adapter = self.adapters.get(&connection.vendor).ok_or(BulkExportError::UnknownVendor)?;
        let mut progress = JobProgress::default();
        let mut files_processed = 0u64;
        let mut files_failed = 0u64;

        for file in self.bulk.list_files(&job.job_id).await? {
            if cancellation.is_cancelled() {
                break;
            }
            if file.status == BulkExportFileStatus::Complete {
                files_processed += 1;
                continue;
            }

            match self.ingest_file(adapter.as_ref(), connection, job, &file.resource_type, &file.file_url, file.line_offset, &mut progress, cancellation).await {
                Ok(()) => {
                    self.bulk.complete_file(&job.job_id, &file.file_url).await?;
                    files_processed += 1;
                }
                Err(error) => {
                    warn!(job_id = %job.job_id, file_url = %file.file_url, %error, "bulk export file failed");
                    self.bulk.fail_file(&job.job_id, &file.file_url, &error.to_string()).await?;
                    files_failed += 1;
                }
            }
        }

        Ok(IngestSummary { files_processed, files_failed, progress })
    }

    /// Reads the NDJSON stream in chunks of `job.options.batch_size`
    /// (spec.md §4.4: "resources are batched ... and passed to the
    /// transformation engine, then persisted"): each chunk is parsed in
    /// full before any record in it is transformed or written, and the
    /// resumable line offset only advances once the whole chunk has been
    /// persisted, so a crash mid-batch simply re-processes that batch
    /// (idempotent — `resources.upsert` keys on `(connection, vendor
    /// resource id, resource type)`) rather than losing it.
    #[allow(clippy::too_many_arguments)]
    async fn ingest_file(
        &self,
        adapter: &dyn VendorFhirAdapter,
        connection: &Connection,
        job: &SyncJob,
        resource_type: &str,
        file_url: &str,
        resume_from_line: u64,
        progress: &mut JobProgress,
        cancellation: &CancellationToken,
    ) -> Result<(), BulkExportError> {
        let mut lines = adapter.download_bulk_file(connection, file_url).await?;
        let mut line_number = 0u64;
        let batch_size = job.options.batch_size.max(1) as usize;
        let mut batch: Vec<(u64, String)> = Vec::with_capacity(batch_size);

        while let Some(line) = lines.next().await {
            if cancellation.is_cancelled() {
                return Ok(());
            }
            let line_text = line?;
            line_number += 1;
            if line_number <= resume_from_line {
                continue;
            }

            batch.push((line_number, line_text));
            if batch.len() >= batch_size {
                self.process_batch(connection, job, resource_type, file_url, std::mem::take(&mut batch), progress).await?;
            }
        }

        if !batch.is_empty() {
            self.process_batch(connection, job, resource_type, file_url, batch, progress).await?;
        }
        Ok(())
    }

    /// Transforms and persists one batch of NDJSON lines, then advances
    /// the file's resumable line offset a single time to the batch's last
    /// line.
    #[allow(clippy::too_many_arguments)]
    async fn process_batch(
        &self,
        connection: &Connection,
        job: &SyncJob,
        resource_type: &str,
        file_url: &str,
        batch: Vec<(u64, String)>,
        progress: &mut JobProgress,
    ) -> Result<(), BulkExportError> {
        let required_fields: Vec<&str> = self.required_fields_by_type.get(resource_type).map(|v| v.iter().map(String::as_str).collect()).unwrap_or_default();
        let policy = ConflictPolicy { remote_authoritative_fields: self.remote_authoritative_fields.clone(), auto_resolve: job.options.resolve_conflicts, ..Default::default() };

        let Some(&(last_line, _)) = batch.last() else { return Ok(()) };

        for (line_number, line_text) in &batch {
            let raw: serde_json::Value = match serde_json::from_str(line_text) {
                Ok(value) => value,
                Err(error) => {
                    warn!(resource_type, line_number, %error, "malformed NDJSON line, skipping");
                    progress.skipped += 1;
                    progress.processed += 1;
                    continue;
                }
            };
            let vendor_resource_id = raw.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string();

            let existing = self.resources.find_by_identity(&connection.connection_id, &vendor_resource_id, resource_type).await?;
            let local_payload = existing.as_ref().and_then(|r| serde_json::from_slice::<serde_json::Value>(&r.raw_payload).ok());

            let outcome = self
                .transform
                .transform_inbound(
                connection.vendor,
                resource_type,
                &vendor_resource_id,
                &raw,
                local_payload.as_ref(),
                &required_fields,
                job.options.validate_output,
                false,
                &policy,
            )
                .await?;

            match outcome {
                TransformOutcome::Skipped { reason } => {
                    warn!(resource_type, vendor_resource_id, reason, "record skipped by validation");
                    progress.skipped += 1;
                }
                TransformOutcome::Write { resource, .. } => {
                    let local_id = existing.as_ref().map(|r| r.local_id.clone()).unwrap_or_else(resource_repository::new_local_id);
                    let record = FhirResource {
                        local_id,
                        connection_id: connection.connection_id.clone(),
                        resource_type: resource_type.to_string(),
                        vendor_resource_id,
                        raw_payload: serde_json::to_vec(&resource).unwrap_or_default(),
                        title: None,
                        resource_date: None,
                        category: None,
                        status: resource.get("status").and_then(|v| v.as_str()).map(str::to_string),
                        content_type: Some("application/fhir+json".to_string()),
                        content_url: Some(file_url.to_string()),
                        download_state: DownloadState::Downloaded,
                        local_file_path: None,
                        processed: true,
                        last_update_observed: Utc::now(),
                    };
                    let is_update = existing.is_some();
                    self.resources.upsert(&record).await?;
                    if is_update {
                        progress.summary.updated += 1;
                    } else {
                        progress.summary.created += 1;
                    }
                    progress.succeeded += 1;
                }
            }
            progress.processed += 1;
            progress.summary.bytes += line_text.len() as u64;
        }

        self.bulk.advance_file(&job.job_id, file_url, last_line).await?;
        Ok(())
    }
}

pub fn default_max_duration() -> chrono::Duration {
    chrono::Duration::seconds(DEFAULT_MAX_DURATION_SECS)
}

pub fn default_poll_backoff() -> PollBackoff {
    PollBackoff::default()
}



