// [libs/domain/fhir-sync/src/executor.rs]
//! Registers as a `JobExecutor` for `FULL`/`INCREMENTAL`/`PATIENT`/`RESOURCE`/
//! `WEBHOOK` jobs: fetches one patient, one resource
//! list, or searches a vendor's full supported resource-type set, then runs
//! every record through the transformation & conflict engine before
//! persisting it. `BULK_EXPORT` is not handled here — see
//! `ehr-domain-bulk-export`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use ehr_domain_models::{Connection, DownloadState, FhirResource, JobType, SyncJob, Vendor};
use ehr_domain_sync_orchestrator::{BoxFuture, CancellationToken, JobExecutionError, JobExecutor, JobProgress, ProgressReporter};
use ehr_domain_transform::{ConflictPolicy, TransformOutcome, TransformationEngine};
use ehr_domain_vendor_adapters::VendorFhirAdapter;
use ehr_infra_db::{repositories::resource_repository, ConnectionRepository, ResourceRepository};
use futures_util::StreamExt;
use serde_json::Value;
use tracing::{instrument, warn};

use crate::errors::FhirSyncError;

pub struct FhirSyncExecutor {
    adapters: Arc<HashMap<Vendor, Box<dyn VendorFhirAdapter>>>,
    connections: Arc<ConnectionRepository>,
    resources: Arc<ResourceRepository>,
    transform: Arc<TransformationEngine>,
    required_fields_by_type: HashMap<String, Vec<String>>,
    remote_authoritative_fields: std::collections::HashSet<String>,
}

impl FhirSyncExecutor {
    pub fn new(
        adapters: Arc<HashMap<Vendor, Box<dyn VendorFhirAdapter>>>,
        connections: Arc<ConnectionRepository>,
        resources: Arc<ResourceRepository>,
        transform: Arc<TransformationEngine>,
    ) -> Self {
        Self {
            adapters,
            connections,
            resources,
            transform,
            required_fields_by_type: HashMap::new(),
            remote_authoritative_fields: std::collections::HashSet::new(),
        }
    }

    pub fn with_required_fields(mut self, resource_type: impl Into<String>, fields: Vec<String>) -> Self {
        self.required_fields_by_type.insert(resource_type.into(), fields);
        self
    }
}

impl JobExecutor for FhirSyncExecutor {
    fn execute<'a>(&'a self, job: &'a SyncJob, cancellation: CancellationToken, progress: &'a ProgressReporter) -> BoxFuture<'a, Result<JobProgress, JobExecutionError>> {
        Box::pin(self.run(job, cancellation, progress))
    }
}

impl FhirSyncExecutor {
    #[instrument(skip(self, job, cancellation, progress))]
    async fn run(&self, job: &SyncJob, cancellation: CancellationToken, progress: &ProgressReporter) -> Result<JobProgress, JobExecutionError> {
        let connection = self
            .connections
            .find_by_id(&job.connection_id)
            .await
            .map_err(|e| JobExecutionError::Permanent(e.to_string()))?;
        let adapter = self
            .adapters
            .get(&connection.vendor)
            .ok_or(FhirSyncError::UnknownVendor)
            .map_err(|e| JobExecutionError::Permanent(e.to_string()))?
            .as_ref();

        let mut state = JobProgress::default();

        let outcome = match job.job_type {
            JobType::Patient => self.sync_patient(adapter, &connection, job, &cancellation, &mut state).await,
            JobType::Resource => self.sync_resource_ids(adapter, &connection, job, &cancellation, &mut state).await,
            JobType::Full | JobType::Incremental | JobType::Webhook => {
                self.sync_resource_types(adapter, &connection, job, &cancellation, &mut state).await
            }
            JobType::BulkExport => Err(FhirSyncError::UnsupportedJobType),
        };

        progress.report(&state).await.map_err(|e| JobExecutionError::Transient(e.to_string()))?;

        if cancellation.is_cancelled() {
            return Err(JobExecutionError::Cancelled);
        }

        match outcome {
            Ok(()) => Ok(state),
            Err(error) if error.is_transient() => Err(JobExecutionError::Transient(error.to_string())),
            Err(error) => Err(JobExecutionError::Permanent(error.to_string())),
        }
    }

    async fn sync_patient(
        &self,
        adapter: &dyn VendorFhirAdapter,
        connection: &Connection,
        job: &SyncJob,
        cancellation: &CancellationToken,
        progress: &mut JobProgress,
    ) -> Result<(), FhirSyncError> {
        let patient_id = job
            .resource_id_filter
            .as_ref()
            .and_then(|ids| ids.first())
            .cloned()
            .or_else(|| connection.vendor_patient_id.clone())
            .ok_or(FhirSyncError::MissingResourceIdFilter)?;

        if cancellation.is_cancelled() {
            return Ok(());
        }

        let raw = adapter.fetch_patient(connection, &patient_id).await?;
        let policy = self.conflict_policy(job);
        self.process_resource(connection, "Patient", &raw, job, &policy, progress).await
    }

    async fn sync_resource_ids(
        &self,
        adapter: &dyn VendorFhirAdapter,
        connection: &Connection,
        job: &SyncJob,
        cancellation: &CancellationToken,
        progress: &mut JobProgress,
    ) -> Result<(), FhirSyncError> {
        let resource_type = job.resource_type_filter.clone().ok_or(FhirSyncError::MissingResourceTypeFilter)?;
        let ids = job.resource_id_filter.clone().ok_or(FhirSyncError::MissingResourceIdFilter)?;
        let mut params = HashMap::new();
        params.insert("_id".to_string(), ids.join(","));

        let policy = self.conflict_policy(job);
        let mut stream = adapter.search(connection, &resource_type, &params).await?;
        while let Some(item) = stream.next().await {
            if cancellation.is_cancelled() {
                return Ok(());
            }
            let raw = item?;
            self.process_resource(connection, &resource_type, &raw, job, &policy, progress).await?;
        }
        Ok(())
    }

    async fn sync_resource_types(
        &self,
        adapter: &dyn VendorFhirAdapter,
        connection: &Connection,
        job: &SyncJob,
        cancellation: &CancellationToken,
        progress: &mut JobProgress,
    ) -> Result<(), FhirSyncError> {
        let resource_types: Vec<String> = match &job.resource_type_filter {
            Some(filter) => filter.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect(),
            None => adapter.profile().supported_resource_types().into_iter().map(String::from).collect(),
        };

        let since = if job.job_type == JobType::Full { None } else { connection.last_sync_at };
        let policy = self.conflict_policy(job);

        for resource_type in resource_types {
            if cancellation.is_cancelled() {
                return Ok(());
            }

            let mut params = HashMap::new();
            if let Some(since) = since {
                params.insert("_lastUpdated".to_string(), format!("gt{}", since.to_rfc3339()));
            }

            let mut stream = match adapter.search(connection, &resource_type, &params).await {
                Ok(stream) => stream,
                Err(error) if error.is_transient() => return Err(error.into()),
                Err(error) => {
                    warn!(resource_type, %error, "resource type search rejected, skipping");
                    continue;
                }
            };

            while let Some(item) = stream.next().await {
                if cancellation.is_cancelled() {
                    return Ok(());
                }
                let raw = item?;
                self.process_resource(connection, &resource_type, &raw, job, &policy, progress).await?;
            }
        }
        Ok(())
    }

    fn conflict_policy(&self, job: &SyncJob) -> ConflictPolicy {
        ConflictPolicy {
            remote_authoritative_fields: self.remote_authoritative_fields.clone(),
            auto_resolve: job.options.resolve_conflicts,
            ..Default::default()
        }
    }

    async fn process_resource(
        &self,
        connection: &Connection,
        resource_type: &str,
        raw: &Value,
        job: &SyncJob,
        policy: &ConflictPolicy,
        progress: &mut JobProgress,
    ) -> Result<(), FhirSyncError> {
        let vendor_resource_id = raw.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
        if vendor_resource_id.is_empty() {
            warn!(resource_type, "resource carries no id, skipping");
            progress.skipped += 1;
            progress.processed += 1;
            return Ok(());
        }

        let required_fields: Vec<&str> = self.required_fields_by_type.get(resource_type).map(|v| v.iter().map(String::as_str).collect()).unwrap_or_default();
        let existing = self.resources.find_by_identity(&connection.connection_id, &vendor_resource_id, resource_type).await?;
        let local_payload = existing.as_ref().and_then(|r| serde_json::from_slice::<Value>(&r.raw_payload).ok());

        let outcome = self
            .transform
            .transform_inbound(
            connection.vendor,
            resource_type,
            &vendor_resource_id,
            raw,
            local_payload.as_ref(),
            &required_fields,
            job.options.validate_output,
            false,
            policy,
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
                    status: resource.get("status").and_then(Value::as_str).map(str::to_string),
                    content_type: Some("application/fhir+json".to_string()),
                    content_url: None,
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
        Ok(())
    }
}



