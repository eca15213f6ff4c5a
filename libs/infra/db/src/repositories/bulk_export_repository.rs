// [libs/infra/db/src/repositories/bulk_export_repository.rs]
/*!
 * APARATO: BULK EXPORT MANIFEST REPOSITORY (ESTRATO L3)
 * RESPONSABILIDAD: El manifiesto `$export` resuelto y el progreso de
 * ingesta por archivo NDJSON — la granularidad de reanudación que
 * `fhir_resources.line_offset` por sí sola no cubre.
 */

use crate::errors::DbError;
use crate::mapping::{from_json, to_json};
use chrono::Utc;
use libsql::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Plain-data mirror of a resolved `$export` manifest file entry. Callers
/// (the bulk-export runner) translate the vendor adapter's own manifest
/// type into this shape rather than `ehr-infra-db` depending on the
/// adapter crate directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestFileRecord {
    pub resource_type: String,
    pub url: String,
    pub count: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct BulkExportFile {
    pub job_id: String,
    pub resource_type: String,
    pub file_url: String,
    pub status: BulkExportFileStatus,
    pub line_offset: u64,
    pub resource_count: Option<u64>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkExportFileStatus {
    Pending,
    Downloading,
    Complete,
    Failed,
}

impl BulkExportFileStatus {
    fn as_text(self) -> &'static str {
        match self {
            BulkExportFileStatus::Pending => "PENDING",
            BulkExportFileStatus::Downloading => "DOWNLOADING",
            BulkExportFileStatus::Complete => "COMPLETE",
            BulkExportFileStatus::Failed => "FAILED",
        }
    }

    fn from_text(raw: &str) -> Self {
        match raw {
            "DOWNLOADING" => BulkExportFileStatus::Downloading,
            "COMPLETE" => BulkExportFileStatus::Complete,
            "FAILED" => BulkExportFileStatus::Failed,
            _ => BulkExportFileStatus::Pending,
        }
    }
}

pub struct BulkExportRepository {
    connection: Connection,
}

impl BulkExportRepository {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    /// Records the resolved manifest and seeds one `PENDING` file row per
    /// output entry; re-running a poll for the same job is idempotent
    /// because `(job_id, file_url)` is the primary key.
    #[instrument(skip(self, output, error))]
    pub async fn save_manifest(
        &self,
        job_id: &str,
        transaction_time: Option<&str>,
        output: &[ManifestFileRecord],
        error: &[ManifestFileRecord],
    ) -> Result<(), DbError> {
        self.connection
            .execute(
            r#"INSERT INTO bulk_export_manifests (job_id, transaction_time, output_json, error_json, fetched_at)
                VALUES (?1,?2,?3,?4,?5)
                ON CONFLICT(job_id) DO UPDATE SET
                transaction_time = excluded.transaction_time,
                output_json = excluded.output_json,
                error_json = excluded.error_json,
                fetched_at = excluded.fetched_at"#,
            params![
                job_id,
                transaction_time.map(str::to_string),
                to_json(output)?,
                to_json(error)?,
                Utc::now().to_rfc3339(),
            ],
        )
            .await?;

        for file in output {
            self.connection
                .execute(
                r#"INSERT INTO bulk_export_files (job_id, resource_type, file_url, status, line_offset, resource_count)
                    VALUES (?1,?2,?3,'PENDING',0,?4)
                    ON CONFLICT(job_id, file_url) DO NOTHING"#,
                params![job_id, file.resource_type.clone(), file.url.clone(), file.count.map(|c| c as i64)],
            )
                .await?;
        }
        Ok(())
    }

    pub async fn list_files(&self, job_id: &str) -> Result<Vec<BulkExportFile>, DbError> {
        let mut rows = self
            .connection
            .query("SELECT * FROM bulk_export_files WHERE job_id = ?1", params![job_id])
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_file(&row)?);
        }
        Ok(out)
    }

    pub async fn advance_file(&self, job_id: &str, file_url: &str, line_offset: u64) -> Result<(), DbError> {
        self.connection
            .execute(
            "UPDATE bulk_export_files SET status = ?1, line_offset = ?2 WHERE job_id = ?3 AND file_url = ?4",
            params![BulkExportFileStatus::Downloading.as_text(), line_offset as i64, job_id, file_url],
        )
            .await?;
        Ok(())
    }

    pub async fn complete_file(&self, job_id: &str, file_url: &str) -> Result<(), DbError> {
        self.connection
            .execute(
            "UPDATE bulk_export_files SET status = ?1 WHERE job_id = ?2 AND file_url = ?3",
            params![BulkExportFileStatus::Complete.as_text(), job_id, file_url],
        )
            .await?;
        Ok(())
    }

    pub async fn fail_file(&self, job_id: &str, file_url: &str, error_message: &str) -> Result<(), DbError> {
        self.connection
            .execute(
            "UPDATE bulk_export_files SET status = ?1, error_message = ?2 WHERE job_id = ?3 AND file_url = ?4",
            params![BulkExportFileStatus::Failed.as_text(), error_message, job_id, file_url],
        )
            .await?;
        Ok(())
    }
}

fn row_to_file(row: &Row) -> Result<BulkExportFile, DbError> {
    let status: String = row.get(3)?;
    Ok(BulkExportFile {
            job_id: row.get(0)?,
            resource_type: row.get(1)?,
            file_url: row.get(2)?,
            status: BulkExportFileStatus::from_text(&status),
            line_offset: row.get::<i64>(4)? as u64,
            resource_count: row.get::<Option<i64>>(5)?.map(|c| c as u64),
            error_message: row.get(6)?,
        })
}

/// Helper for deserializing a manifest previously saved whole — the
/// ingest runner reads this back out via `bulk_export_manifests.output_json`
/// rather than re-polling the vendor.
pub fn parse_output_files(output_json: &str) -> Result<Vec<ManifestFileRecord>, DbError> {
    from_json(output_json)
}



