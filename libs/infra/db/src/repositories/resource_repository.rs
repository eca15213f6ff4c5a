// [libs/infra/db/src/repositories/resource_repository.rs]
/*!
 * APARATO: FHIR RESOURCE REPOSITORY (ESTRATO L3)
 * RESPONSABILIDAD: Persistencia local de recursos FHIR capturados del
 * vendor, con upsert idempotente por clave de identidad.
 */

use crate::errors::DbError;
use crate::mapping::{enum_to_text, parse_opt_rfc3339, parse_rfc3339, text_to_enum};
use ehr_domain_models::{DownloadState, FhirResource, Vendor};
use libsql::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

pub struct ResourceRepository {
    connection: Connection,
}

impl ResourceRepository {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    /// Upserts on `(connection_id, vendor_resource_id, resource_type)` so a
    /// resource re-synced after an interruption updates in place instead of
    /// duplicating.
    #[instrument(skip(self, resource))]
    pub async fn upsert(&self, resource: &FhirResource) -> Result<(), DbError> {
        self.connection
            .execute(
            r#"INSERT INTO fhir_resources (
                local_id, connection_id, resource_type, vendor_resource_id, raw_payload,
                title, resource_date, category, resource_status, content_type, source_url,
                download_state, local_file_path, line_offset, processed, last_update_observed
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,0,?14,?15)
                ON CONFLICT(connection_id, vendor_resource_id, resource_type) DO UPDATE SET
                raw_payload = excluded.raw_payload,
                title = excluded.title,
                resource_date = excluded.resource_date,
                category = excluded.category,
                resource_status = excluded.resource_status,
                content_type = excluded.content_type,
                source_url = excluded.source_url,
                download_state = excluded.download_state,
                local_file_path = excluded.local_file_path,
                processed = excluded.processed,
                last_update_observed = excluded.last_update_observed"#,
            params![
                resource.local_id.clone(),
                resource.connection_id.clone(),
                resource.resource_type.clone(),
                resource.vendor_resource_id.clone(),
                resource.raw_payload.clone(),
                resource.title.clone(),
                resource.resource_date.map(|d| d.to_rfc3339()),
                resource.category.clone(),
                resource.status.clone(),
                resource.content_type.clone(),
                resource.content_url.clone(),
                enum_to_text(&resource.download_state)?,
                resource.local_file_path.clone(),
                resource.processed as i64,
                resource.last_update_observed.to_rfc3339(),
            ],
        )
            .await?;
        Ok(())
    }

    pub async fn find_by_identity(
        &self,
        connection_id: &str,
        vendor_resource_id: &str,
        resource_type: &str,
    ) -> Result<Option<FhirResource>, DbError> {
        let mut rows = self
            .connection
            .query(
            "SELECT * FROM fhir_resources WHERE connection_id = ?1 AND vendor_resource_id = ?2 AND resource_type = ?3",
            params![connection_id, vendor_resource_id, resource_type],
        )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_resource(&row)?)),
            None => Ok(None),
        }
    }

    /// Resolves the owning `connection_id` for a vendor-side resource
    /// already captured locally, scoped to `vendor` so a resource id that
    /// happens to collide across vendors can't cross-resolve. Used by the
    /// webhook dispatcher, which only receives `(vendor, resourceType,
    /// resourceId)` and has no connection id of its own to key on.
    #[instrument(skip(self))]
    pub async fn find_connection_id_by_vendor_resource(
        &self,
        vendor: Vendor,
        resource_type: &str,
        vendor_resource_id: &str,
    ) -> Result<Option<String>, DbError> {
        let mut rows = self
            .connection
            .query(
            r#"SELECT fhir_resources.connection_id FROM fhir_resources
                JOIN connections ON connections.connection_id = fhir_resources.connection_id
                WHERE connections.vendor = ?1
                AND fhir_resources.resource_type = ?2
                AND fhir_resources.vendor_resource_id = ?3"#,
            params![vendor.to_string(), resource_type, vendor_resource_id],
        )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    pub async fn mark_processed(&self, local_id: &str) -> Result<(), DbError> {
        self.connection
            .execute("UPDATE fhir_resources SET processed = 1 WHERE local_id = ?1", params![local_id])
            .await?;
        Ok(())
    }

    /// Advances the resumable line offset used when a bulk NDJSON download
    /// is interrupted mid-file.
    pub async fn advance_line_offset(&self, local_id: &str, line_offset: u64) -> Result<(), DbError> {
        self.connection
            .execute(
            "UPDATE fhir_resources SET line_offset = ?1 WHERE local_id = ?2",
            params![line_offset as i64, local_id],
        )
            .await?;
        Ok(())
    }

    pub async fn list_unprocessed(&self, connection_id: &str, resource_type: &str, limit: u32) -> Result<Vec<FhirResource>, DbError> {
        let mut rows = self
            .connection
            .query(
            "SELECT * FROM fhir_resources WHERE connection_id = ?1 AND resource_type = ?2 AND processed = 0 ORDER BY created_at ASC LIMIT ?3",
            params![connection_id, resource_type, limit as i64],
        )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_resource(&row)?);
        }
        Ok(out)
    }
}

pub fn new_local_id() -> String {
    Uuid::new_v4().to_string()
}

fn row_to_resource(row: &Row) -> Result<FhirResource, DbError> {
    let resource_date: Option<String> = row.get(6)?;
    let download_state: String = row.get(11)?;
    let last_update_observed: String = row.get(15)?;

    Ok(FhirResource {
            local_id: row.get(0)?,
            connection_id: row.get(1)?,
            resource_type: row.get(2)?,
            vendor_resource_id: row.get(3)?,
            raw_payload: row.get(4)?,
            title: row.get(5)?,
            resource_date: parse_opt_rfc3339(resource_date)?,
            category: row.get(7)?,
            status: row.get(8)?,
            content_type: row.get(9)?,
            content_url: row.get(10)?,
            download_state: text_to_enum::<DownloadState>(&download_state)?,
            local_file_path: row.get(12)?,
            processed: row.get::<i64>(14)? != 0,
            last_update_observed: parse_rfc3339(&last_update_observed)?,
        })
}



