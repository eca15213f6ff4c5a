// [libs/infra/db/src/repositories/conflict_repository.rs]
/*!
 * APARATO: CONFLICT REPOSITORY (ESTRATO L3)
 * RESPONSABILIDAD: Persistencia de divergencias campo-a-campo detectadas
 * durante una sincronización entrante, con su resolución eventual.
 */

use crate::errors::DbError;
use crate::mapping::{enum_to_text, opt_rfc3339, parse_opt_rfc3339, parse_rfc3339, text_to_enum};
use chrono::Utc;
use ehr_domain_models::{Conflict, ConflictResolution};
use libsql::{params, Connection, Row};
use serde_json::Value;
use tracing::instrument;
use uuid::Uuid;

pub struct ConflictRepository {
    connection: Connection,
}

impl ConflictRepository {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    #[instrument(skip(self, conflict))]
    pub async fn record(&self, conflict: &Conflict) -> Result<(), DbError> {
        self.connection
            .execute(
            r#"INSERT INTO conflicts (
                conflict_id, resource_type, resource_id, field_path, local_value, remote_value,
                detected_at, resolution, resolved_value, resolver_identity, resolved_at
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)"#,
            params![
                conflict.conflict_id.clone(),
                conflict.resource_type.clone(),
                conflict.resource_id.clone(),
                conflict.field_path.clone(),
                conflict.local_value.to_string(),
                conflict.remote_value.to_string(),
                conflict.detected_at.to_rfc3339(),
                conflict.resolution.map(|r| enum_to_text(&r)).transpose()?,
                conflict.resolved_value.as_ref().map(Value::to_string),
                conflict.resolved_by.clone(),
                opt_rfc3339(conflict.resolved_at),
            ],
        )
            .await?;
        Ok(())
    }

    /// Resolves a conflict; callers already decided `resolution` and
    /// `resolved_value` according to the policy chain.
    pub async fn resolve(
        &self,
        conflict_id: &str,
        resolution: ConflictResolution,
        resolved_value: &Value,
        resolved_by: &str,
    ) -> Result<(), DbError> {
        let affected = self
            .connection
            .execute(
            r#"UPDATE conflicts SET
                resolution = ?1, resolved_value = ?2, resolver_identity = ?3, resolved_at = ?4
                WHERE conflict_id = ?5"#,
            params![
                enum_to_text(&resolution)?,
                resolved_value.to_string(),
                resolved_by,
                Utc::now().to_rfc3339(),
                conflict_id,
            ],
        )
            .await?;
        if affected == 0 {
            return Err(DbError::MappingError(format!("conflict not found: {conflict_id}")));
        }
        Ok(())
    }

    pub async fn unresolved_for_resource(&self, resource_type: &str, resource_id: &str) -> Result<Vec<Conflict>, DbError> {
        let mut rows = self
            .connection
            .query(
            "SELECT * FROM conflicts WHERE resource_type = ?1 AND resource_id = ?2 AND resolution IS NULL",
            params![resource_type, resource_id],
        )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_conflict(&row)?);
        }
        Ok(out)
    }
}

pub fn new_conflict_id() -> String {
    Uuid::new_v4().to_string()
}

fn row_to_conflict(row: &Row) -> Result<Conflict, DbError> {
    let local_value: String = row.get(4)?;
    let remote_value: String = row.get(5)?;
    let detected_at: String = row.get(6)?;
    let resolution: Option<String> = row.get(7)?;
    let resolved_value: Option<String> = row.get(8)?;
    let resolved_at: Option<String> = row.get(10)?;

    Ok(Conflict {
            conflict_id: row.get(0)?,
            resource_type: row.get(1)?,
            resource_id: row.get(2)?,
            field_path: row.get(3)?,
            local_value: serde_json::from_str(&local_value).map_err(|e| DbError::MappingError(e.to_string()))?,
            remote_value: serde_json::from_str(&remote_value).map_err(|e| DbError::MappingError(e.to_string()))?,
            detected_at: parse_rfc3339(&detected_at)?,
            resolution: resolution.map(|r| text_to_enum::<ConflictResolution>(&r)).transpose()?,
            resolved_value: resolved_value
                .map(|v| serde_json::from_str(&v).map_err(|e| DbError::MappingError(e.to_string())))
                .transpose()?,
            resolved_by: row.get(9)?,
            resolved_at: parse_opt_rfc3339(resolved_at)?,
        })
}



