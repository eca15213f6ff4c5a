// [libs/infra/db/src/repositories/rule_repository.rs]
/*!
 * APARATO: TRANSFORMATION RULE REPOSITORY (ESTRATO L3)
 * RESPONSABILIDAD: CRUD de reglas de mapeo por vendor/tipo/dirección,
 * ordenadas por prioridad ascendente.
 */

use crate::errors::DbError;
use crate::mapping::{enum_to_text, from_json, text_to_enum, to_json};
use ehr_domain_models::{RuleDirection, RuleKind, TransformationRule, Vendor};
use libsql::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

pub struct RuleRepository {
    connection: Connection,
}

impl RuleRepository {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    #[instrument(skip(self, rule))]
    pub async fn create(
        &self,
        vendor: Vendor,
        resource_type: &str,
        direction: RuleDirection,
        rule: &TransformationRule,
    ) -> Result<(), DbError> {
        self.connection
            .execute(
            r#"INSERT INTO transformation_rules (
                rule_id, vendor, resource_type, direction, kind, source_format, target_format,
                source_field_path, target_field_path, mapping_table_json, expression, priority, enabled
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)"#,
            params![
                rule.rule_id.clone(),
                vendor.to_string(),
                resource_type,
                enum_to_text(&direction)?,
                enum_to_text(&rule.kind)?,
                rule.source_format.clone(),
                rule.target_format.clone(),
                rule.source_field_path.clone(),
                rule.target_field_path.clone(),
                rule.mapping_table.as_ref().map(to_json).transpose()?,
                rule.expression.clone(),
                rule.priority as i64,
                rule.enabled as i64,
            ],
        )
            .await?;
        Ok(())
    }

    /// Rules for a `(vendor, resource_type, direction)` triple, sorted by
    /// priority ascending so the transformation engine applies lower-numbered
    /// rules first.
    #[instrument(skip(self))]
    pub async fn for_resource(
        &self,
        vendor: Vendor,
        resource_type: &str,
        direction: RuleDirection,
    ) -> Result<Vec<TransformationRule>, DbError> {
        let direction_text = enum_to_text(&direction)?;
        let mut rows = self
            .connection
            .query(
            r#"SELECT * FROM transformation_rules
                WHERE vendor = ?1 AND resource_type = ?2 AND direction = ?3 AND enabled = 1
                ORDER BY priority ASC"#,
            params![vendor.to_string(), resource_type, direction_text],
        )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_rule(&row)?);
        }
        Ok(out)
    }

    pub async fn set_enabled(&self, rule_id: &str, enabled: bool) -> Result<(), DbError> {
        let affected = self
            .connection
            .execute(
            "UPDATE transformation_rules SET enabled = ?1 WHERE rule_id = ?2",
            params![enabled as i64, rule_id],
        )
            .await?;
        if affected == 0 {
            return Err(DbError::RuleNotFound);
        }
        Ok(())
    }

    pub async fn delete(&self, rule_id: &str) -> Result<(), DbError> {
        let affected = self
            .connection
            .execute("DELETE FROM transformation_rules WHERE rule_id = ?1", params![rule_id])
            .await?;
        if affected == 0 {
            return Err(DbError::RuleNotFound);
        }
        Ok(())
    }
}

pub fn new_rule_id() -> String {
    Uuid::new_v4().to_string()
}

fn row_to_rule(row: &Row) -> Result<TransformationRule, DbError> {
    let kind: String = row.get(4)?;
    let mapping_table_json: Option<String> = row.get(9)?;

    Ok(TransformationRule {
            rule_id: row.get(0)?,
            kind: text_to_enum::<RuleKind>(&kind)?,
            source_format: row.get(5)?,
            target_format: row.get(6)?,
            source_field_path: row.get(7)?,
            target_field_path: row.get(8)?,
            mapping_table: mapping_table_json.map(|s| from_json(&s)).transpose()?,
            expression: row.get(10)?,
            priority: row.get::<i64>(11)? as i32,
            enabled: row.get::<i64>(12)? != 0,
        })
}



