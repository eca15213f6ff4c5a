// [libs/domain/transform/src/engine.rs]
/*!
 * APARATO: TRANSFORMATION & CONFLICT ENGINE (ESTRATO L2)
 * RESPONSABILIDAD: Aplicar reglas ordenadas por prioridad sobre el payload
 * del vendor, detectar divergencias campo-a-campo contra el registro
 * local, y decidir cuál valor se escribe.
 */

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ehr_domain_models::{Conflict, ConflictResolution, RuleDirection, RuleKind, TransformationRule, Vendor};
use ehr_infra_db::{ConflictRepository, RuleRepository};
use serde_json::Value;
use tracing::{instrument, warn};

use crate::errors::TransformError;
use crate::paths::{get_path, set_path};

pub type CustomFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Deciding which field wins a conflict. `per_field_override` and
/// `remote_authoritative_fields` are keyed by dotted field path.
#[derive(Default, Clone)]
pub struct ConflictPolicy {
    pub per_field_override: HashMap<String, ConflictResolution>,
    pub remote_authoritative_fields: HashSet<String>,
    pub auto_resolve: bool,
}

pub enum TransformOutcome {
    Write { resource: Value, conflicts: Vec<Conflict> },
    Skipped { reason: String },
}

pub struct TransformationEngine {
    rules: Arc<RuleRepository>,
    conflicts: Arc<ConflictRepository>,
    custom_fns: HashMap<String, CustomFn>,
}

impl TransformationEngine {
    pub fn new(rules: Arc<RuleRepository>, conflicts: Arc<ConflictRepository>) -> Self {
        Self { rules, conflicts, custom_fns: HashMap::new() }
    }

    /// Registers a named function for `CUSTOM` rules. Call before any `transform_inbound`.
    pub fn register_custom_fn(&mut self, name: impl Into<String>, f: CustomFn) {
        self.custom_fns.insert(name.into(), f);
    }

    /// Applies every enabled `(vendor, resource_type, INBOUND)` rule to
    /// `input` in priority order, detects conflicts against `local` (when
    /// present), and honors `validate_output`.
    #[instrument(skip(self, input, local, policy))]
    #[allow(clippy::too_many_arguments)]
    pub async fn transform_inbound(
        &self,
        vendor: Vendor,
        resource_type: &str,
        resource_id: &str,
        input: &Value,
        local: Option<&Value>,
        required_fields: &[&str],
        validate_output: bool,
        strict: bool,
        policy: &ConflictPolicy,
    ) -> Result<TransformOutcome, TransformError> {
        let rules = self.rules.for_resource(vendor, resource_type, RuleDirection::Inbound).await?;
        let mut output = Value::Object(serde_json::Map::new());
        for rule in &rules {
            self.apply_rule(rule, input, &mut output, strict)?;
        }

        let mut conflicts = Vec::new();
        if let Some(local) = local {
            conflicts = self.detect_and_resolve(resource_type, resource_id, local, &mut output, policy).await?;
        }

        if validate_output {
            for field in required_fields {
                let missing = get_path(&output, field).map(Value::is_null).unwrap_or(true);
                if missing {
                    return Ok(TransformOutcome::Skipped { reason: format!("required field '{field}' missing") });
                }
            }
        }

        Ok(TransformOutcome::Write { resource: output, conflicts })
    }

    fn apply_rule(&self, rule: &TransformationRule, input: &Value, output: &mut Value, strict: bool) -> Result<(), TransformError> {
        match rule.kind {
            RuleKind::FieldMapping => {
                let value = self.read_source(rule, input, strict)?;
                set_path(output, &rule.target_field_path, value);
            }
            RuleKind::ValueMapping | RuleKind::Lookup => {
                let value = self.read_source(rule, input, strict)?;
                let mapped = match (&rule.mapping_table, value.as_str()) {
                    (Some(table), Some(key)) => table.get(key).map(|v| Value::String(v.clone())).unwrap_or_else(|| value.clone()),
                    _ => value.clone(),
                };
                set_path(output, &rule.target_field_path, mapped);
            }
            RuleKind::TypeConversion => {
                let value = self.read_source(rule, input, strict)?;
                let converted = convert_type(&value, &rule.target_format).map_err(|message| TransformError::RuleFailed {
                        rule_id: rule.rule_id.clone(),
                        kind: "TYPE_CONVERSION",
                        message,
                    })?;
                set_path(output, &rule.target_field_path, converted);
            }
            RuleKind::Concat => {
                let separator = rule.expression.as_deref().unwrap_or(",");
                let parts: Vec<String> = rule
                    .source_field_path
                    .split(',')
                    .map(str::trim)
                    .filter_map(|path| get_path(input, path))
                    .filter(|value| !value.is_null())
                    .map(value_to_string)
                    .collect();
                set_path(output, &rule.target_field_path, Value::String(parts.join(separator)));
            }
            RuleKind::Split => {
                let separator = rule.expression.as_deref().unwrap_or(",");
                let value = self.read_source(rule, input, strict)?;
                let joined = value.as_str().map(str::to_string).unwrap_or_else(|| value_to_string(&value));
                let parts: Vec<&str> = joined.split(separator).collect();
                for (target, part) in rule.target_field_path.split(',').map(str::trim).zip(parts) {
                    set_path(output, target, Value::String(part.trim().to_string()));
                }
            }
            RuleKind::Calculation | RuleKind::Conditional => {
                let expr = rule.expression.as_deref().ok_or_else(|| TransformError::RuleFailed {
                        rule_id: rule.rule_id.clone(),
                        kind: "CALCULATION",
                        message: "rule carries no expression".into(),
                    })?;
                let result = crate::expr::evaluate(expr, input)?;
                set_path(output, &rule.target_field_path, result);
            }
            RuleKind::Custom => {
                let name = rule.expression.as_deref().unwrap_or_default();
                let function = self.custom_fns.get(name).ok_or_else(|| TransformError::RuleFailed {
                        rule_id: rule.rule_id.clone(),
                        kind: "CUSTOM",
                        message: format!("no function registered as '{name}'"),
                    })?;
                let value = self.read_source(rule, input, strict)?;
                set_path(output, &rule.target_field_path, function(&value));
            }
        }
        Ok(())
    }

    fn read_source(&self, rule: &TransformationRule, input: &Value, strict: bool) -> Result<Value, TransformError> {
        match get_path(input, &rule.source_field_path) {
            Some(value) => Ok(value.clone()),
            None if strict => Err(TransformError::MissingSourceField(rule.source_field_path.clone())),
            None => {
                warn!(rule_id = %rule.rule_id, source = %rule.source_field_path, "missing source field, lenient mode");
                Ok(Value::Null)
            }
        }
    }

    /// Compares every field `remote` also defines against `local`; fields
    /// that diverge and aren't remote-authoritative become `Conflict`
    /// records. When `policy.auto_resolve` is set, applies the resolution
    /// chain and overwrites `remote` with the winning value in place.
    async fn detect_and_resolve(
        &self,
        resource_type: &str,
        resource_id: &str,
        local: &Value,
        remote: &mut Value,
        policy: &ConflictPolicy,
    ) -> Result<Vec<Conflict>, TransformError> {
        let Some(local_obj) = local.as_object() else { return Ok(Vec::new()) };
        let remote_obj = match remote.as_object() {
            Some(obj) => obj.clone(),
            None => return Ok(Vec::new()),
        };

        let mut conflicts = Vec::new();
        for (field, remote_value) in &remote_obj {
            let Some(local_value) = local_obj.get(field) else { continue };
            if local_value == remote_value || policy.remote_authoritative_fields.contains(field) {
                continue;
            }

            let mut conflict = Conflict {
                conflict_id: ehr_infra_db::repositories::conflict_repository::new_conflict_id(),
                resource_type: resource_type.to_string(),
                resource_id: resource_id.to_string(),
                field_path: field.clone(),
                local_value: local_value.clone(),
                remote_value: remote_value.clone(),
                detected_at: Utc::now(),
                resolution: None,
                resolved_value: None,
                resolved_by: None,
                resolved_at: None,
            };

            if policy.auto_resolve {
                if let Some((resolution, resolved_value)) = resolve_policy_chain(&conflict, policy, local, remote) {
                    conflict.resolution = Some(resolution);
                    conflict.resolved_value = Some(resolved_value.clone());
                    conflict.resolved_by = Some("policy-chain".to_string());
                    conflict.resolved_at = Some(Utc::now());
                    set_path(remote, field, resolved_value);
                }
            }

            self.conflicts.record(&conflict).await?;
            conflicts.push(conflict);
        }
        Ok(conflicts)
    }
}

/// Resolution policies in priority order: per-field
/// override, remote-authoritative, newest-wins via `meta.lastUpdated`,
/// otherwise manual (no automatic write — returns `None`).
fn resolve_policy_chain(conflict: &Conflict, policy: &ConflictPolicy, local: &Value, remote: &Value) -> Option<(ConflictResolution, Value)> {
    if let Some(resolution) = policy.per_field_override.get(&conflict.field_path) {
        return match resolution {
            ConflictResolution::Manual => None,
            other => Some((*other, pick(*other, conflict))),
        };
    }
    if policy.remote_authoritative_fields.contains(&conflict.field_path) {
        return Some((ConflictResolution::Remote, conflict.remote_value.clone()));
    }
    if let (Some(remote_updated), Some(local_updated)) = (last_updated(remote), last_updated(local)) {
        return if remote_updated >= local_updated {
            Some((ConflictResolution::Remote, conflict.remote_value.clone()))
        } else {
            Some((ConflictResolution::Local, conflict.local_value.clone()))
        };
    }
    None
}

fn pick(resolution: ConflictResolution, conflict: &Conflict) -> Value {
    match resolution {
        ConflictResolution::Local => conflict.local_value.clone(),
        ConflictResolution::Remote | ConflictResolution::Merge => conflict.remote_value.clone(),
        ConflictResolution::Manual => conflict.remote_value.clone(),
    }
}

fn last_updated(document: &Value) -> Option<DateTime<Utc>> {
    get_path(document, "meta.lastUpdated")?.as_str().and_then(|raw| DateTime::parse_from_rfc3339(raw).ok()).map(|dt| dt.with_timezone(&Utc))
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn convert_type(value: &Value, target_format: &str) -> Result<Value, String> {
    match target_format {
        "string" => Ok(Value::String(value_to_string(value))),
        "number" => match value {
            Value::Number(n) => Ok(Value::Number(n.clone())),
            Value::String(s) => s.trim().parse::<f64>().map(Value::from).map_err(|e| e.to_string()),
            Value::Bool(b) => Ok(Value::from(if *b { 1 } else { 0 })),
            other => Err(format!("cannot convert {other} to number")),
        },
        "boolean" => match value {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::String(s) => Ok(Value::Bool(matches!(s.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))),
            Value::Number(n) => Ok(Value::Bool(n.as_f64().map(|f| f != 0.0).unwrap_or(false))),
            other => Err(format!("cannot convert {other} to boolean")),
        },
        "date" => match value {
            Value::String(s) => chrono::DateTime::parse_from_rfc3339(s)
                .map(|dt| Value::String(dt.to_rfc3339()))
                .or_else(|_| chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").map(|d| Value::String(d.format("%Y-%m-%d").to_string())))
                .map_err(|e| e.to_string()),
            other => Err(format!("cannot convert {other} to date")),
        },
        "array" => match value {
            Value::Array(_) => Ok(value.clone()),
            Value::Null => Ok(Value::Array(Vec::new())),
            other => Ok(Value::Array(vec![other.clone()])),
        },
        other => Err(format!("unknown target format '{other}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_conversion_string_to_number() {
        assert_eq!(convert_type(&Value::String("42".into()), "number"), Ok(Value::from(42.0)));
    }

    #[test]
    fn type_conversion_to_array_wraps_scalar() {
        assert_eq!(convert_type(&Value::String("x".into()), "array"), Ok(Value::Array(vec![Value::String("x".into())])));
    }

    #[test]
    fn policy_chain_prefers_per_field_override() {
        let conflict = Conflict {
            conflict_id: "c1".into(),
            resource_type: "Patient".into(),
            resource_id: "p1".into(),
            field_path: "name".into(),
            local_value: Value::String("Ada".into()),
            remote_value: Value::String("Grace".into()),
            detected_at: Utc::now(),
            resolution: None,
            resolved_value: None,
            resolved_by: None,
            resolved_at: None,
        };
        let mut policy = ConflictPolicy { auto_resolve: true, ..Default::default() };
        policy.per_field_override.insert("name".into(), ConflictResolution::Local);
        let (resolution, value) = resolve_policy_chain(&conflict, &policy, &Value::Null, &Value::Null).unwrap();
        assert_eq!(resolution, ConflictResolution::Local);
        assert_eq!(value, Value::String("Ada".into()));
    }
}



