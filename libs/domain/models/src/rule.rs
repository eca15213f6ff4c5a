// [libs/domain/models/src/rule.rs]
//! One directional field mapping.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleKind {
    FieldMapping,
    ValueMapping,
    TypeConversion,
    Concat,
    Split,
    Calculation,
    Conditional,
    Lookup,
    Custom,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleDirection {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationRule {
    pub rule_id: String,
    pub kind: RuleKind,
    pub source_format: String,
    pub target_format: String,
    pub source_field_path: String,
    pub target_field_path: String,
    /// Populated for `ValueMapping`; unknown keys pass through unchanged.
    pub mapping_table: Option<HashMap<String, String>>,
    /// Populated for `Calculation`/`Conditional`/`Custom`.
    pub expression: Option<String>,
    pub priority: i32,
    pub enabled: bool,
}



