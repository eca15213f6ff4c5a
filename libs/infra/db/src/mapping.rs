// [libs/infra/db/src/mapping.rs]
//! Shared row/value conversions. Domain enums carry `serde(rename_all =
//! ...)` attributes already; these helpers round-trip through that same
//! representation instead of hand-duplicating the string tables.

use crate::errors::DbError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub fn enum_to_text<T: Serialize>(value: &T) -> Result<String, DbError> {
    match serde_json::to_value(value).map_err(|e| DbError::MappingError(e.to_string()))? {
        serde_json::Value::String(tag) => Ok(tag),
        other => Err(DbError::MappingError(format!("expected string-like enum, got {other}"))),
    }
}

pub fn text_to_enum<T: DeserializeOwned>(raw: &str) -> Result<T, DbError> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|e| DbError::MappingError(format!("{raw}: {e}")))
}

pub fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339()
}

pub fn opt_rfc3339(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(|v| v.to_rfc3339())
}

pub fn parse_rfc3339(raw: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::MappingError(format!("bad timestamp {raw}: {e}")))
}

pub fn parse_opt_rfc3339(raw: Option<String>) -> Result<Option<DateTime<Utc>>, DbError> {
    raw.map(|s| parse_rfc3339(&s)).transpose()
}

pub fn to_json<T: Serialize>(value: &T) -> Result<String, DbError> {
    serde_json::to_string(value).map_err(|e| DbError::MappingError(e.to_string()))
}

pub fn from_json<T: DeserializeOwned>(raw: &str) -> Result<T, DbError> {
    serde_json::from_str(raw).map_err(|e| DbError::MappingError(e.to_string()))
}
