// [libs/domain/models/src/conflict.rs]
//! A detected divergence between local and remote field values during an
//! inbound sync.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConflictResolution {
    Local,
    Remote,
    Merge,
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    pub conflict_id: String,
    pub resource_type: String,
    pub resource_id: String,
    pub field_path: String,
    pub local_value: Value,
    pub remote_value: Value,
    pub detected_at: DateTime<Utc>,
    pub resolution: Option<ConflictResolution>,
    pub resolved_value: Option<Value>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Conflict {
    /// An unresolved conflict blocks the write of that field unless the
    /// job's `resolveConflicts` option authorizes auto-resolution.
    pub fn blocks_write(&self) -> bool {
        self.resolution.is_none()
    }
}



