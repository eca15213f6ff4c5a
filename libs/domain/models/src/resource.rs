// [libs/domain/models/src/resource.rs]
//! A vendor-side FHIR resource captured locally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DownloadState {
    Pending,
    Downloading,
    Downloaded,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FhirResource {
    pub local_id: String,
    pub connection_id: String,
    pub resource_type: String,
    pub vendor_resource_id: String,
    /// Raw payload retained verbatim for re-transformation.
    pub raw_payload: Vec<u8>,
    pub title: Option<String>,
    pub resource_date: Option<DateTime<Utc>>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub content_type: Option<String>,
    pub content_url: Option<String>,
    pub download_state: DownloadState,
    pub local_file_path: Option<String>,
    pub processed: bool,
    pub last_update_observed: DateTime<Utc>,
}

impl FhirResource {
    /// `(connection_id, vendor_resource_id, resource_type)` uniqueness key.
    pub fn identity_key(&self) -> (String, String, String) {
        (
            self.connection_id.clone(),
            self.vendor_resource_id.clone(),
            self.resource_type.clone(),
        )
    }
}



