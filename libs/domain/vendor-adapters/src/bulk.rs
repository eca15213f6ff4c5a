// [libs/domain/vendor-adapters/src/bulk.rs]
//! FHIR `$export` kickoff/poll/download primitives shared by every vendor
//! that supports bulk export.

use crate::errors::AdapterError;
use futures_util::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub enum BulkExportScope {
    Patient,
    Group(String),
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestFile {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub url: String,
    #[serde(default)]
    pub count: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkExportManifest {
    #[serde(rename = "transactionTime")]
    pub transaction_time: Option<String>,
    #[serde(default)]
    pub output: Vec<ManifestFile>,
    #[serde(default)]
    pub error: Vec<ManifestFile>,
}

#[derive(Debug, Clone)]
pub enum PollOutcome {
    InProgress { progress: Option<String>, retry_after: Option<std::time::Duration> },
    Complete(BulkExportManifest),
}

/// Splits a streamed NDJSON body on line boundaries, dropping blank lines.
/// Yields raw JSON text per line; parsing and offset-based resume are the
/// bulk export runner's concern, not this crate's.
pub fn ndjson_lines(response: reqwest::Response) -> impl Stream<Item = Result<String, AdapterError>> + Send {
    let initial = (response.bytes_stream(), Vec::<u8>::new(), false);
    stream::unfold(initial, |(mut byte_stream, mut buffer, mut upstream_done)| async move {
            loop {
                if let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                    let line_bytes: Vec<u8> = buffer.drain(0..=pos).collect();
                    let line = String::from_utf8_lossy(&line_bytes[..line_bytes.len() - 1]).trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    return Some((Ok(line), (byte_stream, buffer, upstream_done)));
                }

                if upstream_done {
                    if buffer.is_empty() {
                        return None;
                    }
                    let line = String::from_utf8_lossy(&buffer).trim().to_string();
                    buffer.clear();
                    if line.is_empty() {
                        return None;
                    }
                    return Some((Ok(line), (byte_stream, buffer, upstream_done)));
                }

                match byte_stream.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(chunk.as_ref()),
                    Some(Err(error)) => return Some((Err(AdapterError::Transport(error)), (byte_stream, buffer, true))),
                    None => upstream_done = true,
                }
            }
        })
}



