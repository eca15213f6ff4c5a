// [libs/domain/vendor-adapters/src/errors.rs]
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("adapter transport fault: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("adapter auth fault: {0}")]
    Auth(#[from] ehr_core_auth::AuthError),

    #[error("vendor rejected request with status {status}: {body}")]
    VendorRejected {
        status: u16,
        body: String,
        retry_after: Option<Duration>,
    },

    #[error("malformed vendor response: {0}")]
    MalformedResponse(String),

    #[error("{0} does not support {1}")]
    UnsupportedOperation(String, &'static str),
}

impl ehr_infra_transport::RetryableError for AdapterError {
    /// 401 is handled one layer up as a single ensure-fresh-then-retry, not
    /// a generic transient fault; only rate limiting and vendor-side
    /// unavailability are worth a backed-off retry.
    fn is_transient(&self) -> bool {
        match self {
            AdapterError::Transport(_) => true,
            AdapterError::VendorRejected { status, .. } => matches!(status, 429 | 503),
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            AdapterError::VendorRejected { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|text| text.parse::<u64>().ok())
        .map(Duration::from_secs)
}

pub(crate) async fn vendor_rejected(response: reqwest::Response) -> AdapterError {
    let status = response.status().as_u16();
    let retry_after = parse_retry_after(response.headers());
    let body = response.text().await.unwrap_or_default();
    AdapterError::VendorRejected { status, body, retry_after }
}

pub(crate) async fn parse_json_response(response: reqwest::Response) -> Result<serde_json::Value, AdapterError> {
    if !response.status().is_success() {
        return Err(vendor_rejected(response).await);
    }
    response.json().await.map_err(|e| AdapterError::MalformedResponse(e.to_string()))
}



