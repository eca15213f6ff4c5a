// [libs/domain/vendor-adapters/src/pagination.rs]
//! Lazily follows a FHIR Bundle's `next` link, yielding one resource at a
//! time so callers can stop early without fetching pages they never read.

use crate::errors::{parse_retry_after, AdapterError};
use ehr_infra_transport::RateLimiter;
use futures_util::stream::{self, Stream};
use reqwest::Client;
use serde_json::Value;
use std::collections::VecDeque;
use tracing::debug;

enum PageCursor {
    Pending(String),
    Buffered { remaining: VecDeque<Value>, next_url: Option<String> },
    Done,
}

pub fn paginate_bundle(
    http: Client,
    limiter: RateLimiter,
    bearer_token: String,
    first_url: String,
) -> impl Stream<Item = Result<Value, AdapterError>> + Send {
    stream::unfold(PageCursor::Pending(first_url), move |cursor| {
            let http = http.clone();
            let limiter = limiter.clone();
            let bearer_token = bearer_token.clone();
            async move { advance(cursor, &http, &limiter, &bearer_token).await }
        })
}

/// Returns `(item, next_state)` for the stream to yield, or `None` once
/// the last page's last entry has been emitted. Errors are surfaced as a
/// terminal `Err` item followed by `PageCursor::Done`.
async fn advance(
    mut cursor: PageCursor,
    http: &Client,
    limiter: &RateLimiter,
    bearer_token: &str,
) -> Option<(Result<Value, AdapterError>, PageCursor)> {
    loop {
        cursor = match cursor {
            PageCursor::Done => return None,
            PageCursor::Buffered { mut remaining, next_url } => {
                if let Some(item) = remaining.pop_front() {
                    return Some((Ok(item), PageCursor::Buffered { remaining, next_url }));
                }
                match next_url {
                    Some(url) => PageCursor::Pending(url),
                    None => PageCursor::Done,
                }
            }
            PageCursor::Pending(url) => {
                limiter.acquire().await;
                debug!(url = %url, "fetching bundle page");
                let response = match http.get(&url).bearer_auth(bearer_token).send().await {
                    Ok(response) => response,
                    Err(error) => return Some((Err(AdapterError::Transport(error)), PageCursor::Done)),
                };
                let status = response.status();
                if !status.is_success() {
                    let retry_after = parse_retry_after(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    return Some((
                            Err(AdapterError::VendorRejected { status: status.as_u16(), body, retry_after }),
                            PageCursor::Done,
                        ));
                }
                let bundle: Value = match response.json().await {
                    Ok(bundle) => bundle,
                    Err(error) => return Some((Err(AdapterError::MalformedResponse(error.to_string())), PageCursor::Done)),
                };
                let entries = bundle.get("entry").and_then(Value::as_array).cloned().unwrap_or_default();
                let remaining: VecDeque<Value> =
                entries.into_iter().filter_map(|entry| entry.get("resource").cloned()).collect();
                let next_url = bundle
                    .get("link")
                    .and_then(Value::as_array)
                    .and_then(|links| links.iter().find(|link| link.get("relation").and_then(Value::as_str) == Some("next")))
                    .and_then(|link| link.get("url"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                PageCursor::Buffered { remaining, next_url }
            }
        };
    }
}



