// [libs/domain/vendor-adapters/src/adapter.rs]
//! One struct per EHR vendor, each a thin wrapper
//! delegating to a shared `GenericAdapter` so request construction, the
//! 401-retry contract, and bulk export mechanics are written once.

use crate::bulk::{BulkExportManifest, BulkExportScope, PollOutcome};
use crate::errors::{parse_json_response, vendor_rejected, AdapterError};
use crate::pagination::paginate_bundle;
use crate::profile::VendorProfile;
use crate::token::TokenSource;
use chrono::{DateTime, Utc};
use ehr_domain_models::{Connection, Vendor};
use ehr_infra_transport::RateLimiterRegistry;
use futures_util::stream::Stream;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::instrument;

pub type ResourceStream = Pin<Box<dyn Stream<Item = Result<Value, AdapterError>> + Send>>;
pub type NdjsonLineStream = Pin<Box<dyn Stream<Item = Result<String, AdapterError>> + Send>>;
type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The uniform surface the sync orchestrator and bulk export runner code
/// against, independent of which of the seven vendors a connection
/// targets. Dyn-compatible by construction (boxed futures)
/// so callers can hold `Box<dyn VendorFhirAdapter>` keyed by `Vendor`.
pub trait VendorFhirAdapter: Send + Sync {
    fn vendor(&self) -> Vendor;
    fn profile(&self) -> &VendorProfile;

    fn fetch_patient<'a>(&'a self, connection: &'a Connection, patient_id: &'a str) -> BoxFuture<'a, Result<Value, AdapterError>>;

    fn search<'a>(
        &'a self,
        connection: &'a Connection,
        resource_type: &'a str,
        params: &'a HashMap<String, String>,
    ) -> BoxFuture<'a, Result<ResourceStream, AdapterError>>;

    fn fetch_binary<'a>(&'a self, connection: &'a Connection, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, AdapterError>>;

    fn start_bulk_export<'a>(
        &'a self,
        connection: &'a Connection,
        scope: BulkExportScope,
        resource_types: Option<&'a [String]>,
        since: Option<DateTime<Utc>>,
    ) -> BoxFuture<'a, Result<String, AdapterError>>;

    fn poll_bulk_export<'a>(&'a self, connection: &'a Connection, status_url: &'a str) -> BoxFuture<'a, Result<PollOutcome, AdapterError>>;

    fn download_bulk_file<'a>(&'a self, connection: &'a Connection, file_url: &'a str) -> BoxFuture<'a, Result<NdjsonLineStream, AdapterError>>;
}

/// Shared implementation every per-vendor struct delegates to. Holds no
/// vendor-specific state beyond the profile; quirks that genuinely differ
/// (extra resource types, bulk export support, rate limits) live in
/// `VendorProfile`, not in branches here.
pub struct GenericAdapter<T: TokenSource> {
    profile: VendorProfile,
    http: Client,
    rate_limiters: Arc<RateLimiterRegistry>,
    token_source: Arc<T>,
}

impl<T: TokenSource + 'static> GenericAdapter<T> {
    pub fn new(vendor: Vendor, http: Client, rate_limiters: Arc<RateLimiterRegistry>, token_source: Arc<T>) -> Self {
        Self { profile: VendorProfile::for_vendor(vendor), http, rate_limiters, token_source }
    }

    async fn bearer(&self, connection: &Connection) -> Result<String, AdapterError> {
        self.token_source.ensure_fresh(&connection.connection_id).await
    }

    /// Sends one GET, retrying exactly once after a fresh `EnsureFresh` on
    /// a 401.
    #[instrument(skip(self, connection))]
    async fn get_json(&self, connection: &Connection, url: &str) -> Result<Value, AdapterError> {
        let limiter = self.rate_limiters.limiter_for_connection(&connection.connection_id).await;
        let gate = self.rate_limiters.gate_for_vendor(&self.profile.vendor.to_string()).await;
        let _permit = gate.acquire().await;
        limiter.acquire().await;

        let token = self.bearer(connection).await?;
        let response = self.http.get(url).bearer_auth(&token).send().await?;
        if response.status().as_u16() == 401 {
            let refreshed = self.bearer(connection).await?;
            let retried = self.http.get(url).bearer_auth(&refreshed).send().await?;
            return parse_json_response(retried).await;
        }
        parse_json_response(response).await
    }

    pub async fn fetch_patient(&self, connection: &Connection, patient_id: &str) -> Result<Value, AdapterError> {
        let url = format!("{}/Patient/{}", connection.fhir_base_url.trim_end_matches('/'), patient_id);
        self.get_json(connection, &url).await
    }

    pub async fn search(
        &self,
        connection: &Connection,
        resource_type: &str,
        params: &HashMap<String, String>,
    ) -> Result<ResourceStream, AdapterError> {
        let mut url = format!("{}/{}", connection.fhir_base_url.trim_end_matches('/'), resource_type);
        if !params.is_empty() {
            let query: String = params.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("&");
            url = format!("{url}?{query}");
        }
        let token = self.bearer(connection).await?;
        let limiter = self.rate_limiters.limiter_for_connection(&connection.connection_id).await;
        Ok(Box::pin(paginate_bundle(self.http.clone(), limiter, token, url)))
    }

    pub async fn fetch_binary(&self, connection: &Connection, url: &str) -> Result<Vec<u8>, AdapterError> {
        let limiter = self.rate_limiters.limiter_for_connection(&connection.connection_id).await;
        limiter.acquire().await;
        let token = self.bearer(connection).await?;
        let response = self.http.get(url).bearer_auth(&token).send().await?;
        if !response.status().is_success() {
            return Err(vendor_rejected(response).await);
        }
        Ok(response.bytes().await?.to_vec())
    }

    pub async fn start_bulk_export(
        &self,
        connection: &Connection,
        scope: BulkExportScope,
        resource_types: Option<&[String]>,
        since: Option<DateTime<Utc>>,
    ) -> Result<String, AdapterError> {
        if !self.profile.supports_bulk_export {
            return Err(AdapterError::UnsupportedOperation(self.profile.vendor.to_string(), "$export"));
        }
        let base = connection.fhir_base_url.trim_end_matches('/');
        let endpoint = match &scope {
            BulkExportScope::System => format!("{base}/$export"),
            BulkExportScope::Patient => format!("{base}/Patient/$export"),
            BulkExportScope::Group(group_id) => format!("{base}/Group/{group_id}/$export"),
        };
        let mut query = Vec::new();
        if let Some(types) = resource_types {
            if !types.is_empty() {
                query.push(format!("_type={}", types.join(",")));
            }
        }
        if let Some(since) = since {
            query.push(format!("_since={}", since.to_rfc3339()));
        }
        let url = if query.is_empty() { endpoint } else { format!("{endpoint}?{}", query.join("&")) };

        let token = self.bearer(connection).await?;
        let response = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .header("Accept", "application/fhir+json")
            .header("Prefer", "respond-async")
            .send()
            .await?;
        if response.status().as_u16() != 202 {
            return Err(vendor_rejected(response).await);
        }
        response
            .headers()
            .get("content-location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| AdapterError::MalformedResponse("bulk export kickoff missing Content-Location".into()))
    }

    pub async fn poll_bulk_export(&self, connection: &Connection, status_url: &str) -> Result<PollOutcome, AdapterError> {
        let token = self.bearer(connection).await?;
        let response = self.http.get(status_url).bearer_auth(&token).header("Accept", "application/json").send().await?;
        match response.status().as_u16() {
            202 => {
                let progress = response.headers().get("x-progress").and_then(|v| v.to_str().ok()).map(str::to_string);
                let retry_after = crate::errors::parse_retry_after(response.headers());
                Ok(PollOutcome::InProgress { progress, retry_after })
            }
            200 => {
                let manifest: BulkExportManifest =
                response.json().await.map_err(|e| AdapterError::MalformedResponse(e.to_string()))?;
                Ok(PollOutcome::Complete(manifest))
            }
            _ => Err(vendor_rejected(response).await),
        }
    }

    pub async fn download_bulk_file(&self, connection: &Connection, file_url: &str) -> Result<NdjsonLineStream, AdapterError> {
        let token = self.bearer(connection).await?;
        let response = self.http.get(file_url).bearer_auth(&token).send().await?;
        if !response.status().is_success() {
            return Err(vendor_rejected(response).await);
        }
        Ok(Box::pin(crate::bulk::ndjson_lines(response)))
    }
}

macro_rules! vendor_adapter {
    ($name:ident, $vendor:expr, $doc:literal) => {
        #[doc = $doc]
        pub struct $name<T: TokenSource> {
            inner: GenericAdapter<T>,
        }

        impl<T: TokenSource + 'static> $name<T> {
            pub fn new(http: Client, rate_limiters: Arc<RateLimiterRegistry>, token_source: Arc<T>) -> Self {
                Self { inner: GenericAdapter::new($vendor, http, rate_limiters, token_source) }
            }
        }

        impl<T: TokenSource + 'static> VendorFhirAdapter for $name<T> {
            fn vendor(&self) -> Vendor {
                self.inner.profile.vendor
            }

            fn profile(&self) -> &VendorProfile {
                &self.inner.profile
            }

            fn fetch_patient<'a>(&'a self, connection: &'a Connection, patient_id: &'a str) -> BoxFuture<'a, Result<Value, AdapterError>> {
                Box::pin(self.inner.fetch_patient(connection, patient_id))
            }

            fn search<'a>(
                &'a self,
                connection: &'a Connection,
                resource_type: &'a str,
                params: &'a HashMap<String, String>,
            ) -> BoxFuture<'a, Result<ResourceStream, AdapterError>> {
                Box::pin(self.inner.search(connection, resource_type, params))
            }

            fn fetch_binary<'a>(&'a self, connection: &'a Connection, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, AdapterError>> {
                Box::pin(self.inner.fetch_binary(connection, url))
            }

            fn start_bulk_export<'a>(
                &'a self,
                connection: &'a Connection,
                scope: BulkExportScope,
                resource_types: Option<&'a [String]>,
                since: Option<DateTime<Utc>>,
            ) -> BoxFuture<'a, Result<String, AdapterError>> {
                Box::pin(self.inner.start_bulk_export(connection, scope, resource_types, since))
            }

            fn poll_bulk_export<'a>(&'a self, connection: &'a Connection, status_url: &'a str) -> BoxFuture<'a, Result<PollOutcome, AdapterError>> {
                Box::pin(self.inner.poll_bulk_export(connection, status_url))
            }

            fn download_bulk_file<'a>(&'a self, connection: &'a Connection, file_url: &'a str) -> BoxFuture<'a, Result<NdjsonLineStream, AdapterError>> {
                Box::pin(self.inner.download_bulk_file(connection, file_url))
            }
        }
    };
}

vendor_adapter!(EpicAdapter, Vendor::Epic, "Epic MyChart FHIR endpoints.");
vendor_adapter!(CernerAdapter, Vendor::Cerner, "Oracle Health (Cerner) FHIR endpoints.");
vendor_adapter!(AllscriptsAdapter, Vendor::Allscripts, "Allscripts FHIR endpoints.");
vendor_adapter!(AthenaAdapter, Vendor::Athena, "athenahealth FHIR endpoints.");
vendor_adapter!(EclinicalworksAdapter, Vendor::Eclinicalworks, "eClinicalWorks FHIR endpoints.");
vendor_adapter!(NextgenAdapter, Vendor::Nextgen, "NextGen Healthcare FHIR endpoints.");
vendor_adapter!(MeditechAdapter, Vendor::Meditech, "MEDITECH FHIR endpoints.");

/// Builds one boxed adapter per vendor sharing a single HTTP client,
/// rate limiter registry, and token source. The sync
/// orchestrator and bulk export runner look an adapter up by
/// `connection.vendor` rather than branching on it themselves.
pub fn build_adapter_registry<T: TokenSource + 'static>(
    http: Client,
    rate_limiters: Arc<RateLimiterRegistry>,
    token_source: Arc<T>,
) -> HashMap<Vendor, Box<dyn VendorFhirAdapter>> {
    let mut registry: HashMap<Vendor, Box<dyn VendorFhirAdapter>> = HashMap::new();
    registry.insert(Vendor::Epic, Box::new(EpicAdapter::new(http.clone(), rate_limiters.clone(), token_source.clone())));
    registry.insert(Vendor::Cerner, Box::new(CernerAdapter::new(http.clone(), rate_limiters.clone(), token_source.clone())));
    registry.insert(Vendor::Allscripts, Box::new(AllscriptsAdapter::new(http.clone(), rate_limiters.clone(), token_source.clone())));
    registry.insert(Vendor::Athena, Box::new(AthenaAdapter::new(http.clone(), rate_limiters.clone(), token_source.clone())));
    registry.insert(
        Vendor::Eclinicalworks,
        Box::new(EclinicalworksAdapter::new(http.clone(), rate_limiters.clone(), token_source.clone())),
    );
    registry.insert(Vendor::Nextgen, Box::new(NextgenAdapter::new(http.clone(), rate_limiters.clone(), token_source.clone())));
    registry.insert(Vendor::Meditech, Box::new(MeditechAdapter::new(http, rate_limiters, token_source)));
    registry
}



