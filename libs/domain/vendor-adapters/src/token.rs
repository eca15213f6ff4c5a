// [libs/domain/vendor-adapters/src/token.rs]
use crate::errors::AdapterError;
use ehr_core_auth::{AuthManager, ConnectionTokenStore};
use std::future::Future;

/// Seam between the vendor adapter layer and the SMART auth manager, so
/// this crate depends only on `ehr-core-auth`'s public contract rather
/// than a concrete token store implementation.
pub trait TokenSource: Send + Sync {
    fn ensure_fresh(&self, connection_id: &str) -> impl Future<Output = Result<String, AdapterError>> + Send;
}

impl<S: ConnectionTokenStore> TokenSource for AuthManager<S> {
    async fn ensure_fresh(&self, connection_id: &str) -> Result<String, AdapterError> {
        AuthManager::ensure_fresh(self, connection_id).await.map_err(AdapterError::Auth)
    }
}
