// [libs/core/auth/src/manager.rs]
/*!
 * APARATO: SMART AUTH MANAGER (ESTRATO L1)
 * RESPONSABILIDAD: Flujo OAuth2 authorization-code+PKCE, sellado de
 * tokens y refresco single-flight por conexión.
 */

use crate::errors::AuthError;
use crate::state_store::PendingStateStore;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use ehr_core_crypto_vault::{pkce, TokenVault};
use ehr_domain_models::{Connection, ConnectionStatus};
use ehr_infra_transport::{retry_with_backoff, BackoffPolicy};
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, instrument, warn};

/// SMART scopes requested for every connection. Fixed rather than
/// per-vendor configurable — scope negotiation is not exposed as a
/// tunable.
const SMART_SCOPES: &str = "patient/*.read launch/patient offline_access openid fhirUser";

/// Refresh proactively once the access token has 5 minutes or less left.
const REFRESH_SKEW: ChronoDuration = ChronoDuration::minutes(5);

/// Persistence seam the auth manager is generic over, so this crate never
/// depends on `ehr-infra-db` directly. `ehr-infra-db`'s `ConnectionRepository`
/// implements this trait.
pub trait ConnectionTokenStore: Send + Sync {
    fn load(&self, connection_id: &str) -> impl Future<Output = Result<Connection, AuthError>> + Send;

    fn save_tokens(
        &self,
        connection_id: &str,
        sealed_access_token: &str,
        sealed_refresh_token: Option<&str>,
        access_token_expires_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), AuthError>> + Send;

    fn set_status(
        &self,
        connection_id: &str,
        status: ConnectionStatus,
    ) -> impl Future<Output = Result<(), AuthError>> + Send;
}

#[derive(Debug, Clone)]
pub struct BeginResult {
    pub authorization_url: String,
    pub state: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

pub struct AuthManager<S: ConnectionTokenStore> {
    store: S,
    vault: TokenVault,
    http: reqwest::Client,
    pending: PendingStateStore,
    refresh_locks: std::sync::Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl<S: ConnectionTokenStore> AuthManager<S> {
    pub fn new(store: S, vault: TokenVault) -> Self {
        Self {
            store,
            vault,
            http: reqwest::Client::new(),
            pending: PendingStateStore::new(),
            refresh_locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// `Begin`: builds the authorization URL and a transient
    /// `(state, codeVerifier)` pair bound to `connection.connection_id`,
    /// expiring after 10 minutes.
    #[instrument(skip(self, connection))]
    pub fn begin(&self, connection: &Connection) -> BeginResult {
        let pair = pkce::generate();
        self.pending
            .insert(&pair.state, &connection.connection_id, &pair.code_verifier);

        let authorization_url = format!(
            "{base}?response_type=code&client_id={client_id}&redirect_uri={redirect_uri}&scope={scope}&state={state}&aud={aud}&code_challenge={challenge}&code_challenge_method=S256",
            base = connection.authorization_url,
            client_id = urlencode(&connection.client_id),
            redirect_uri = urlencode(&connection.redirect_uri),
            scope = urlencode(SMART_SCOPES),
            state = urlencode(&pair.state),
            aud = urlencode(&connection.fhir_base_url),
            challenge = urlencode(&pair.code_challenge),
        );

        info!(connection_id = %connection.connection_id, "authorization URL issued");
        BeginResult {
            authorization_url,
            state: pair.state,
        }
    }

    /// `Complete`: exchanges the authorization code for
    /// tokens, seals them, and activates the connection.
    #[instrument(skip(self, code, code_verifier))]
    pub async fn complete(
        &self,
        connection_id: &str,
        code: &str,
        state: &str,
        code_verifier: &str,
    ) -> Result<Connection, AuthError> {
        let (bound_connection_id, stored_verifier) = self
            .pending
            .take(state, connection_id)
            .ok_or(AuthError::InvalidState)?;
        if stored_verifier != code_verifier {
            return Err(AuthError::InvalidState);
        }

        let connection = self.store.load(&bound_connection_id).await?;
        let token_response = retry_with_backoff(BackoffPolicy::token_refresh(), |_attempt| {
            self.exchange_authorization_code(&connection, code, code_verifier)
        })
        .await?;

        self.persist_token_response(&connection, &token_response).await?;
        self.store
            .set_status(&connection.connection_id, ConnectionStatus::Active)
            .await?;

        info!(connection_id = %connection.connection_id, "connection activated");
        self.store.load(&connection.connection_id).await
    }

    /// `EnsureFresh`: returns a live bearer token, refreshing
    /// single-flight per connection when the cached token is within 5
    /// minutes of expiry.
    #[instrument(skip(self))]
    pub async fn ensure_fresh(&self, connection_id: &str) -> Result<String, AuthError> {
        let connection = self.store.load(connection_id).await?;
        let now = Utc::now();

        if connection.is_access_token_fresh(now, REFRESH_SKEW) {
            return self.unseal_access_token(&connection);
        }

        let lock = self.lock_for(connection_id);
        let _guard = lock.lock().await;

        // Double-check: a sibling caller may have already refreshed while
        // we waited on the lock (single-flight: N concurrent refreshers
        // share one in-flight exchange).
        let connection = self.store.load(connection_id).await?;
        if connection.is_access_token_fresh(Utc::now(), REFRESH_SKEW) {
            return self.unseal_access_token(&connection);
        }

        let sealed_refresh_token = connection
            .sealed_refresh_token
            .clone()
            .ok_or(AuthError::NoLiveToken)?;
        let refresh_token = self.vault.unseal(&sealed_refresh_token)?;

        let result = retry_with_backoff(BackoffPolicy::token_refresh(), |_attempt| {
            self.exchange_refresh_token(&connection, &refresh_token)
        })
        .await;

        match result {
            Ok(token_response) => {
                self.persist_token_response(&connection, &token_response).await?;
                Ok(token_response.access_token)
            }
            Err(AuthError::InvalidGrant) => {
                warn!(connection_id = %connection.connection_id, "refresh token rejected, marking connection expired");
                self.store
                    .set_status(&connection.connection_id, ConnectionStatus::TokenExpired)
                    .await?;
                Err(AuthError::InvalidGrant)
            }
            Err(other) => Err(other),
        }
    }

    fn unseal_access_token(&self, connection: &Connection) -> Result<String, AuthError> {
        let sealed = connection
            .sealed_access_token
            .as_deref()
            .ok_or(AuthError::NoLiveToken)?;
        Ok(self.vault.unseal(sealed)?)
    }

    fn lock_for(&self, connection_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.refresh_locks.lock().expect("refresh lock map poisoned");
        locks
            .entry(connection_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    async fn persist_token_response(
        &self,
        connection: &Connection,
        token_response: &TokenResponse,
    ) -> Result<(), AuthError> {
        let sealed_access_token = self.vault.seal(&token_response.access_token)?;
        let sealed_refresh_token = match &token_response.refresh_token {
            Some(refresh_token) => Some(self.vault.seal(refresh_token)?),
            None => None,
        };
        let expires_at = Utc::now() + ChronoDuration::seconds(token_response.expires_in.max(0));

        self.store
            .save_tokens(
                &connection.connection_id,
                &sealed_access_token,
                sealed_refresh_token.as_deref(),
                expires_at,
            )
            .await
    }

    async fn exchange_authorization_code(
        &self,
        connection: &Connection,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, AuthError> {
        let mut form = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("redirect_uri", connection.redirect_uri.clone()),
            ("client_id", connection.client_id.clone()),
            ("code_verifier", code_verifier.to_string()),
        ];
        if let Some(sealed_secret) = &connection.sealed_client_secret {
            let client_secret = self.vault.unseal(sealed_secret)?;
            form.push(("client_secret", client_secret));
        }
        self.post_token_endpoint(&connection.token_url, &form).await
    }

    async fn exchange_refresh_token(
        &self,
        connection: &Connection,
        refresh_token: &str,
    ) -> Result<TokenResponse, AuthError> {
        let mut form = vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token.to_string()),
            ("client_id", connection.client_id.clone()),
        ];
        if let Some(sealed_secret) = &connection.sealed_client_secret {
            let client_secret = self.vault.unseal(sealed_secret)?;
            form.push(("client_secret", client_secret));
        }
        self.post_token_endpoint(&connection.token_url, &form).await
    }

    async fn post_token_endpoint(
        &self,
        token_url: &str,
        form: &[(&str, String)],
    ) -> Result<TokenResponse, AuthError> {
        let response = self.http.post(token_url).form(form).send().await?;
        let status = response.status();

        if status.as_u16() == 400 {
            let body = response.text().await.unwrap_or_default();
            if body.contains("invalid_grant") {
                return Err(AuthError::InvalidGrant);
            }
            return Err(AuthError::AuthExchangeFailed(format!("400: {body}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::AuthExchangeFailed(format!("{status}: {body}")));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::MalformedTokenResponse(e.to_string()))
    }
}

fn urlencode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urlencode_preserves_unreserved_characters() {
        assert_eq!(urlencode("abc-123_.~"), "abc-123_.~");
    }

    #[test]
    fn urlencode_escapes_reserved_characters() {
        assert_eq!(urlencode("a b/c"), "a%20b%2Fc");
    }
}
