// [libs/domain/models/src/connection.rs]
//! A long-lived association between an internal user and one EHR tenant.

use crate::vendor::Vendor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    PendingAuth,
    Active,
    TokenExpired,
    Revoked,
    Error,
}

impl ConnectionStatus {
    /// `Revoked` is the only terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionStatus::Revoked)
    }
}

/// Tokens are always carried as authenticated-encryption ciphertext — see
/// `ehr_core_crypto_vault::SealedToken`. This struct never holds plaintext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub connection_id: String,
    pub user_id: String,
    pub vendor: Vendor,
    pub vendor_patient_id: Option<String>,
    pub fhir_base_url: String,
    pub authorization_url: String,
    pub token_url: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub sealed_client_secret: Option<String>,
    pub sealed_access_token: Option<String>,
    pub sealed_refresh_token: Option<String>,
    pub access_token_expires_at: Option<DateTime<Utc>>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub next_sync_at: Option<DateTime<Utc>>,
    pub sync_frequency_hours: u32,
    pub auto_sync: bool,
    pub status: ConnectionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Connection {
    pub fn is_access_token_fresh(&self, now: DateTime<Utc>, skew: chrono::Duration) -> bool {
        self.access_token_expires_at
            .map(|expiry| expiry - skew > now)
            .unwrap_or(false)
    }

    /// `ACTIVE` requires an unexpired refresh token or access token.
    /// Callers hold the sealed refresh token's
    /// expiry out of band (refresh tokens are typically long-lived and
    /// vendor-issued without a declared expiry); this checks the access
    /// token leg, which is the one the core tracks precisely.
    pub fn has_any_live_token(&self, now: DateTime<Utc>) -> bool {
        self.sealed_refresh_token.is_some() || self.is_access_token_fresh(now, chrono::Duration::zero())
    }
}



