// [libs/core/auth/src/errors.rs]
//! Error catalog for the SMART Auth Manager.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("[L1_AUTH_STATE_FAULT]: INVALID_STATE -> state does not match a pending authorization")]
    InvalidState,

    #[error("[L1_AUTH_STATE_FAULT]: STATE_EXPIRED -> pending authorization expired")]
    StateExpired,

    #[error("[L1_AUTH_EXCHANGE_FAULT]: AUTH_EXCHANGE_FAILED -> {0}")]
    AuthExchangeFailed(String),

    #[error("[L1_AUTH_REFRESH_FAULT]: REFRESH_FAILED -> {0}")]
    RefreshFailed(String),

    #[error("[L1_AUTH_REFRESH_FAULT]: INVALID_GRANT -> refresh token rejected by vendor")]
    InvalidGrant,

    #[error("[L1_AUTH_VAULT_FAULT]: {0}")]
    Vault(#[from] ehr_core_crypto_vault::VaultError),

    #[error("[L1_AUTH_TOKEN_FAULT]: NO_LIVE_TOKEN -> connection has neither a fresh access token nor a refresh token")]
    NoLiveToken,

    #[error("[L1_AUTH_TRANSPORT_FAULT]: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("[L1_AUTH_PARSE_FAULT]: {0}")]
    MalformedTokenResponse(String),
}

impl ehr_infra_transport::RetryableError for AuthError {
    /// Only the token-endpoint network/5xx leg is transient; invalid_grant,
    /// bad state, and malformed bodies are not.
    fn is_transient(&self) -> bool {
        matches!(self, AuthError::Transport(_) | AuthError::AuthExchangeFailed(_))
    }
}
