// [libs/core/crypto-vault/src/lib.rs]
/*!
 * APARATO: TOKEN SEALING VAULT (ESTRATO L1)
 * RESPONSABILIDAD: Authenticated encryption of OAuth access/refresh
 * tokens before they touch the datastore.
 *
 * The process key comes from `ENCRYPTION_KEY` (32 raw bytes). Sealing
 * generates a fresh random nonce per call and stores it alongside the
 * ciphertext as `base64(nonce || ciphertext)`; unsealing splits the two
 * back apart. Keyed directly from 32 raw bytes rather than a
 * passphrase-derived one, since the key here never leaves the process
 * (see DESIGN.md).
 */

pub mod pkce;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use thiserror::Error;

pub const KEY_LENGTH_BYTES: usize = 32;
const NONCE_LENGTH_BYTES: usize = 12;

#[derive(Error, Debug)]
pub enum VaultError {
    #[error("ENCRYPTION_KEY_INVALID_LENGTH: expected {KEY_LENGTH_BYTES} bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("BASE64_DECODE_FAULT: {0}")]
    EncodingError(#[from] base64::DecodeError),
    #[error("CIPHERTEXT_TOO_SHORT: missing nonce prefix")]
    Truncated,
    #[error("SEAL_FAILED: authenticated encryption rejected the input")]
    SealFailed,
    #[error("UNSEAL_FAILED: integrity check failed or key mismatch")]
    UnsealFailed,
}

#[derive(Clone)]
pub struct TokenVault {
    cipher: Aes256Gcm,
}

impl TokenVault {
    pub fn new(key_bytes: &[u8]) -> Result<Self, VaultError> {
        if key_bytes.len() != KEY_LENGTH_BYTES {
            return Err(VaultError::InvalidKeyLength(key_bytes.len()));
        }
        let key = Key::<Aes256Gcm>::from_slice(key_bytes);
        Ok(Self {
                cipher: Aes256Gcm::new(key),
            })
    }

    pub fn from_env(var: &str) -> Result<Self, VaultError> {
        let raw = std::env::var(var).unwrap_or_default();
        let key_bytes = BASE64
            .decode(&raw)
            .unwrap_or_else(|_| raw.into_bytes());
        Self::new(&key_bytes)
    }

    /// Seals plaintext into `base64(nonce || ciphertext)`.
    pub fn seal(&self, plaintext: &str) -> Result<String, VaultError> {
        let mut nonce_bytes = [0u8; NONCE_LENGTH_BYTES];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| VaultError::SealFailed)?;

        let mut combined = Vec::with_capacity(NONCE_LENGTH_BYTES + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(combined))
    }

    pub fn unseal(&self, sealed: &str) -> Result<String, VaultError> {
        let combined = BASE64.decode(sealed)?;
        if combined.len() < NONCE_LENGTH_BYTES {
            return Err(VaultError::Truncated);
        }
        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LENGTH_BYTES);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| VaultError::UnsealFailed)?;

        String::from_utf8(plaintext).map_err(|_| VaultError::UnsealFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_vault() -> TokenVault {
        TokenVault::new(&[7u8; KEY_LENGTH_BYTES]).unwrap()
    }

    #[test]
    fn seal_then_unseal_round_trips() {
        let vault = test_vault();
        let sealed = vault.seal("access-token-value").unwrap();
        assert_ne!(sealed, "access-token-value");
        assert_eq!(vault.unseal(&sealed).unwrap(), "access-token-value");
    }

    #[test]
    fn unseal_rejects_tampered_ciphertext() {
        let vault = test_vault();
        let mut sealed = vault.seal("secret").unwrap();
        sealed.push('A');
        assert!(vault.unseal(&sealed).is_err());
    }

    #[test]
    fn wrong_key_cannot_unseal() {
        let a = TokenVault::new(&[1u8; KEY_LENGTH_BYTES]).unwrap();
        let b = TokenVault::new(&[2u8; KEY_LENGTH_BYTES]).unwrap();
        let sealed = a.seal("secret").unwrap();
        assert!(b.unseal(&sealed).is_err());
    }

    #[test]
    fn rejects_short_keys() {
        assert!(matches!(
                TokenVault::new(&[0u8; 16]),
                Err(VaultError::InvalidKeyLength(16))
            ));
    }
}



