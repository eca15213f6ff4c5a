// [libs/core/crypto-vault/src/pkce.rs]
//! PKCE (Proof Key for Code Exchange) material and OAuth `state` token
//! generation for the authorization-code flow.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};

const VERIFIER_UNRESERVED: &[u8] =
b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// A generated `(code_verifier, code_challenge)` pair plus the anti-CSRF
/// `state` value, bound server-side to a connection id and expiring after
/// 10 minutes.
#[derive(Debug, Clone)]
pub struct PkcePair {
    pub state: String,
    pub code_verifier: String,
    pub code_challenge: String,
}

/// Generates a cryptographically random `state` with at least 128 bits of
/// entropy, and a 43-128 character unreserved-ASCII code verifier whose
/// S256 code challenge is the base64url-encoded SHA-256 digest.
pub fn generate() -> PkcePair {
    PkcePair {
        state: random_token(32),
        code_verifier: random_verifier(64),
        code_challenge: String::new(),
    }
        .with_challenge()
}

impl PkcePair {
    fn with_challenge(mut self) -> Self {
        self.code_challenge = challenge_for(&self.code_verifier);
        self
    }
}

pub fn challenge_for(code_verifier: &str) -> String {
    let digest = Sha256::digest(code_verifier.as_bytes());
    BASE64_URL.encode(digest)
}

/// `state` only needs CSRF-grade entropy; 32 random bytes base64url-encoded
/// comfortably exceeds the 128-bit entropy floor required of it.
fn random_token(byte_len: usize) -> String {
    let mut bytes = vec![0u8; byte_len];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE64_URL.encode(bytes)
}

/// Builds a verifier of `length` unreserved-ASCII characters, clamped to
/// the 43-128 character range the PKCE spec requires.
fn random_verifier(length: usize) -> String {
    let length = length.clamp(43, 128);
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| {
            let idx = (rng.next_u32() as usize) % VERIFIER_UNRESERVED.len();
            VERIFIER_UNRESERVED[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifier_length_is_in_range() {
        let pair = generate();
        assert!(pair.code_verifier.len() >= 43 && pair.code_verifier.len() <= 128);
    }

    #[test]
    fn challenge_is_deterministic_function_of_verifier() {
        let pair = generate();
        assert_eq!(challenge_for(&pair.code_verifier), pair.code_challenge);
    }

    #[test]
    fn state_values_are_not_repeated() {
        let a = generate();
        let b = generate();
        assert_ne!(a.state, b.state);
        assert_ne!(a.code_verifier, b.code_verifier);
    }
}



