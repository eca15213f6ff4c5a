// [libs/domain/telemetry/src/fingerprint.rs]
//! `fingerprint = hash(normalized message, master code, endpoint)`.

use ehr_domain_models::MasterErrorCode;
use sha2::{Digest, Sha256};

/// Collapses incidental variation (whitespace, digits that are probably
/// ids) so that the same logical error reported with slightly different
/// text still dedups to one fingerprint.
fn normalize(message: &str) -> String {
    let mut normalized = String::with_capacity(message.len());
    let mut last_was_space = false;
    for ch in message.trim().chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                normalized.push(' ');
            }
            last_was_space = true;
        } else if ch.is_ascii_digit() {
            normalized.push('#');
            last_was_space = false;
        } else {
            normalized.extend(ch.to_lowercase());
            last_was_space = false;
        }
    }
    normalized
}

pub fn compute(message: &str, master_code: MasterErrorCode, endpoint: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize(message).as_bytes());
    hasher.update([0u8]);
    hasher.update(format!("{master_code:?}").as_bytes());
    hasher.update([0u8]);
    hasher.update(endpoint.unwrap_or("").as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_logical_message_with_different_ids_collapses() {
        let a = compute("patient 123 fetch failed", MasterErrorCode::EhrFhirError, Some("/ehr/sync"));
        let b = compute("patient 456 fetch failed", MasterErrorCode::EhrFhirError, Some("/ehr/sync"));
        assert_eq!(a, b);
    }

    #[test]
    fn different_endpoints_produce_different_fingerprints() {
        let a = compute("timeout", MasterErrorCode::NetworkError, Some("/ehr/sync"));
        let b = compute("timeout", MasterErrorCode::NetworkError, Some("/ehr/connect"));
        assert_ne!(a, b);
    }
}



