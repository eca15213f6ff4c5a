// [libs/core/auth/src/state_store.rs]
//! Transient storage for `(state, codeVerifier)` pairs bound to a
//! connection id, expiring after 10 minutes.
//!
//! This is process-local, in-memory state: the authorization-code flow
//! completes within a single user session and the orchestrator's HTTP
//! layer is a single process, so a shared
//! map guarded by a mutex is sufficient — no need to round-trip through
//! the durable store for a value that lives minutes at most.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const PENDING_AUTHORIZATION_TTL: Duration = Duration::from_secs(600);

struct PendingAuthorization {
    connection_id: String,
    code_verifier: String,
    expires_at: Instant,
}

#[derive(Default)]
pub struct PendingStateStore {
    by_state: Mutex<HashMap<String, PendingAuthorization>>,
}

impl PendingStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, state: &str, connection_id: &str, code_verifier: &str) {
        let mut guard = self.by_state.lock().expect("state store mutex poisoned");
        guard.retain(|_, pending| pending.expires_at > Instant::now());
        guard.insert(
            state.to_string(),
            PendingAuthorization {
                connection_id: connection_id.to_string(),
                code_verifier: code_verifier.to_string(),
                expires_at: Instant::now() + PENDING_AUTHORIZATION_TTL,
            },
        );
    }

    /// Consumes the pending entry for `state`, returning `(connectionId,
    /// codeVerifier)` when the state is known, unexpired, and bound to
    /// `expected_connection_id`.
    pub fn take(&self, state: &str, expected_connection_id: &str) -> Option<(String, String)> {
        let mut guard = self.by_state.lock().expect("state store mutex poisoned");
        let pending = guard.remove(state)?;
        if pending.expires_at <= Instant::now() {
            return None;
        }
        if pending.connection_id != expected_connection_id {
            return None;
        }
        Some((pending.connection_id, pending.code_verifier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_pending_authorization() {
        let store = PendingStateStore::new();
        store.insert("state-123", "conn-1", "verifier-abc");
        let taken = store.take("state-123", "conn-1").unwrap();
        assert_eq!(taken, ("conn-1".to_string(), "verifier-abc".to_string()));
    }

    #[test]
    fn take_is_single_use() {
        let store = PendingStateStore::new();
        store.insert("state-123", "conn-1", "verifier-abc");
        assert!(store.take("state-123", "conn-1").is_some());
        assert!(store.take("state-123", "conn-1").is_none());
    }

    #[test]
    fn rejects_mismatched_connection() {
        let store = PendingStateStore::new();
        store.insert("state-123", "conn-1", "verifier-abc");
        assert!(store.take("state-123", "conn-2").is_none());
    }

    #[test]
    fn rejects_unknown_state() {
        let store = PendingStateStore::new();
        assert!(store.take("never-seen", "conn-1").is_none());
    }
}



