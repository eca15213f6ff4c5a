// [libs/infra/transport/src/rate_limit.rs]
//! Per-connection request spacing and per-vendor concurrency ceilings.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};

/// Token-bucket-ish limiter enforcing a minimum spacing between requests
/// on a single connection. Vendors that document a flat rate (e.g. "10
/// req/s") are modeled as `interval = 1s / 10`; vendors that document a
/// minimum gap between calls use that gap directly.
#[derive(Clone)]
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    pub fn per_second(requests_per_second: u32) -> Self {
        let interval = if requests_per_second == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(1.0 / requests_per_second as f64)
        };
        Self::new(interval)
    }

    /// Blocks until at least `min_interval` has elapsed since the last
    /// permit was granted on this limiter, then grants one.
    pub async fn acquire(&self) {
        if self.min_interval.is_zero() {
            return;
        }
        let mut guard = self.last_request.lock().await;
        if let Some(last) = *guard {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *guard = Some(Instant::now());
    }
}

/// Caps the number of concurrent in-flight requests to a single vendor
/// across all connections and workers, independent of per-connection
/// spacing.
pub struct VendorConcurrencyGate {
    semaphore: Arc<Semaphore>,
}

impl VendorConcurrencyGate {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub async fn acquire(&self) -> tokio::sync::OwnedSemaphorePermit {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore is never closed")
    }
}

/// Keeps one `RateLimiter` per connection id and one `VendorConcurrencyGate`
/// per vendor, lazily created on first use so the adapter layer doesn't
/// need to know the full connection/vendor set up front.
pub struct RateLimiterRegistry {
    per_connection: Mutex<HashMap<String, RateLimiter>>,
    per_vendor_gate: Mutex<HashMap<String, Arc<VendorConcurrencyGate>>>,
    default_interval: Duration,
    default_concurrency: usize,
}

impl RateLimiterRegistry {
    pub fn new(default_interval: Duration, default_concurrency: usize) -> Self {
        Self {
            per_connection: Mutex::new(HashMap::new()),
            per_vendor_gate: Mutex::new(HashMap::new()),
            default_interval,
            default_concurrency,
        }
    }

    pub async fn limiter_for_connection(&self, connection_id: &str) -> RateLimiter {
        let mut map = self.per_connection.lock().await;
        map.entry(connection_id.to_string())
            .or_insert_with(|| RateLimiter::new(self.default_interval))
            .clone()
    }

    pub async fn gate_for_vendor(&self, vendor: &str) -> Arc<VendorConcurrencyGate> {
        let mut map = self.per_vendor_gate.lock().await;
        map.entry(vendor.to_string())
            .or_insert_with(|| Arc::new(VendorConcurrencyGate::new(self.default_concurrency)))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rate_limiter_spaces_requests() {
        let limiter = RateLimiter::new(Duration::from_millis(30));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn zero_interval_never_blocks() {
        let limiter = RateLimiter::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(20));
    }

    #[tokio::test]
    async fn concurrency_gate_caps_in_flight_permits() {
        let gate = VendorConcurrencyGate::new(2);
        let _a = gate.acquire().await;
        let _b = gate.acquire().await;
        assert_eq!(gate.semaphore.available_permits(), 0);
    }

    #[tokio::test]
    async fn registry_reuses_limiter_per_connection() {
        let registry = RateLimiterRegistry::new(Duration::from_millis(10), 4);
        let a = registry.limiter_for_connection("conn-1").await;
        let b = registry.limiter_for_connection("conn-1").await;
        let start = Instant::now();
        a.acquire().await;
        b.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(10));
    }
}



