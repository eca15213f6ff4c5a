// [libs/infra/transport/src/lib.rs]
/*!
 * APARATO: RETRYING HTTP TRANSPORT (ESTRATO L4)
 * RESPONSABILIDAD: Backoff con jitter, respeto de `Retry-After`, y
 * limitación de tasa por conexión/vendor para el estrato de adaptadores.
 */

pub mod rate_limit;
pub mod retry;

pub use rate_limit::{RateLimiter, RateLimiterRegistry, VendorConcurrencyGate};
pub use retry::{retry_with_backoff, BackoffPolicy, RetryDecision, RetryableError};



