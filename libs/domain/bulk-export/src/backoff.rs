// [libs/domain/bulk-export/src/backoff.rs]
//! Poll cadence for `PollExport`: start at 30s, double each miss to a
//! ceiling of 5 minutes, respecting a server `Retry-After` when the vendor
//! supplies one.

use std::time::Duration;

const INITIAL: Duration = Duration::from_secs(30);
const CEILING: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy)]
pub struct PollBackoff {
    current: Duration,
}

impl Default for PollBackoff {
    fn default() -> Self {
        Self { current: INITIAL }
    }
}

impl PollBackoff {
    /// The delay to wait before the next poll; advances the internal
    /// cadence for the call after. A server-supplied `Retry-After`
    /// overrides the computed delay outright but does not reset the
    /// progression.
    pub fn next_delay(&mut self, retry_after: Option<Duration>) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(CEILING);
        retry_after.unwrap_or(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_to_ceiling() {
        let mut backoff = PollBackoff::default();
        assert_eq!(backoff.next_delay(None), Duration::from_secs(30));
        assert_eq!(backoff.next_delay(None), Duration::from_secs(60));
        assert_eq!(backoff.next_delay(None), Duration::from_secs(120));
        assert_eq!(backoff.next_delay(None), Duration::from_secs(240));
        assert_eq!(backoff.next_delay(None), Duration::from_secs(300));
        assert_eq!(backoff.next_delay(None), Duration::from_secs(300));
    }

    #[test]
    fn retry_after_overrides_without_resetting_progression() {
        let mut backoff = PollBackoff::default();
        assert_eq!(backoff.next_delay(Some(Duration::from_secs(5))), Duration::from_secs(5));
        assert_eq!(backoff.next_delay(None), Duration::from_secs(60));
    }
}



