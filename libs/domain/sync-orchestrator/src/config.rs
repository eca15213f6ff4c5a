// [libs/domain/sync-orchestrator/src/config.rs]
use std::time::Duration;

use ehr_infra_transport::BackoffPolicy;

/// Tuning knobs for the worker pool, schedule ticker, and shutdown drain.
/// Defaults: a 5-minute heartbeat, twice that for
/// the zombie threshold already enforced in `ehr-infra-db`.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Number of concurrent worker loops claiming jobs.
    pub worker_count: usize,
    /// How long an idle worker sleeps between `claim_next` attempts when
    /// the queue was empty.
    pub poll_interval: Duration,
    /// Cadence at which a worker renews the heartbeat of the job it is
    /// currently processing.
    pub heartbeat_interval: Duration,
    /// How often the zombie reaper scans for stale `PROCESSING` jobs.
    pub zombie_scan_interval: Duration,
    /// `Enqueue` is refused once active (non-terminal) job count reaches
    /// this.
    pub queue_high_water_mark: u64,
    /// Backoff applied between a transient job failure and its automatic
    /// retry.
    pub retry_backoff: BackoffPolicy,
    /// How often the schedule ticker checks for due `SyncSchedule`s.
    pub schedule_tick_interval: Duration,
    /// TTL of the single leader lease guarding schedule ticking.
    pub schedule_lease_ttl: Duration,
    /// Grace period graceful shutdown waits for in-flight jobs before
    /// returning.
    pub shutdown_grace_period: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            poll_interval: Duration::from_millis(500),
            heartbeat_interval: Duration::from_secs(5 * 60),
            zombie_scan_interval: Duration::from_secs(60),
            queue_high_water_mark: 10_000,
            retry_backoff: BackoffPolicy::default().with_max_attempts(5),
            schedule_tick_interval: Duration::from_secs(30),
            schedule_lease_ttl: Duration::from_secs(90),
            shutdown_grace_period: Duration::from_secs(30),
        }
    }
}



