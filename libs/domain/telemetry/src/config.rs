// [libs/domain/telemetry/src/config.rs]
use std::time::Duration;

use ehr_domain_models::Severity;

/// Tuning knobs for deduplication and retention, sourced from the
/// environment at boot.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub dedup_window: Duration,
    pub max_sample_stack_traces: usize,
    pub retention_days: RetentionDays,
    /// Total-size ceiling for an external log directory, in megabytes.
    pub log_ceiling_mb: u64,
    /// Fraction of `log_ceiling_mb` that triggers rotation.
    pub log_rotation_threshold: f64,
    /// Cron spec for the housekeeping daemon's purge/rotate/dedup tick.
    pub cleanup_schedule: String,
}

#[derive(Debug, Clone, Copy)]
pub struct RetentionDays {
    pub low: i64,
    pub medium: i64,
    pub high: i64,
    pub critical: i64,
}

impl RetentionDays {
    pub fn for_severity(self, severity: Severity) -> i64 {
        match severity {
            Severity::Low => self.low,
            Severity::Medium => self.medium,
            Severity::High => self.high,
            Severity::Critical => self.critical,
        }
    }
}

impl Default for RetentionDays {
    fn default() -> Self {
        Self { low: 30, medium: 90, high: 180, critical: 365 }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            dedup_window: Duration::from_secs(5 * 60),
            max_sample_stack_traces: 3,
            retention_days: RetentionDays::default(),
            log_ceiling_mb: 512,
            log_rotation_threshold: 0.8,
            cleanup_schedule: "0 2 * * *".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Overlays `ERROR_DEDUP_WINDOW_MINUTES`, `{SEVERITY}_ERROR_RETENTION_DAYS`,
    /// `MAX_LOG_FILE_SIZE_MB`, `LOG_ROTATION_THRESHOLD`, and `CLEANUP_SCHEDULE`
    /// onto the defaults; an unset or unparseable variable keeps its default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            dedup_window: env_u64("ERROR_DEDUP_WINDOW_MINUTES").map(|m| Duration::from_secs(m * 60)).unwrap_or(defaults.dedup_window),
            max_sample_stack_traces: defaults.max_sample_stack_traces,
            retention_days: RetentionDays {
                low: env_i64("LOW_ERROR_RETENTION_DAYS").unwrap_or(defaults.retention_days.low),
                medium: env_i64("MEDIUM_ERROR_RETENTION_DAYS").unwrap_or(defaults.retention_days.medium),
                high: env_i64("HIGH_ERROR_RETENTION_DAYS").unwrap_or(defaults.retention_days.high),
                critical: env_i64("CRITICAL_ERROR_RETENTION_DAYS").unwrap_or(defaults.retention_days.critical),
            },
            log_ceiling_mb: env_u64("MAX_LOG_FILE_SIZE_MB").unwrap_or(defaults.log_ceiling_mb),
            log_rotation_threshold: std::env::var("LOG_ROTATION_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.log_rotation_threshold),
            cleanup_schedule: std::env::var("CLEANUP_SCHEDULE").unwrap_or(defaults.cleanup_schedule),
        }
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_i64(key: &str) -> Option<i64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}



