// [libs/domain/telemetry/src/retention.rs]
//! Scheduled housekeeping: operational-record purge by severity/age, and
//! the size-threshold decision for external log rotation. Compliance incidents are never touched here —
//! they have no retention-based deletion path.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ehr_domain_models::Severity;
use ehr_infra_db::ErrorRepository;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{info, instrument, warn};

use crate::config::TelemetryConfig;
use crate::errors::TelemetryError;

#[derive(Debug, Clone, Default)]
pub struct PurgeSummary {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
    pub critical: u64,
}

impl PurgeSummary {
    pub fn total(&self) -> u64 {
        self.low + self.medium + self.high + self.critical
    }
}

/// Deletes operational error records older than each severity's retention
/// window.
#[instrument(skip(errors, config))]
pub async fn purge_operational(errors: &Arc<ErrorRepository>, config: &TelemetryConfig, now: DateTime<Utc>) -> Result<PurgeSummary, TelemetryError> {
    let mut summary = PurgeSummary::default();
    for severity in [Severity::Low, Severity::Medium, Severity::High, Severity::Critical] {
        let before = now - chrono::Duration::days(config.retention_days.for_severity(severity));
        let affected = errors.purge_older_than(severity, before).await?;
        match severity {
            Severity::Low => summary.low = affected,
            Severity::Medium => summary.medium = affected,
            Severity::High => summary.high = affected,
            Severity::Critical => summary.critical = affected,
        }
    }
    info!(total = summary.total(), "operational retention purge complete");
    Ok(summary)
}

/// Whether an external log file's accumulated size crosses the
/// configured rotation threshold. The core only makes this
/// decision; the actual rotate-and-compress step belongs to whatever
/// writes the log files, outside this crate.
pub fn rotation_due(total_size_bytes: u64, ceiling_mb: u64, threshold_fraction: f64) -> bool {
    let ceiling_bytes = ceiling_mb.saturating_mul(1024 * 1024);
    if ceiling_bytes == 0 {
        return false;
    }
    (total_size_bytes as f64) >= (ceiling_bytes as f64) * threshold_fraction
}

#[derive(Debug, Clone, Default)]
pub struct RotationSummary {
    pub files_archived: u64,
    pub bytes_before: u64,
}

/// Sums `*.log` file sizes under `log_dir` and, if `rotation_due`, gzips
/// each into `<name>.log.gz.<unix-timestamp>` and truncates the source file
/// in place so writers holding an open handle keep appending without
/// re-opening. Missing `log_dir` is a no-op, not an error — not every
/// deployment writes logs to disk instead of stdout.
#[instrument(skip(config))]
pub fn rotate_log_directory(log_dir: &Path, config: &TelemetryConfig, now: DateTime<Utc>) -> io::Result<RotationSummary> {
    if !log_dir.is_dir() {
        return Ok(RotationSummary::default());
    }

    let log_files: Vec<PathBuf> = fs::read_dir(log_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("log"))
        .collect();

    let total_size: u64 = log_files.iter().filter_map(|path| fs::metadata(path).ok()).map(|meta| meta.len()).sum();

    if !rotation_due(total_size, config.log_ceiling_mb, config.log_rotation_threshold) {
        return Ok(RotationSummary { files_archived: 0, bytes_before: total_size });
    }

    let mut archived = 0;
    for path in &log_files {
        if let Err(error) = compress_and_truncate(path, now) {
            warn!(path = %path.display(), %error, "log rotation failed for file");
            continue;
        }
        archived += 1;
    }

    info!(total_size, archived, "log directory rotated");
    Ok(RotationSummary { files_archived: archived, bytes_before: total_size })
}

fn compress_and_truncate(path: &Path, now: DateTime<Utc>) -> io::Result<()> {
    let mut source = File::open(path)?;
    let mut contents = Vec::new();
    source.read_to_end(&mut contents)?;
    drop(source);

    let archive_path = path.with_extension(format!("log.gz.{}", now.timestamp()));
    let archive_file = File::create(&archive_path)?;
    let mut encoder = GzEncoder::new(archive_file, Compression::default());
    encoder.write_all(&contents)?;
    encoder.finish()?;

    File::create(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_triggers_past_threshold() {
        let ceiling_mb = 100;
        let eighty_percent = 80 * 1024 * 1024;
        assert!(rotation_due(eighty_percent, ceiling_mb, 0.8));
        assert!(!rotation_due(eighty_percent - 1, ceiling_mb, 0.8));
    }

    #[test]
    fn zero_ceiling_never_rotates() {
        assert!(!rotation_due(u64::MAX, 0, 0.8));
    }
}



