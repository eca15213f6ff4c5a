// [apps/orchestrator/src/services/housekeeping.rs]
/*!
 * APARATO: HOUSEKEEPING DAEMON (ESTRATO L1-APP)
 * RESPONSABILIDAD: Dispara, bajo arrendamiento de líder, el mantenimiento
 * periódico de telemetría — purga operativa por severidad y antigüedad,
 * rotación de logs externos, y consolidación de huellas expiradas —
 * siguiendo el cron configurado en `CLEANUP_SCHEDULE`.
 */

use std::path::PathBuf;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use ehr_domain_sync_orchestrator::next_tick_after;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::state::AppState;

const LEASE_NAME: &str = "housekeeping-ticker";
const POLL_INTERVAL: StdDuration = StdDuration::from_secs(60);
const LEASE_TTL: chrono::Duration = chrono::Duration::minutes(5);

/// Spawns the background housekeeping loop and returns immediately. Unlike
/// `ehr_domain_sync_orchestrator::ScheduleTicker` this daemon is never
/// stopped cooperatively — it holds no in-flight work that needs a
/// graceful drain, so the process simply takes it down on exit.
pub fn spawn(state: AppState) -> JoinHandle<()> {
    tokio::spawn(run(state))
}

async fn run(state: AppState) {
    let holder_id = Uuid::new_v4().to_string();
    let mut next_due = next_tick_after(&state.telemetry.config().cleanup_schedule, Utc::now());

    loop {
        tokio::time::sleep(POLL_INTERVAL).await;
        let now = Utc::now();

        let due_at = match next_due {
            Some(due_at) => due_at,
            None => {
                warn!(cron = %state.telemetry.config().cleanup_schedule, "housekeeping schedule has no future tick, daemon idling");
                continue;
            }
        };
        if now < due_at {
            continue;
        }

        match run_once(&state, &holder_id, now).await {
            Ok(true) => info!("housekeeping tick complete"),
            Ok(false) => info!("housekeeping tick skipped, another replica holds the lease"),
            Err(error) => error!(%error, "housekeeping tick failed"),
        }

        next_due = next_tick_after(&state.telemetry.config().cleanup_schedule, now);
    }
}

async fn run_once(state: &AppState, holder_id: &str, now: DateTime<Utc>) -> anyhow::Result<bool> {
    let acquired = state.schedules.acquire_lease(LEASE_NAME, holder_id, LEASE_TTL).await?;
    if !acquired {
        return Ok(false);
    }

    let config = state.telemetry.config().clone();

    let purge_summary = ehr_domain_telemetry::purge_operational(&state.errors, &config, now).await?;
    info!(
        total = purge_summary.total(),
        low = purge_summary.low,
        medium = purge_summary.medium,
        high = purge_summary.high,
        critical = purge_summary.critical,
        "operational retention purge",
    );

    if let Ok(log_dir) = std::env::var("LOG_DIR") {
        match ehr_domain_telemetry::rotate_log_directory(&PathBuf::from(log_dir), &config, now) {
            Ok(summary) if summary.files_archived > 0 => info!(archived = summary.files_archived, "log directory rotated"),
            Ok(_) => {}
            Err(error) => error!(%error, "log rotation failed"),
        }
    }

    let dedup_window = chrono::Duration::from_std(config.dedup_window).unwrap_or(LEASE_TTL);
    let merged = state.errors.consolidate_expired(now, dedup_window, config.max_sample_stack_traces).await?;
    if merged > 0 {
        info!(merged_groups = merged, "expired fingerprints consolidated");
    }

    Ok(true)
}
