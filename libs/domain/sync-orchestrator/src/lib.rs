// [libs/domain/sync-orchestrator/src/lib.rs]
/*!
 * APARATO: SYNC ORCHESTRATOR (ESTRATO L2)
 * RESPONSABILIDAD: Cola de jobs durable y priorizada, pool de workers, y
 * disparador de schedules recurrentes.
 */

pub mod cancellation;
pub mod config;
pub mod cron_spec;
pub mod errors;
pub mod executor;
pub mod orchestrator;
pub mod scheduler;
pub mod worker;

pub use cancellation::CancellationToken;
pub use config::OrchestratorConfig;
pub use cron_spec::{next_tick_after, CronSchedule, CronSpecError};
pub use errors::{JobExecutionError, OrchestratorError};
pub use executor::{BoxFuture, JobExecutor, JobProgress, ProgressReporter};
pub use orchestrator::{EnqueueRequest, OrchestratorHandle, SyncOrchestrator};
pub use scheduler::ScheduleTicker;
pub use worker::WorkerPool;



