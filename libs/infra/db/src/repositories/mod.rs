// [libs/infra/db/src/repositories/mod.rs]
//! One repository per aggregate root.

pub mod bulk_export_repository;
pub mod compliance_repository;
pub mod conflict_repository;
pub mod connection_repository;
pub mod error_repository;
pub mod job;
pub mod resource_repository;
pub mod rule_repository;
pub mod schedule_repository;

pub use bulk_export_repository::{BulkExportFile, BulkExportFileStatus, BulkExportRepository, ManifestFileRecord};
pub use compliance_repository::ComplianceRepository;
pub use conflict_repository::ConflictRepository;
pub use connection_repository::ConnectionRepository;
pub use error_repository::ErrorRepository;
pub use job::{JobRepository, queries as job_queries};
pub use resource_repository::ResourceRepository;
pub use rule_repository::RuleRepository;
pub use schedule_repository::{JobTemplate, ScheduleRepository, SyncSchedule};



