// [libs/infra/db/src/schema.rs]
/*!
 * APARATO: SCHEMA GOVERNANCE (ESTRATO L3)
 * RESPONSABILIDAD: Creación idempotente de las tablas del núcleo de
 * integración EHR.
 */

use crate::errors::DbError;
use libsql::Connection;
use tracing::{debug, instrument};

const TABLES: &[(&str, &str)] = &[
    ("connections", r#"
        CREATE TABLE IF NOT EXISTS connections (
        connection_id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        vendor TEXT NOT NULL,
        vendor_patient_id TEXT,
        fhir_base_url TEXT NOT NULL,
        authorization_url TEXT NOT NULL,
        token_url TEXT NOT NULL,
        client_id TEXT NOT NULL,
        redirect_uri TEXT NOT NULL,
        sealed_client_secret TEXT,
        sealed_access_token TEXT,
        sealed_refresh_token TEXT,
        access_token_expires_at TEXT,
        last_sync_at TEXT,
        next_sync_at TEXT,
        sync_frequency_hours INTEGER NOT NULL DEFAULT 24,
        auto_sync INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'PENDING_AUTH',
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        "#),
    ("jobs", r#"
        CREATE TABLE IF NOT EXISTS jobs (
        job_id TEXT PRIMARY KEY,
        job_type TEXT NOT NULL,
        direction TEXT NOT NULL,
        priority INTEGER NOT NULL DEFAULT 3,
        status TEXT NOT NULL DEFAULT 'PENDING',
        connection_id TEXT NOT NULL,
        resource_type_filter TEXT,
        resource_id_filter TEXT,
        filter_json TEXT NOT NULL DEFAULT '{}',
        options_json TEXT NOT NULL,
        started_at TEXT,
        ended_at TEXT,
        processed_count INTEGER NOT NULL DEFAULT 0,
        succeeded_count INTEGER NOT NULL DEFAULT 0,
        failed_count INTEGER NOT NULL DEFAULT 0,
        skipped_count INTEGER NOT NULL DEFAULT 0,
        summary_json TEXT NOT NULL DEFAULT '{"created":0,"updated":0,"deleted":0,"bytes":0}',
        retry_count INTEGER NOT NULL DEFAULT 0,
        status_url TEXT,
        worker_id TEXT,
        heartbeat_at TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        "#),
    ("fhir_resources", r#"
        CREATE TABLE IF NOT EXISTS fhir_resources (
        local_id TEXT PRIMARY KEY,
        connection_id TEXT NOT NULL,
        resource_type TEXT NOT NULL,
        vendor_resource_id TEXT NOT NULL,
        raw_payload BLOB NOT NULL,
        title TEXT,
        resource_date TEXT,
        category TEXT,
        resource_status TEXT,
        content_type TEXT,
        source_url TEXT,
        download_state TEXT NOT NULL DEFAULT 'PENDING',
        local_file_path TEXT,
        line_offset INTEGER NOT NULL DEFAULT 0,
        processed INTEGER NOT NULL DEFAULT 0,
        last_update_observed TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE(connection_id, vendor_resource_id, resource_type)
        );
        "#),
    ("transformation_rules", r#"
        CREATE TABLE IF NOT EXISTS transformation_rules (
        rule_id TEXT PRIMARY KEY,
        vendor TEXT NOT NULL,
        resource_type TEXT NOT NULL,
        direction TEXT NOT NULL,
        kind TEXT NOT NULL,
        source_format TEXT,
        target_format TEXT,
        source_field_path TEXT,
        target_field_path TEXT,
        mapping_table_json TEXT,
        expression TEXT,
        priority INTEGER NOT NULL DEFAULT 100,
        enabled INTEGER NOT NULL DEFAULT 1
        );
        "#),
    ("conflicts", r#"
        CREATE TABLE IF NOT EXISTS conflicts (
        conflict_id TEXT PRIMARY KEY,
        resource_type TEXT NOT NULL,
        resource_id TEXT NOT NULL,
        field_path TEXT NOT NULL,
        local_value TEXT,
        remote_value TEXT,
        detected_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        resolution TEXT,
        resolved_value TEXT,
        resolver_identity TEXT,
        resolved_at TEXT
        );
        "#),
    ("error_records", r#"
        CREATE TABLE IF NOT EXISTS error_records (
        fingerprint TEXT PRIMARY KEY,
        master_code TEXT NOT NULL,
        severity TEXT NOT NULL,
        message TEXT NOT NULL,
        endpoint TEXT,
        first_seen TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        last_seen TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        occurrence_count INTEGER NOT NULL DEFAULT 1,
        sample_stack_traces_json TEXT NOT NULL DEFAULT '[]'
        );
        "#),
    ("compliance_incidents", r#"
        CREATE TABLE IF NOT EXISTS compliance_incidents (
        incident_number TEXT PRIMARY KEY,
        severity TEXT NOT NULL,
        category TEXT NOT NULL,
        description TEXT NOT NULL,
        regulated_data_exposed INTEGER NOT NULL DEFAULT 0,
        record_count_affected INTEGER NOT NULL DEFAULT 0,
        investigation_status TEXT NOT NULL DEFAULT 'DETECTED',
        assigned_to TEXT,
        reported_to_regulator_at TEXT,
        breach_notification_at TEXT,
        audit_log_ref TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        "#),
    ("compliance_incident_counters", r#"
        CREATE TABLE IF NOT EXISTS compliance_incident_counters (
        incident_year INTEGER PRIMARY KEY,
        last_sequence INTEGER NOT NULL DEFAULT 0
        );
        "#),
    ("sync_schedules", r#"
        CREATE TABLE IF NOT EXISTS sync_schedules (
        schedule_id TEXT PRIMARY KEY,
        connection_id TEXT NOT NULL,
        cron_spec TEXT NOT NULL,
        job_template_json TEXT NOT NULL,
        next_tick_at TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        "#),
    ("leader_leases", r#"
        CREATE TABLE IF NOT EXISTS leader_leases (
        lease_name TEXT PRIMARY KEY,
        holder_id TEXT NOT NULL,
        expires_at TEXT NOT NULL
        );
        "#),
    ("bulk_export_manifests", r#"
        CREATE TABLE IF NOT EXISTS bulk_export_manifests (
        job_id TEXT PRIMARY KEY,
        transaction_time TEXT,
        output_json TEXT NOT NULL DEFAULT '[]',
        error_json TEXT NOT NULL DEFAULT '[]',
        fetched_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        "#),
    ("bulk_export_files", r#"
        CREATE TABLE IF NOT EXISTS bulk_export_files (
        job_id TEXT NOT NULL,
        resource_type TEXT NOT NULL,
        file_url TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'PENDING',
        line_offset INTEGER NOT NULL DEFAULT 0,
        resource_count INTEGER,
        error_message TEXT,
        PRIMARY KEY (job_id, file_url)
        );
        "#),
];

const INDEXES: &[(&str, &str)] = &[
    ("idx_jobs_queue", "CREATE INDEX IF NOT EXISTS idx_jobs_queue ON jobs(status, priority, created_at);"),
    ("idx_jobs_connection", "CREATE INDEX IF NOT EXISTS idx_jobs_connection ON jobs(connection_id, status);"),
    ("idx_resources_connection", "CREATE INDEX IF NOT EXISTS idx_resources_connection ON fhir_resources(connection_id, resource_type);"),
    ("idx_rules_lookup", "CREATE INDEX IF NOT EXISTS idx_rules_lookup ON transformation_rules(vendor, resource_type, direction, priority);"),
    ("idx_error_records_severity", "CREATE INDEX IF NOT EXISTS idx_error_records_severity ON error_records(severity, last_seen);"),
    ("idx_connections_user", "CREATE INDEX IF NOT EXISTS idx_connections_user ON connections(user_id);"),
    ("idx_bulk_export_files_job", "CREATE INDEX IF NOT EXISTS idx_bulk_export_files_job ON bulk_export_files(job_id, status);"),
];

#[instrument(skip(connection))]
pub async fn apply_schema(connection: &Connection) -> Result<(), DbError> {
    for (name, sql) in TABLES {
        debug!(table = name, "applying table");
        connection
            .execute(sql, ())
            .await
            .map_err(|e| DbError::ConnectionError(format!("schema table {name} failed: {e}")))?;
    }
    for (name, sql) in INDEXES {
        debug!(index = name, "applying index");
        connection
            .execute(sql, ())
            .await
            .map_err(|e| DbError::ConnectionError(format!("schema index {name} failed: {e}")))?;
    }
    Ok(())
}



