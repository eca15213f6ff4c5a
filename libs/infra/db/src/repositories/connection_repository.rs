// [libs/infra/db/src/repositories/connection_repository.rs]
/*!
 * APARATO: CONNECTION REPOSITORY (ESTRATO L3)
 * RESPONSABILIDAD: Persistencia de conexiones EHR y su ciclo de vida de
 * tokens.
 */

use crate::errors::DbError;
use crate::mapping::{enum_to_text, opt_rfc3339, parse_opt_rfc3339, parse_rfc3339, text_to_enum, to_rfc3339};
use chrono::{DateTime, Utc};
use ehr_domain_models::{Connection, ConnectionStatus, Vendor};
use libsql::{params, Connection as SqlConnection, Row};
use std::str::FromStr;
use tracing::instrument;
use uuid::Uuid;

pub struct ConnectionRepository {
    connection: SqlConnection,
}

impl ConnectionRepository {
    pub fn new(connection: SqlConnection) -> Self {
        Self { connection }
    }

    #[instrument(skip(self, record))]
    pub async fn create(&self, record: &Connection) -> Result<(), DbError> {
        self.connection
            .execute(
            r#"INSERT INTO connections (
                connection_id, user_id, vendor, vendor_patient_id, fhir_base_url,
                authorization_url, token_url, client_id, redirect_uri, sealed_client_secret,
                sealed_access_token, sealed_refresh_token, access_token_expires_at,
                last_sync_at, next_sync_at, sync_frequency_hours, auto_sync, status,
                created_at, updated_at
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20)"#,
            params![
                record.connection_id.clone(),
                record.user_id.clone(),
                record.vendor.to_string(),
                record.vendor_patient_id.clone(),
                record.fhir_base_url.clone(),
                record.authorization_url.clone(),
                record.token_url.clone(),
                record.client_id.clone(),
                record.redirect_uri.clone(),
                record.sealed_client_secret.clone(),
                record.sealed_access_token.clone(),
                record.sealed_refresh_token.clone(),
                opt_rfc3339(record.access_token_expires_at),
                opt_rfc3339(record.last_sync_at),
                opt_rfc3339(record.next_sync_at),
                record.sync_frequency_hours,
                record.auto_sync as i64,
                enum_to_text(&record.status)?,
                to_rfc3339(record.created_at),
                to_rfc3339(record.updated_at),
            ],
        )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, connection_id: &str) -> Result<Connection, DbError> {
        let mut rows = self
            .connection
            .query("SELECT * FROM connections WHERE connection_id = ?1", params![connection_id])
            .await?;
        let row = rows.next().await?.ok_or(DbError::ConnectionNotFound)?;
        row_to_connection(&row)
    }

    /// Resolves a connection by vendor + the vendor-side patient id, used
    /// when a webhook push names a `Patient` resource and carries no
    /// connection id of its own.
    #[instrument(skip(self))]
    pub async fn find_by_vendor_and_patient_id(&self, vendor: Vendor, vendor_patient_id: &str) -> Result<Connection, DbError> {
        let mut rows = self
            .connection
            .query(
            "SELECT * FROM connections WHERE vendor = ?1 AND vendor_patient_id = ?2",
            params![vendor.to_string(), vendor_patient_id],
        )
            .await?;
        let row = rows.next().await?.ok_or(DbError::ConnectionNotFound)?;
        row_to_connection(&row)
    }

    #[instrument(skip(self))]
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Connection>, DbError> {
        let mut rows = self
            .connection
            .query(
            "SELECT * FROM connections WHERE user_id = ?1 ORDER BY created_at DESC",
            params![user_id],
        )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_connection(&row)?);
        }
        Ok(out)
    }

    #[instrument(skip(self))]
    pub async fn revoke(&self, connection_id: &str) -> Result<(), DbError> {
        let affected = self
            .connection
            .execute(
            "UPDATE connections SET status = 'REVOKED', sealed_access_token = NULL, sealed_refresh_token = NULL, updated_at = CURRENT_TIMESTAMP WHERE connection_id = ?1",
            params![connection_id],
        )
            .await?;
        if affected == 0 {
            return Err(DbError::ConnectionNotFound);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn record_sync_tick(
        &self,
        connection_id: &str,
        last_sync_at: DateTime<Utc>,
        next_sync_at: Option<DateTime<Utc>>,
    ) -> Result<(), DbError> {
        self.connection
            .execute(
            "UPDATE connections SET last_sync_at = ?1, next_sync_at = ?2, updated_at = CURRENT_TIMESTAMP WHERE connection_id = ?3",
            params![to_rfc3339(last_sync_at), opt_rfc3339(next_sync_at), connection_id],
        )
            .await?;
        Ok(())
    }
}

/// Implements the SMART Auth Manager's persistence seam so `ehr-core-auth`
/// never depends on `libsql` directly.
impl ehr_core_auth::ConnectionTokenStore for ConnectionRepository {
    async fn load(&self, connection_id: &str) -> Result<Connection, ehr_core_auth::AuthError> {
        self.find_by_id(connection_id).await.map_err(Into::into)
    }

    async fn save_tokens(
        &self,
        connection_id: &str,
        sealed_access_token: &str,
        sealed_refresh_token: Option<&str>,
        access_token_expires_at: DateTime<Utc>,
    ) -> Result<(), ehr_core_auth::AuthError> {
        let result: Result<(), DbError> = async {
            self.connection
                .execute(
                r#"UPDATE connections SET
                    sealed_access_token = ?1,
                    sealed_refresh_token = COALESCE(?2, sealed_refresh_token),
                    access_token_expires_at = ?3,
                    updated_at = CURRENT_TIMESTAMP
                    WHERE connection_id = ?4"#,
                params![
                    sealed_access_token,
                    sealed_refresh_token,
                    to_rfc3339(access_token_expires_at),
                    connection_id
                ],
            )
                .await?;
            Ok(())
        }
            .await;
        result.map_err(Into::into)
    }

    async fn set_status(
        &self,
        connection_id: &str,
        status: ConnectionStatus,
    ) -> Result<(), ehr_core_auth::AuthError> {
        let result: Result<(), DbError> = async {
            let status_text = enum_to_text(&status)?;
            self.connection
                .execute(
                "UPDATE connections SET status = ?1, updated_at = CURRENT_TIMESTAMP WHERE connection_id = ?2",
                params![status_text, connection_id],
            )
                .await?;
            Ok(())
        }
            .await;
        result.map_err(Into::into)
    }
}

pub fn new_connection_id() -> String {
    Uuid::new_v4().to_string()
}

fn row_to_connection(row: &Row) -> Result<Connection, DbError> {
    let vendor_tag: String = row.get(2)?;
    let access_expiry: Option<String> = row.get(12)?;
    let last_sync: Option<String> = row.get(13)?;
    let next_sync: Option<String> = row.get(14)?;
    let status_text: String = row.get(17)?;
    let created_at: String = row.get(18)?;
    let updated_at: String = row.get(19)?;

    Ok(Connection {
            connection_id: row.get(0)?,
            user_id: row.get(1)?,
            vendor: Vendor::from_str(&vendor_tag).map_err(DbError::MappingError)?,
            vendor_patient_id: row.get(3)?,
            fhir_base_url: row.get(4)?,
            authorization_url: row.get(5)?,
            token_url: row.get(6)?,
            client_id: row.get(7)?,
            redirect_uri: row.get(8)?,
            sealed_client_secret: row.get(9)?,
            sealed_access_token: row.get(10)?,
            sealed_refresh_token: row.get(11)?,
            access_token_expires_at: parse_opt_rfc3339(access_expiry)?,
            last_sync_at: parse_opt_rfc3339(last_sync)?,
            next_sync_at: parse_opt_rfc3339(next_sync)?,
            sync_frequency_hours: row.get::<i64>(15)? as u32,
            auto_sync: row.get::<i64>(16)? != 0,
            status: text_to_enum(&status_text)?,
            created_at: parse_rfc3339(&created_at)?,
            updated_at: parse_rfc3339(&updated_at)?,
        })
}



