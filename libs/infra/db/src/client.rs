// [libs/infra/db/src/client.rs]
/*!
 * APARATO: DATABASE CONNECTION CLIENT (ESTRATO L3)
 * RESPONSABILIDAD: Gestión de enlaces y persistencia ACID sobre libSQL.
 *
 * In-memory URLs need a held connection to keep SQLite from discarding
 * the schema between calls; that anchor is opened and schema-applied
 * before any pooled connection is handed out.
 */

use crate::errors::DbError;
use crate::schema::apply_schema;
use libsql::{Builder, Connection, Database};
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Clone)]
pub struct DbClient {
    driver: Arc<Database>,
    _memory_anchor: Option<Arc<Connection>>,
}

impl DbClient {
    #[instrument(skip(access_token))]
    pub async fn connect(database_url: &str, access_token: Option<String>) -> Result<Self, DbError> {
        if database_url.is_empty() {
            return Err(DbError::ConfigurationError("DATABASE_URL is unset".into()));
        }

        info!(database_url, "opening database link");

        let is_remote = database_url.starts_with("libsql://") || database_url.starts_with("https://");
        let is_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");

        let driver = if is_remote {
            let token = access_token
                .ok_or_else(|| DbError::ConfigurationError("remote DATABASE_URL requires an access token".into()))?;
            Builder::new_remote(database_url.to_string(), token).build().await
        } else {
            Builder::new_local(database_url).build().await
        }
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;

        let driver = Arc::new(driver);
        let mut anchor = None;

        if is_memory {
            let anchor_conn = driver
                .connect()
                .map_err(|e| DbError::ConnectionError(format!("anchor connect failed: {e}")))?;
            apply_schema(&anchor_conn).await?;
            anchor = Some(Arc::new(anchor_conn));
        } else {
            let bootstrap_conn = driver
                .connect()
                .map_err(|e| DbError::ConnectionError(format!("bootstrap connect failed: {e}")))?;
            apply_schema(&bootstrap_conn).await?;
        }

        Ok(Self {
                driver,
                _memory_anchor: anchor,
            })
    }

    pub fn connection(&self) -> Result<Connection, DbError> {
        self.driver
            .connect()
            .map_err(|e| DbError::ConnectionError(e.to_string()))
    }
}



