// [apps/orchestrator/src/bin/migrator.rs]
/*!
 * APARATO: CLI DE MIGRACIÓN DE ESQUEMA (ESTRATO L6)
 * RESPONSABILIDAD: Aplica el esquema completo contra `DATABASE_URL`,
 * idempotente vía `CREATE TABLE IF NOT EXISTS`/`CREATE INDEX IF NOT
 * EXISTS` — seguro de reejecutar en cada despliegue.
 */

use dotenvy::dotenv;
use ehr_infra_db::schema::apply_schema;
use ehr_infra_db::DbClient;
use ehr_shared_telemetry_init::init_tracing;
use tracing::{error, info};

fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing("ehr_migrator");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_stack_size(4 * 1024 * 1024)
        .build()?;

    runtime.block_on(async {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL is not set");
        let access_token = std::env::var("TURSO_AUTH_TOKEN").ok();

        info!("connecting to database");
        let client = DbClient::connect(&database_url, access_token).await?;
        let connection = client.connection()?;

        match apply_schema(&connection).await {
            Ok(()) => {
                info!("schema applied");
                Ok(())
            }
            Err(error) => {
                error!(%error, "schema application failed");
                std::process::exit(1);
            }
        }
    })
}
