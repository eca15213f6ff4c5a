// [apps/orchestrator/src/main.rs]
/*!
 * APARATO: PUNTO DE ENTRADA DEL ORQUESTADOR (ESTRATO L1-APP)
 * RESPONSABILIDAD: Carga de entorno, inicialización de trazas, y
 * arranque del kernel HTTP.
 */

use dotenvy::dotenv;
use ehr_orchestrator::prelude::*;
use ehr_shared_telemetry_init::init_tracing;
use tracing::{error, info};

fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing("ehr_orchestrator");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_stack_size(4 * 1024 * 1024)
        .build()?;

    runtime.block_on(async {
        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .unwrap_or(3000);

        info!(port, "igniting orchestrator kernel");
        let kernel = match OrchestratorKernel::ignite(port).await {
            Ok(kernel) => kernel,
            Err(error) => {
                error!(%error, "kernel ignition failed");
                std::process::exit(1);
            }
        };

        if let Err(error) = kernel.serve().await {
            error!(%error, "orchestrator terminated with an error");
            std::process::exit(1);
        }

        Ok(())
    })
}
