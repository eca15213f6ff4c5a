// [apps/orchestrator/src/kernel.rs]
/*!
 * APARATO: KERNEL HTTP (ESTRATO L1-APP)
 * RESPONSABILIDAD: Une el router de axum con el estado construido por
 * `bootstrap`, sirve hasta recibir SIGINT/SIGTERM, y drena el
 * orquestador de sincronización antes de devolver el control.
 */

use std::net::{IpAddr, SocketAddr};

use ehr_domain_sync_orchestrator::OrchestratorHandle;
use tokio::signal;
use tracing::{error, info, instrument};

use crate::routes::build_router;
use crate::services::housekeeping;
use crate::state::AppState;

pub struct OrchestratorKernel {
    pub port: u16,
    pub state: AppState,
    pub orchestrator_handle: OrchestratorHandle,
}

impl OrchestratorKernel {
    /// Builds the app state (opens the database link, wires every domain
    /// crate, spawns the worker pool and schedule ticker) without binding a
    /// listener yet.
    #[instrument]
    pub async fn ignite(port: u16) -> anyhow::Result<Self> {
        let (state, orchestrator_handle) = crate::bootstrap::build_app_state().await?;
        Ok(Self { port, state, orchestrator_handle })
    }

    /// Binds the HTTP listener, spawns the housekeeping daemon, and serves
    /// until a shutdown signal arrives, then drains the sync orchestrator.
    pub async fn serve(self) -> anyhow::Result<()> {
        housekeeping::spawn(self.state.clone());

        let router = build_router(self.state.clone());
        let bind_address = SocketAddr::new("0.0.0.0".parse::<IpAddr>().unwrap(), self.port);

        let listener = tokio::net::TcpListener::bind(bind_address).await?;
        info!(%bind_address, "orchestrator listening");

        let serve_result = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        info!("shutdown signal received, draining sync orchestrator");
        self.orchestrator_handle.shutdown().await;

        if let Err(server_error) = serve_result {
            error!(error = %server_error, "HTTP server terminated with an error");
            return Err(server_error.into());
        }

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
