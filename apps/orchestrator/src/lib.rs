// [apps/orchestrator/src/lib.rs]
/*!
 * APARATO: ORCHESTRATOR COMPOSITION ROOT (ESTRATO L0)
 * RESPONSABILIDAD: Árbol de módulos del binario HTTP — arranque,
 * estado compartido, rutas, middleware perimetral, y los daemons de
 * fondo que mantienen la cola de sincronización y el housekeeping de
 * telemetría en marcha.
 */

pub mod bootstrap;
pub mod handlers;
pub mod kernel;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub mod prelude {
    pub use crate::kernel::OrchestratorKernel;
    pub use crate::state::{AppState, SystemMode};
}
