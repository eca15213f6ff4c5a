// [apps/orchestrator/src/handlers/mod.rs]
/*!
 * APARATO: ÍNDICE DE HANDLERS (ESTRATO L4)
 * RESPONSABILIDAD: Agrupa los handlers de axum por área de la API externa
 *: conexiones, sincronización, bulk export, webhooks de
 * vendor y administración.
 */

pub mod admin;
pub mod bulk_export;
pub mod connections;
pub mod sync;
pub mod webhooks;



