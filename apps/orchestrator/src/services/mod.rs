// [apps/orchestrator/src/services/mod.rs]
/*!
 * APARATO: ÍNDICE DE SERVICIOS DE FONDO (ESTRATO L1-APP)
 * RESPONSABILIDAD: Agrupa los daemons de larga duración que el kernel
 * levanta junto al servidor HTTP.
 */

pub mod housekeeping;
