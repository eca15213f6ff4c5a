// [libs/domain/transform/src/lib.rs]
/*!
 * APARATO: TRANSFORMATION & CONFLICT ENGINE (ESTRATO L2)
 * RESPONSABILIDAD: Traducir el payload del vendor a la forma canónica y
 * detectar divergencias campo-a-campo contra el registro local.
 */

pub mod engine;
pub mod errors;
pub mod expr;
pub mod paths;

pub use engine::{ConflictPolicy, CustomFn, TransformOutcome, TransformationEngine};
pub use errors::TransformError;



