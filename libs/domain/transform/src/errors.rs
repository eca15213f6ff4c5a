// [libs/domain/transform/src/errors.rs]
use ehr_infra_db::DbError;

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("missing source field '{0}' (strict mode)")]
    MissingSourceField(String),

    #[error("rule {rule_id} ({kind}): {message}")]
    RuleFailed { rule_id: String, kind: &'static str, message: String },

    #[error("expression error: {0}")]
    Expression(#[from] crate::expr::ExprError),

    #[error("required field '{0}' missing after transformation")]
    RequiredFieldMissing(String),

    #[error(transparent)]
    Database(#[from] DbError),
}
