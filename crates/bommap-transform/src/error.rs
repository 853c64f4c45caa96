use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    /// Raised only under [`crate::EvaluationMode::Strict`]; lenient
    /// evaluation treats the rule as not applicable.
    #[error("formula rule references missing column {column:?}")]
    RuleReferencesMissingColumn { column: String },

    #[error(transparent)]
    InvalidRule(#[from] bommap_model::ModelError),
}

pub type Result<T> = std::result::Result<T, TransformError>;
