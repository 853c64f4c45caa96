use thiserror::Error;

use crate::job::JobStatus;
use crate::session::SessionStatus;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("invalid session id: {0:?}")]
    InvalidSessionId(String),
    #[error("invalid template id: {0:?}")]
    InvalidTemplateId(String),
    #[error("invalid job id: {0:?}")]
    InvalidJobId(String),
    #[error("invalid column name: {0:?}")]
    InvalidColumnName(String),
    #[error("invalid blob reference: {0:?}")]
    InvalidBlobRef(String),
    #[error("target header {0:?} appears more than once in mapping")]
    DuplicateMappingTarget(String),
    #[error("session status cannot move from {from} to {to}")]
    InvalidStatusTransition {
        from: SessionStatus,
        to: SessionStatus,
    },
    #[error("job status cannot move from {from} to {to}")]
    InvalidJobTransition { from: JobStatus, to: JobStatus },
    #[error("specification rule on column {0:?} is missing a specification name")]
    MissingSpecificationName(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
