//! Engine error taxonomy.
//!
//! Four caller-visible categories: validation (never retried), not-found
//! (absent and expired are indistinguishable), state (illegal transition),
//! and store failures (retryable by the caller). `Conflict` is what remains
//! of a contended atomic increment after the engine's own bounded retries.

use std::fmt;

use thiserror::Error;

use bommap_ingest::IngestError;
use bommap_model::ModelError;
use bommap_store::StoreError;
use bommap_transform::TransformError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Session,
    Template,
    TagTemplate,
    Job,
    Blob,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Session => "session",
            Self::Template => "template",
            Self::TagTemplate => "tag template",
            Self::Job => "job",
            Self::Blob => "blob",
        };
        f.write_str(label)
    }
}

/// Malformed input. Surfaced to the caller as-is; retrying cannot help.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("mapping references unknown source column {column:?}")]
    UnknownSourceColumn { column: String },

    #[error("session {0} has no confirmed mapping")]
    MappingNotConfirmed(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Absent or expired; the engine does not distinguish the two.
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    #[error("illegal {entity} transition on {id}: {detail}")]
    State {
        entity: Entity,
        id: String,
        detail: String,
    },

    #[error("update conflict on {entity} {id} after {attempts} attempts")]
    Conflict {
        entity: Entity,
        id: String,
        attempts: u32,
    },

    #[error("failed to write export for session {id}")]
    Export {
        id: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Transient store failure. The engine performs no automatic retries
    /// beyond the usage-count increment; everything else is the caller's
    /// retry policy.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    pub fn not_found(entity: Entity, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
