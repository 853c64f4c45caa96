use std::path::PathBuf;

use thiserror::Error;

/// Storage operation error.
///
/// `Conflict` is the only variant the engine retries itself (bounded, for
/// the usage-count increment); everything else is surfaced to the caller as
/// transient and retryable at their discretion.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to {operation} blob {key:?}")]
    BlobIo {
        operation: &'static str,
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("blob key {key:?} escapes the store root {root}")]
    InvalidBlobKey { key: String, root: PathBuf },

    #[error("record {table}/{key} does not exist")]
    MissingRecord { table: String, key: String },

    #[error("conflicting update on record {table}/{key}")]
    Conflict { table: String, key: String },

    #[error("failed to {operation} record {table}/{key}")]
    Serialization {
        operation: &'static str,
        table: String,
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("store is unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
