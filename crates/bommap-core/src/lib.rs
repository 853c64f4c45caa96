#![deny(unsafe_code)]

//! Workflow core.
//!
//! Coordinates the upload → map → transform → export lifecycle over the
//! injected blob and record stores. Each manager is stateless per
//! invocation; all durable state lives in the stores, and every read path
//! re-checks record expiry against the injected clock.

pub mod error;
pub mod jobs;
pub mod service;
pub mod sessions;
pub mod templates;

pub use error::{EngineError, Entity, Result, ValidationError};
pub use jobs::JobManager;
pub use service::{ExportOutcome, MappingService, PreviewPage, UploadRequest};
pub use sessions::{NewSession, SessionManager};
pub use templates::TemplateStore;
