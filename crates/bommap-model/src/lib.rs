#![deny(unsafe_code)]

pub mod error;
pub mod ids;
pub mod job;
pub mod mapping;
pub mod rules;
pub mod session;
pub mod table;
pub mod template;

pub use error::ModelError;
pub use ids::{BlobRef, ColumnName, JobId, SessionId, TemplateId};
pub use job::{JobStatus, ProcessingJob};
pub use mapping::{HeaderMapping, MappingEntry};
pub use rules::{DerivedColumnType, FactwiseIdRule, FormulaRule, SubRule};
pub use session::{Session, SessionStatus};
pub use table::{CellValue, Row, Table};
pub use template::{TagTemplate, TagTemplateDraft, Template, TemplateDraft, TemplateFilter};
