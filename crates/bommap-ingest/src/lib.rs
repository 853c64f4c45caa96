#![deny(unsafe_code)]

//! Reading tabular sources.
//!
//! Sources are "a rectangular header row plus data rows": a designated
//! 1-based header row, everything below it data. Both `.xlsx` (via calamine)
//! and `.csv` are normalized into the same in-memory grid before header
//! extraction or table building, so the two formats cannot drift apart.

mod error;
mod format;
mod reader;

pub use error::{IngestError, Result};
pub use format::SourceFormat;
pub use reader::{ReadOptions, extract_headers, read_sample_data, read_table};
