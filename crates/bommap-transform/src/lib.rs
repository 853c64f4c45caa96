#![deny(unsafe_code)]

//! Row transformation stages.
//!
//! A confirmed mapping projects source rows onto the target schema; formula
//! rules then derive tag and specification columns from cell values; default
//! values fill remaining gaps; the Factwise ID generator prepends a composite
//! identifier. Every stage is a pure table-in/table-out function.

mod apply;
mod error;
mod factwise;
mod rules;

pub use apply::{apply_default_values, apply_mapping};
pub use error::{Result, TransformError};
pub use factwise::{FACTWISE_ID_COLUMN, generate_factwise_id};
pub use rules::{EvaluationMode, apply_formula_rules};
