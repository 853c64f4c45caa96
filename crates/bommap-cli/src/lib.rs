//! CLI library components for the BOM mapping studio.

pub mod logging;
