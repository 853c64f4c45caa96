use std::path::Path;

use crate::error::IngestError;

/// Physical format of a tabular source, sniffed from the locator's
/// extension. The engine never inspects blob locators beyond this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Xlsx,
    Csv,
}

impl SourceFormat {
    pub fn from_name(name: &str) -> Result<Self, IngestError> {
        let extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match extension.as_str() {
            "xlsx" | "xlsm" => Ok(Self::Xlsx),
            "csv" => Ok(Self::Csv),
            _ => Err(IngestError::UnsupportedFormat(name.to_string())),
        }
    }
}
